// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command Validator
//!
//! Checks outgoing write payloads against the feature registry before they
//! reach the wire. A rejected payload is never sent.

use crate::error::ValidationError;
use crate::registry::{uid_key, FeatureRegistry};
use homeconnect_config::Access;
use serde_json::Value;
use tracing::{debug, warn};

/// Marker carried by every program feature name
/// (`Dishcare.Dishwasher.Program.Eco50`, `BSH.Common.Program.Favorite.001`)
const PROGRAM_MARKER: &str = ".Program.";

pub struct CommandValidator<'a> {
    registry: &'a FeatureRegistry,
}

impl<'a> CommandValidator<'a> {
    pub fn new(registry: &'a FeatureRegistry) -> Self {
        Self { registry }
    }

    /// Validate `/ro/activeProgram` and `/ro/selectedProgram` payloads
    pub fn validate_program_selection(&self, entries: &[Value]) -> Result<(), ValidationError> {
        debug!("[VALIDATOR] program selection: {:?}", entries);
        for entry in entries {
            let program = entry.get("program").ok_or(ValidationError::ProgramMissing)?;
            if !is_integer(program) {
                return Err(ValidationError::ProgramNotInteger {
                    received: program.clone(),
                });
            }
            let uid = uid_key(program);

            self.registry.with_catalog(|features| -> Result<(), ValidationError> {
                let feature = features
                    .get(&uid)
                    .ok_or_else(|| ValidationError::UnknownProgram { uid: uid.clone() })?;

                match feature.name.as_deref() {
                    Some(name) if !name.contains(PROGRAM_MARKER) => {
                        return Err(ValidationError::NotAProgram {
                            uid: uid.clone(),
                            name: name.to_string(),
                        })
                    }
                    Some(_) => {}
                    None => warn!("[VALIDATOR] unknown program UID {}", uid),
                }

                let options = match entry.get("options") {
                    None => None,
                    Some(Value::Array(options)) => Some(options),
                    Some(other) => {
                        return Err(ValidationError::OptionsNotArray {
                            program: uid.clone(),
                            received: other.clone(),
                        })
                    }
                };
                for option in options.into_iter().flatten() {
                    let option_uid = option.get("uid").ok_or_else(|| {
                        ValidationError::OptionUidMissing {
                            program: uid.clone(),
                        }
                    })?;
                    let option_uid = uid_key(option_uid);
                    if !features.contains_key(&option_uid) {
                        return Err(ValidationError::UnknownOption { uid: option_uid });
                    }
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Validate `/ro/values` write payloads
    pub fn validate_feature_write(&self, entries: &[Value]) -> Result<(), ValidationError> {
        debug!("[VALIDATOR] feature write: {:?}", entries);
        for entry in entries {
            let uid = entry.get("uid").ok_or(ValidationError::UidMissing)?;
            if !is_integer(uid) {
                return Err(ValidationError::UidNotInteger {
                    received: uid.clone(),
                });
            }
            let uid = uid_key(uid);
            let value = entry
                .get("value")
                .ok_or_else(|| ValidationError::ValueMissing { uid: uid.clone() })?;

            self.registry.with_catalog(|features| -> Result<(), ValidationError> {
                let feature = features
                    .get(&uid)
                    .ok_or_else(|| ValidationError::UnknownFeature { uid: uid.clone() })?;
                let name = feature.name.clone().unwrap_or_else(|| uid.clone());

                let access = feature.access.as_deref().ok_or_else(|| {
                    ValidationError::MissingAccess {
                        uid: uid.clone(),
                        name: name.clone(),
                    }
                })?;
                if !Access::parse(access).map(Access::is_writable).unwrap_or(false) {
                    return Err(ValidationError::AccessDenied {
                        uid: uid.clone(),
                        name,
                        access: access.to_string(),
                    });
                }

                if let Some(values) = &feature.values {
                    let allowed: Vec<String> = values.keys().cloned().collect();
                    if !is_integer(value) {
                        return Err(ValidationError::ValueNotInteger {
                            uid: uid.clone(),
                            received: value.clone(),
                            allowed,
                        });
                    }
                    if !values.contains_key(&uid_key(value)) {
                        return Err(ValidationError::ValueNotAllowed {
                            uid: uid.clone(),
                            received: value.clone(),
                            allowed,
                        });
                    }
                }

                if feature.min.is_some() || feature.max.is_some() {
                    let min = feature.min.unwrap_or(i64::MIN);
                    let max = feature.max.unwrap_or(i64::MAX);
                    let in_range = value.as_i64().map(|v| v >= min && v <= max).unwrap_or(false);
                    if !in_range {
                        return Err(ValidationError::ValueOutOfRange {
                            uid: uid.clone(),
                            received: value.clone(),
                            min,
                            max,
                        });
                    }
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}
