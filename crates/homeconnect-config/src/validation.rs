// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Collects every problem in one pass so the user sees them all at once.

use crate::{ConfigError, ConfigResult, HomeConnectConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every failed check
pub fn validate_config(config: &HomeConnectConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_required_fields(config, &mut errors);
    validate_value_ranges(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_required_fields(config: &HomeConnectConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.device.name.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "device.name".to_string(),
        });
    }
    if config.device.profiles_path.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "device.profiles_path".to_string(),
        });
    }
}

fn validate_value_ranges(config: &HomeConnectConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.polling.cycle_secs == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "polling.cycle_secs".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    if config.session.negotiation_poll_interval_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "session.negotiation_poll_interval_ms".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!(
                "'{}' is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }
}
