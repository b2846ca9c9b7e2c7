// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Feature Registry
//!
//! Catalog of appliance features keyed by stringified uid. Seeded from the
//! device profile and updated at runtime by description-change
//! notifications. Every access goes through one lock; descriptors are never
//! removed for the lifetime of the registry.

use homeconnect_config::catalog::bound_from_value;
use homeconnect_config::{FeatureCatalog, FeatureDescriptor};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Registry key for a raw uid (`512` and `"512"` address the same feature)
pub fn uid_key(uid: &Value) -> String {
    match uid {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Last dotted segment of a feature name, original case
pub fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Thread-safe feature catalog
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    features: Mutex<FeatureCatalog>,
}

impl FeatureRegistry {
    pub fn new(catalog: FeatureCatalog) -> Self {
        Self {
            features: Mutex::new(catalog),
        }
    }

    /// Copy of the descriptor for `uid`
    pub fn lookup(&self, uid: &str) -> Option<FeatureDescriptor> {
        self.features.lock().get(uid).cloned()
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.features.lock().contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.features.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.lock().is_empty()
    }

    /// Display name of `uid`: the last segment of its descriptor name
    pub fn display_name(&self, uid: &str) -> Option<String> {
        let features = self.features.lock();
        features
            .get(uid)
            .and_then(|d| d.name.as_deref())
            .map(|name| short_name(name).to_string())
    }

    /// Run `f` against the whole catalog under a single lock acquisition
    pub fn with_catalog<R>(&self, f: impl FnOnce(&FeatureCatalog) -> R) -> R {
        f(&self.features.lock())
    }

    /// Copy of the whole catalog
    pub fn snapshot(&self) -> FeatureCatalog {
        self.features.lock().clone()
    }

    /// Merge one description-change entry
    ///
    /// Known features take only `access`, `available`, `min` and `max` from
    /// the change. Unknown features are stored as they arrive, possibly
    /// without a name.
    pub fn apply_change(&self, uid: &str, change: &Map<String, Value>) {
        let mut features = self.features.lock();

        match features.get_mut(uid) {
            Some(descriptor) => merge_known(uid, descriptor, change),
            None => {
                let descriptor = partial_descriptor(change);
                debug!("[REGISTRY] new feature {} from description change", uid);
                features.insert(uid.to_string(), descriptor);
            }
        }
    }

    /// Apply every entry of a description-change payload, returning how many
    /// were applied
    pub fn apply_changes(&self, changes: &[Value]) -> usize {
        let mut applied = 0;
        for change in changes {
            let Some(fields) = change.as_object() else {
                warn!("[REGISTRY] ignoring non-object description change: {}", change);
                continue;
            };
            let Some(uid) = fields.get("uid") else {
                warn!("[REGISTRY] ignoring description change without uid: {}", change);
                continue;
            };
            self.apply_change(&uid_key(uid), fields);
            applied += 1;
        }
        applied
    }
}

fn merge_known(uid: &str, descriptor: &mut FeatureDescriptor, change: &Map<String, Value>) {
    if let Some(access) = change.get("access") {
        match access.as_str() {
            Some(access) => {
                info!("[REGISTRY] access change for {} to {}", uid, access);
                descriptor.access = Some(access.to_string());
            }
            None => warn!("[REGISTRY] non-string access for {}: {}", uid, access),
        }
    }
    if let Some(available) = change.get("available").and_then(Value::as_bool) {
        descriptor.available = Some(available);
    }
    if let Some(min) = change.get("min").and_then(bound_from_value) {
        descriptor.min = Some(min);
    }
    if let Some(max) = change.get("max").and_then(bound_from_value) {
        descriptor.max = Some(max);
    }
}

fn partial_descriptor(change: &Map<String, Value>) -> FeatureDescriptor {
    let mut fields = change.clone();
    fields.remove("uid");

    serde_json::from_value(Value::Object(fields.clone())).unwrap_or_else(|e| {
        warn!("[REGISTRY] keeping malformed description change verbatim: {}", e);
        FeatureDescriptor {
            extra: fields,
            ..FeatureDescriptor::default()
        }
    })
}
