// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static feature catalog
//!
//! Every appliance profile ships a map from stringified numeric feature id to
//! a [`FeatureDescriptor`]. Descriptors coming from the appliance itself
//! (description-change notifications) are frequently incomplete, so every
//! field is optional and unknown fields are preserved verbatim.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Feature catalog keyed by stringified numeric id
pub type FeatureCatalog = BTreeMap<String, FeatureDescriptor>;

/// Access level of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    /// Parse an access string case-insensitively
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "read" | "readonly" => Some(Self::ReadOnly),
            "writeonly" => Some(Self::WriteOnly),
            "readwrite" => Some(Self::ReadWrite),
            _ => None,
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReadOnly => "readonly",
            Self::WriteOnly => "writeonly",
            Self::ReadWrite => "readwrite",
        };
        f.write_str(s)
    }
}

/// Metadata about one appliance feature
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FeatureDescriptor {
    /// Dotted hierarchical path, e.g. `BSH.Common.Status.DoorState`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Raw access string as declared by the appliance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,

    /// Stringified raw value -> display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<String, String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_bound"
    )]
    pub min: Option<i64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_bound"
    )]
    pub max: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,

    /// Fields this engine does not interpret (refCID, refDID, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_access(mut self, access: impl Into<String>) -> Self {
        self.access = Some(access.into());
        self
    }

    pub fn with_values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.values = Some(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Parsed access level, `None` when absent or unrecognized
    pub fn access_level(&self) -> Option<Access> {
        self.access.as_deref().and_then(Access::parse)
    }
}

/// Bounds arrive as integers, numeric strings or floats depending on firmware.
fn lenient_bound<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(bound_from_value))
}

/// Interpret a JSON value as an integer bound
pub fn bound_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_access_parse_is_case_insensitive() {
        assert_eq!(Access::parse("ReadWrite"), Some(Access::ReadWrite));
        assert_eq!(Access::parse("WRITEONLY"), Some(Access::WriteOnly));
        assert_eq!(Access::parse("readOnly"), Some(Access::ReadOnly));
        assert_eq!(Access::parse("none"), None);
        assert!(!Access::ReadOnly.is_writable());
        assert!(Access::WriteOnly.is_writable());
    }

    #[test]
    fn test_descriptor_tolerates_partial_and_unknown_fields() {
        let descriptor: FeatureDescriptor = serde_json::from_value(json!({
            "min": "5",
            "max": 120.7,
            "refCID": "03",
        }))
        .unwrap();

        assert_eq!(descriptor.name, None);
        assert_eq!(descriptor.min, Some(5));
        assert_eq!(descriptor.max, Some(120));
        assert_eq!(descriptor.extra.get("refCID"), Some(&json!("03")));
    }

    #[test]
    fn test_catalog_deserializes_from_profile_features() {
        let catalog: FeatureCatalog = serde_json::from_value(json!({
            "512": {
                "name": "BSH.Common.Status.DoorState",
                "access": "READ",
                "values": {"0": "Open", "1": "Closed"}
            }
        }))
        .unwrap();

        let door = &catalog["512"];
        assert_eq!(door.access_level(), Some(Access::ReadOnly));
        assert_eq!(door.values.as_ref().unwrap()["0"], "Open");
    }
}
