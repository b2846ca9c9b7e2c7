// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Value Codec
//!
//! Turns a batch of raw `{"uid": .., "value": ..}` entries into the
//! canonical value tree: lower-cased, dot-separated feature names become
//! nested keys (minus the leading namespace segment) and raw codes become
//! labels, booleans or referenced feature names.
//!
//! ```text
//! [{"uid": 512, "value": 0}]          (512 = BSH.Common.Status.DoorState,
//!                                      values {"0": "Open", "1": "Closed"})
//!   -> {"common": {"status": {"doorstate": true}}}
//! ```

use crate::error::{DeviceError, DeviceResult};
use crate::registry::{short_name, uid_key, FeatureRegistry};
use homeconnect_config::{FeatureCatalog, FeatureDescriptor};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// An enumeration that collapses to a boolean
///
/// The rule applies only when the descriptor's value map equals `labels`
/// exactly. The decoded value is `true` when the resolved label matches
/// `on_label` case-insensitively.
#[derive(Debug, Clone, Copy)]
pub struct BooleanEnumRule {
    pub labels: &'static [(&'static str, &'static str)],
    pub on_label: &'static str,
}

impl BooleanEnumRule {
    pub fn matches(&self, values: &BTreeMap<String, String>) -> bool {
        values.len() == self.labels.len()
            && self
                .labels
                .iter()
                .all(|(code, label)| values.get(*code).map(String::as_str) == Some(*label))
    }

    pub fn evaluate(&self, label: &str) -> bool {
        label.to_lowercase() == self.on_label
    }
}

/// Evaluated in order; the first matching rule wins
pub const BOOLEAN_ENUM_RULES: &[BooleanEnumRule] = &[
    BooleanEnumRule {
        labels: &[("0", "Off"), ("1", "Present"), ("2", "Confirmed")],
        on_label: "present",
    },
    BooleanEnumRule {
        labels: &[("0", "Off"), ("1", "On")],
        on_label: "on",
    },
    BooleanEnumRule {
        labels: &[("0", "Open"), ("1", "Closed")],
        on_label: "open",
    },
];

/// A program reference with its options, as found in `list` entries and
/// `sequence` configurations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramRef {
    pub program: Option<Value>,
    pub options: Option<Vec<Value>>,
}

/// One step of a `sequence` payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceStep {
    pub configuration: Option<ProgramRef>,
    pub details: Option<Vec<Value>>,
}

/// A recognized piece of a structured value
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredPart {
    List(Vec<ProgramRef>),
    Sequence(SequenceStep),
    Field(String, Value),
}

/// Raw value of one batch entry
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Scalar(Value),
    Structured(Vec<StructuredPart>),
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}

impl ProgramRef {
    fn parse(fields: &Map<String, Value>) -> Self {
        let program = fields.get("program").filter(|p| is_truthy(p)).cloned();
        let options = fields
            .get("options")
            .and_then(Value::as_array)
            .filter(|o| !o.is_empty())
            .cloned();
        Self { program, options }
    }
}

impl RawValue {
    pub fn parse(value: &Value) -> DeviceResult<Self> {
        let Some(fields) = value.as_object() else {
            return Ok(RawValue::Scalar(value.clone()));
        };

        // Wire order decides collisions between a raw field and a decoded one
        let mut parts = Vec::with_capacity(fields.len());
        for (key, inner) in fields {
            match key.as_str() {
                "list" => parts.push(StructuredPart::List(parse_list(inner)?)),
                "sequence" => parts.push(StructuredPart::Sequence(parse_sequence(inner)?)),
                // element count, not data
                "length" => {}
                _ => parts.push(StructuredPart::Field(key.clone(), inner.clone())),
            }
        }
        Ok(RawValue::Structured(parts))
    }
}

fn parse_list(value: &Value) -> DeviceResult<Vec<ProgramRef>> {
    let entries = value
        .as_array()
        .ok_or_else(|| DeviceError::Protocol(format!("'list' is not an array: {}", value)))?;

    entries
        .iter()
        .map(|entry| {
            entry
                .as_object()
                .map(ProgramRef::parse)
                .ok_or_else(|| DeviceError::Protocol(format!("'list' entry is not an object: {}", entry)))
        })
        .collect()
}

fn parse_sequence(value: &Value) -> DeviceResult<SequenceStep> {
    let first = value
        .as_array()
        .and_then(|steps| steps.first())
        .and_then(Value::as_object)
        .ok_or_else(|| DeviceError::Protocol(format!("'sequence' has no leading step: {}", value)))?;

    let configuration = first
        .get("configuration")
        .and_then(Value::as_object)
        .map(ProgramRef::parse);

    let details = match first.get("details") {
        None => None,
        Some(Value::Array(details)) => Some(details.clone()),
        Some(other) => {
            return Err(DeviceError::Protocol(format!(
                "'details' is not an array: {}",
                other
            )))
        }
    };

    Ok(SequenceStep {
        configuration,
        details,
    })
}

/// Recursively merge `source` into `target`
///
/// Matching sub-objects are merged key by key; anything else in `source`
/// overwrites.
pub fn merge_trees(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        let incoming = match value {
            Value::Object(incoming) => incoming,
            scalar => {
                target.insert(key, scalar);
                continue;
            }
        };
        if let Some(Value::Object(existing)) = target.get_mut(&key) {
            merge_trees(existing, incoming);
            continue;
        }
        target.insert(key, Value::Object(incoming));
    }
}

/// Decodes raw value batches against a feature registry
pub struct ValueCodec<'a> {
    registry: &'a FeatureRegistry,
}

impl<'a> ValueCodec<'a> {
    pub fn new(registry: &'a FeatureRegistry) -> Self {
        Self { registry }
    }

    /// Decode one batch into a canonical value tree
    ///
    /// The registry lock is held for the whole batch, so a concurrent
    /// description change lands either before or after it.
    pub fn decode_batch(&self, batch: &[Value]) -> DeviceResult<Map<String, Value>> {
        self.registry.with_catalog(|catalog| -> DeviceResult<Map<String, Value>> {
            if catalog.is_empty() {
                warn!("[CODEC] no features given, decoding {} entries by uid", batch.len());
            }

            let mut result = Map::new();
            for entry in batch {
                let (uid, value) = split_entry(entry)?;
                let tree = decode_entry(catalog, &uid, value)?;
                merge_trees(&mut result, tree);
            }
            Ok(result)
        })
    }

    /// Decode one batch into a flat `short name -> value` map
    ///
    /// Only enumeration labels are substituted.
    pub fn decode_flat(&self, batch: &[Value]) -> DeviceResult<Map<String, Value>> {
        self.registry.with_catalog(|catalog| -> DeviceResult<Map<String, Value>> {
            let mut result = Map::new();
            for entry in batch {
                let (uid, value) = split_entry(entry)?;
                let descriptor = catalog.get(&uid);

                let name = descriptor
                    .and_then(|d| d.name.as_deref())
                    .unwrap_or(uid.as_str());
                let value = descriptor
                    .and_then(|d| d.values.as_ref())
                    .and_then(|values| values.get(&uid_key(value)))
                    .map(|label| Value::String(label.clone()))
                    .unwrap_or_else(|| value.clone());

                result.insert(short_name(name).to_string(), value);
            }
            Ok(result)
        })
    }
}

fn split_entry(entry: &Value) -> DeviceResult<(String, &Value)> {
    let uid = entry
        .get("uid")
        .ok_or_else(|| DeviceError::Protocol(format!("value entry without uid: {}", entry)))?;
    let value = entry
        .get("value")
        .ok_or_else(|| DeviceError::Protocol(format!("value entry without value: {}", entry)))?;
    Ok((uid_key(uid), value))
}

fn decode_entry(catalog: &FeatureCatalog, uid: &str, value: &Value) -> DeviceResult<Map<String, Value>> {
    let descriptor = catalog.get(uid);
    let name = descriptor
        .and_then(|d| d.name.as_deref())
        .unwrap_or(uid)
        .to_lowercase();

    if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
        info!("[CODEC] uid={} not defined in config file", name);
    }

    let decoded = match RawValue::parse(value)? {
        RawValue::Scalar(raw) => decode_scalar(catalog, descriptor, &raw),
        RawValue::Structured(parts) => Value::Object(decode_structured(catalog, parts)),
    };

    let mut segments: Vec<&str> = name.split('.').collect();
    if segments.len() > 1 {
        segments.remove(0);
    }
    let leaf = segments.pop().unwrap_or_default();

    let mut tree = Map::new();
    tree.insert(leaf.to_string(), decoded);
    for key in segments.into_iter().rev() {
        let mut parent = Map::new();
        parent.insert(key.to_string(), Value::Object(tree));
        tree = parent;
    }
    Ok(tree)
}

fn decode_scalar(catalog: &FeatureCatalog, descriptor: Option<&FeatureDescriptor>, raw: &Value) -> Value {
    let key = uid_key(raw);

    let values = descriptor.and_then(|d| d.values.as_ref());
    if let Some(label) = values.and_then(|values| values.get(&key)) {
        // enumeration match wins over cross-reference resolution
        return match values.and_then(|v| BOOLEAN_ENUM_RULES.iter().find(|rule| rule.matches(v))) {
            Some(rule) => Value::Bool(rule.evaluate(label)),
            None => Value::String(label.clone()),
        };
    }

    if is_integer(raw) {
        return Value::String(referenced_name(catalog, &key));
    }

    raw.clone()
}

/// Display name of a referenced feature, or the key itself when unresolved
fn referenced_name(catalog: &FeatureCatalog, key: &str) -> String {
    match catalog.get(key).and_then(|d| d.name.as_deref()) {
        Some(name) => short_name(name).to_string(),
        None => {
            debug!("[CODEC] unresolved feature reference {}", key);
            key.to_string()
        }
    }
}

fn decode_program_ref(catalog: &FeatureCatalog, program_ref: &ProgramRef, out: &mut Map<String, Value>) {
    if let Some(options) = &program_ref.options {
        out.insert("options".to_string(), Value::Object(decode_uid_list(catalog, options)));
    }
    if let Some(program) = &program_ref.program {
        out.insert(
            "program".to_string(),
            Value::String(referenced_name(catalog, &uid_key(program))),
        );
    }
}

fn decode_structured(catalog: &FeatureCatalog, parts: Vec<StructuredPart>) -> Map<String, Value> {
    let mut out = Map::new();
    for part in parts {
        match part {
            StructuredPart::List(entries) => {
                for entry in &entries {
                    decode_program_ref(catalog, entry, &mut out);
                }
            }
            StructuredPart::Sequence(step) => {
                if let Some(configuration) = &step.configuration {
                    decode_program_ref(catalog, configuration, &mut out);
                }
                if let Some(details) = &step.details {
                    out.insert("details".to_string(), Value::Object(decode_uid_list(catalog, details)));
                }
            }
            StructuredPart::Field(key, value) => {
                out.insert(key, value);
            }
        }
    }
    out
}

/// `[{"uid": .., "value": ..}, ..]` -> `{short name: raw value}`
fn decode_uid_list(catalog: &FeatureCatalog, entries: &[Value]) -> Map<String, Value> {
    let mut out = Map::new();
    for entry in entries {
        let Some(uid) = entry.get("uid") else {
            warn!("[CODEC] option without uid: {}", entry);
            continue;
        };
        let name = referenced_name(catalog, &uid_key(uid));
        let value = entry.get("value").cloned().unwrap_or(Value::Null);
        out.insert(name, value);
    }
    out
}
