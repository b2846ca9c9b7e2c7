// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Aggregated appliance state built from dispatch outcomes

use crate::codec::merge_trees;
use crate::dispatcher::DispatchOutcome;
use serde_json::{Map, Value};
use std::fmt;

/// Which part of the state a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateCategory {
    DeviceInfo,
    InterfaceInfo,
    StatusInfo,
}

impl StateCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('_', "").as_str() {
            "deviceinfo" | "device" => Some(StateCategory::DeviceInfo),
            "interfaceinfo" | "interface" => Some(StateCategory::InterfaceInfo),
            "statusinfo" | "status" => Some(StateCategory::StatusInfo),
            _ => None,
        }
    }
}

impl fmt::Display for StateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateCategory::DeviceInfo => "device_info",
            StateCategory::InterfaceInfo => "interface_info",
            StateCategory::StatusInfo => "status_info",
        };
        f.write_str(s)
    }
}

/// Accumulated state of one appliance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    pub device_info: Map<String, Value>,
    pub interface_info: Map<String, Value>,
    pub status_info: Map<String, Value>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one outcome in; returns the category it landed in
    pub fn apply(&mut self, outcome: &DispatchOutcome) -> Option<StateCategory> {
        let (category, record) = match outcome {
            DispatchOutcome::Empty | DispatchOutcome::Error { .. } => return None,
            DispatchOutcome::Values(values) => (StateCategory::StatusInfo, values.clone()),
            DispatchOutcome::Info(Value::Object(info)) => {
                let category = if info.contains_key("deviceID") {
                    StateCategory::DeviceInfo
                } else if info.contains_key("interfaceID") {
                    StateCategory::InterfaceInfo
                } else {
                    StateCategory::StatusInfo
                };
                (category, info.clone())
            }
            DispatchOutcome::Info(_) => return None,
        };

        merge_trees(self.category_mut(category), lowercase_keys(record));
        Some(category)
    }

    pub fn category(&self, category: StateCategory) -> &Map<String, Value> {
        match category {
            StateCategory::DeviceInfo => &self.device_info,
            StateCategory::InterfaceInfo => &self.interface_info,
            StateCategory::StatusInfo => &self.status_info,
        }
    }

    fn category_mut(&mut self, category: StateCategory) -> &mut Map<String, Value> {
        match category {
            StateCategory::DeviceInfo => &mut self.device_info,
            StateCategory::InterfaceInfo => &mut self.interface_info,
            StateCategory::StatusInfo => &mut self.status_info,
        }
    }

    /// Walk a dotted path (case-insensitive) within one category
    ///
    /// A finished program reports its remaining time as the label
    /// `ProgramFinished`; that reads as `0`. Any path through a
    /// `programprogress` segment reads as an empty string, present or not.
    pub fn lookup(&self, category: StateCategory, path: &str) -> Option<Value> {
        let segments: Vec<String> = path.split('.').map(str::to_lowercase).collect();
        if segments.iter().any(|s| s == PROGRAM_PROGRESS) {
            return Some(Value::String(String::new()));
        }

        let mut segments = segments.into_iter().peekable();
        let mut current = self.category(category);
        loop {
            let segment = segments.next()?;
            let value = current.get(&segment)?;
            if segments.peek().is_none() {
                return Some(finished_as_zero(&segment, value));
            }
            current = value.as_object()?;
        }
    }

    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        root.insert("device_info".to_string(), Value::Object(self.device_info.clone()));
        root.insert("interface_info".to_string(), Value::Object(self.interface_info.clone()));
        root.insert("status_info".to_string(), Value::Object(self.status_info.clone()));
        Value::Object(root)
    }
}

const PROGRAM_PROGRESS: &str = "programprogress";

fn finished_as_zero(segment: &str, value: &Value) -> Value {
    let is_remaining_time = segment.replace('_', "") == "remainingprogramtime";
    match value.as_str() {
        Some(s) if is_remaining_time && s.eq_ignore_ascii_case("programfinished") => Value::from(0),
        _ => value.clone(),
    }
}

fn lowercase_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Object(inner) => Value::Object(lowercase_keys(inner)),
                other => other,
            };
            (key.to_lowercase(), value)
        })
        .collect()
}
