// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Protocol message envelope and resource requests

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Resource paths the engine sends or understands
pub mod resources {
    pub const INITIAL_VALUES: &str = "/ei/initialValues";
    pub const DEVICE_READY: &str = "/ei/deviceReady";

    pub const SERVICES: &str = "/ci/services";
    pub const AUTHENTICATION: &str = "/ci/authentication";
    pub const CI_INFO: &str = "/ci/info";
    pub const REGISTERED_DEVICES: &str = "/ci/registeredDevices";
    pub const TZ_INFO: &str = "/ci/tzInfo";

    pub const IZ_INFO: &str = "/iz/info";

    pub const NI_INFO: &str = "/ni/info";
    pub const NI_CONFIG: &str = "/ni/config";

    pub const VALUES: &str = "/ro/values";
    pub const ALL_MANDATORY_VALUES: &str = "/ro/allMandatoryValues";
    pub const DESCRIPTION_CHANGE: &str = "/ro/descriptionChange";
    pub const ALL_DESCRIPTION_CHANGES: &str = "/ro/allDescriptionChanges";
    pub const ACTIVE_PROGRAM: &str = "/ro/activeProgram";
    pub const SELECTED_PROGRAM: &str = "/ro/selectedProgram";
}

/// Message action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Get,
    Post,
    Response,
    Notify,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Get => "GET",
            Action::Post => "POST",
            Action::Response => "RESPONSE",
            Action::Notify => "NOTIFY",
            Action::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One protocol message
///
/// `sID` and `msgID` are opaque: they are stored and echoed as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "sID", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Value>,

    #[serde(rename = "msgID", default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<Value>,

    pub resource: String,

    #[serde(default = "default_version")]
    pub version: i64,

    pub action: Action,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
}

fn default_version() -> i64 {
    1
}

impl Envelope {
    pub fn parse(buf: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(buf)
    }

    /// First payload element, if any
    pub fn first_data(&self) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.first())
    }

    /// Service segment of the resource (`/ro/values` -> `ro`)
    pub fn service(&self) -> Option<&str> {
        service_of(&self.resource)
    }
}

/// Service segment of a resource path
pub fn service_of(resource: &str) -> Option<&str> {
    resource.split('/').nth(1)
}

/// Wrap a payload in a sequence unless it already is one
pub fn normalize_data(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        single => vec![single],
    }
}

/// An outbound request before session stamping
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    pub resource: String,
    pub version: Option<i64>,
    pub action: Action,
    pub data: Option<Vec<Value>>,
}

impl ResourceRequest {
    /// A `GET` of `resource`
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            version: None,
            action: Action::Get,
            data: None,
        }
    }

    /// A `POST` of `data` to `resource`
    pub fn post(resource: impl Into<String>, data: Value) -> Self {
        Self::new(resource).with_action(Action::Post).with_data(data)
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Attach a payload; a single object is wrapped in a sequence
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(normalize_data(data));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_inbound_envelope() {
        let envelope = Envelope::parse(
            br#"{"sID": 1234, "msgID": 77, "resource": "/ro/values", "version": 1,
                 "action": "NOTIFY", "data": [{"uid": 512, "value": 0}]}"#,
        )
        .unwrap();

        assert_eq!(envelope.action, Action::Notify);
        assert_eq!(envelope.service(), Some("ro"));
        assert_eq!(envelope.first_data(), Some(&json!({"uid": 512, "value": 0})));
        assert!(envelope.code.is_none());
    }

    #[test]
    fn test_unknown_action_and_missing_version() {
        let envelope =
            Envelope::parse(br#"{"resource": "/ci/info", "action": "DELETE"}"#).unwrap();
        assert_eq!(envelope.action, Action::Unknown);
        assert_eq!(envelope.version, 1);
    }

    #[test]
    fn test_envelope_without_action_is_malformed() {
        assert!(Envelope::parse(br#"{"resource": "/ci/info"}"#).is_err());
        assert!(Envelope::parse(b"not json").is_err());
    }

    #[test]
    fn test_request_data_is_always_a_sequence() {
        let request = ResourceRequest::post("/ro/values", json!({"uid": 539, "value": 2}));
        assert_eq!(request.action, Action::Post);
        assert_eq!(request.data, Some(vec![json!({"uid": 539, "value": 2})]));

        let request = ResourceRequest::new("/ro/values").with_data(json!([1, 2]));
        assert_eq!(request.data, Some(vec![json!(1), json!(2)]));
    }

    #[test]
    fn test_outbound_serialization_omits_absent_fields() {
        let envelope = Envelope {
            session_id: Some(json!(10)),
            msg_id: Some(json!(20)),
            resource: "/ci/services".to_string(),
            version: 1,
            action: Action::Get,
            data: None,
            code: None,
        };
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"sID": 10, "msgID": 20, "resource": "/ci/services", "version": 1, "action": "GET"})
        );
    }
}
