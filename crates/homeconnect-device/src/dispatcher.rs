// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Inbound message routing
//!
//! Maps each envelope to a [`Route`] by action and resource, then applies it
//! to the session: handshake, service catalog, token, registry updates and
//! value decoding.

use crate::codec::ValueCodec;
use crate::error::DeviceResult;
use crate::message::{resources, Action, Envelope};
use crate::session::SessionShared;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of dispatching one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Nothing for the host
    Empty,
    /// Identity record from `/ci/info`, `/iz/info` or `/ni/info`
    Info(Value),
    /// Decoded value tree
    Values(Map<String, Value>),
    /// The appliance reported an error code
    Error { code: Value, resource: String },
}

impl DispatchOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, DispatchOutcome::Empty)
    }

    /// JSON form handed to hosts (`{}` when empty)
    pub fn into_json(self) -> Value {
        match self {
            DispatchOutcome::Empty => Value::Object(Map::new()),
            DispatchOutcome::Info(info) => info,
            DispatchOutcome::Values(values) => Value::Object(values),
            DispatchOutcome::Error { code, resource } => {
                json!({"error": code, "resource": resource})
            }
        }
    }
}

/// What to do with an inbound envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Error,
    InitialValues,
    Info,
    DescriptionChanges,
    Values,
    ServiceCatalog,
    Authentication,
    LogOnly,
    UnknownResource,
    UnknownAction,
}

/// Classify an envelope; an error code wins over everything else
pub fn route(envelope: &Envelope) -> Route {
    if envelope.code.is_some() {
        return Route::Error;
    }

    match envelope.action {
        Action::Post => match envelope.resource.as_str() {
            resources::INITIAL_VALUES => Route::InitialValues,
            _ => Route::UnknownResource,
        },
        Action::Response | Action::Notify => match envelope.resource.as_str() {
            resources::IZ_INFO | resources::CI_INFO | resources::NI_INFO => Route::Info,
            resources::DESCRIPTION_CHANGE | resources::ALL_DESCRIPTION_CHANGES => {
                Route::DescriptionChanges
            }
            resources::ALL_MANDATORY_VALUES | resources::VALUES => Route::Values,
            resources::SERVICES => Route::ServiceCatalog,
            resources::AUTHENTICATION => Route::Authentication,
            resources::NI_CONFIG | resources::REGISTERED_DEVICES | resources::TZ_INFO => {
                Route::LogOnly
            }
            _ => Route::UnknownResource,
        },
        Action::Get | Action::Unknown => Route::UnknownAction,
    }
}

pub(crate) fn dispatch(shared: &Arc<SessionShared>, buf: &[u8]) -> DeviceResult<DispatchOutcome> {
    if shared.config.debug {
        debug!("[SESSION] {} RX: {}", shared.name, String::from_utf8_lossy(buf));
    }
    let envelope = Envelope::parse(buf)?;

    let outcome = match route(&envelope) {
        Route::Error => DispatchOutcome::Error {
            code: envelope.code.clone().unwrap_or(Value::Null),
            resource: envelope.resource.clone(),
        },

        Route::InitialValues => {
            shared.on_initial_values(&envelope)?;
            DispatchOutcome::Empty
        }

        Route::Info => envelope
            .first_data()
            .cloned()
            .map(DispatchOutcome::Info)
            .unwrap_or(DispatchOutcome::Empty),

        Route::DescriptionChanges => {
            if let Some(changes) = &envelope.data {
                let applied = shared.registry.apply_changes(changes);
                debug!("[REGISTRY] {} applied {} description changes", shared.name, applied);
            }
            DispatchOutcome::Empty
        }

        Route::Values => match &envelope.data {
            Some(batch) => {
                DispatchOutcome::Values(ValueCodec::new(&shared.registry).decode_batch(batch)?)
            }
            None => {
                info!("[SESSION] {} {} without data", shared.name, envelope.resource);
                DispatchOutcome::Empty
            }
        },

        Route::ServiceCatalog => {
            let services = envelope.data.as_deref().unwrap_or(&[]);
            shared.on_service_catalog(services);
            DispatchOutcome::Empty
        }

        Route::Authentication => {
            match envelope
                .first_data()
                .and_then(|d| d.get("response"))
                .and_then(Value::as_str)
            {
                Some(token) => shared.on_token(token.to_string()),
                None => warn!("[SESSION] {} authentication reply without token", shared.name),
            }
            DispatchOutcome::Empty
        }

        Route::LogOnly => {
            if envelope.resource == resources::NI_CONFIG {
                debug!("[SESSION] {} {}: {:?}", shared.name, envelope.resource, envelope.data);
            } else {
                info!("[SESSION] {} {}: {:?}", shared.name, envelope.resource, envelope.data);
            }
            DispatchOutcome::Empty
        }

        Route::UnknownResource => {
            warn!(
                "[SESSION] {} unknown resource {} {}",
                shared.name, envelope.action, envelope.resource
            );
            DispatchOutcome::Empty
        }

        Route::UnknownAction => {
            warn!(
                "[SESSION] {} unknown action {} on {}",
                shared.name, envelope.action, envelope.resource
            );
            DispatchOutcome::Empty
        }
    };

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_error_code_wins_over_resource() {
        let env = envelope(json!({
            "resource": "/ro/values", "action": "RESPONSE", "code": 400, "data": []
        }));
        assert_eq!(route(&env), Route::Error);
    }

    #[test]
    fn test_routes_by_action_and_resource() {
        let cases = [
            (json!({"resource": "/ei/initialValues", "action": "POST"}), Route::InitialValues),
            (json!({"resource": "/ro/values", "action": "POST"}), Route::UnknownResource),
            (json!({"resource": "/ci/info", "action": "RESPONSE"}), Route::Info),
            (json!({"resource": "/ro/descriptionChange", "action": "NOTIFY"}), Route::DescriptionChanges),
            (json!({"resource": "/ro/allMandatoryValues", "action": "RESPONSE"}), Route::Values),
            (json!({"resource": "/ci/services", "action": "RESPONSE"}), Route::ServiceCatalog),
            (json!({"resource": "/ci/authentication", "action": "RESPONSE"}), Route::Authentication),
            (json!({"resource": "/ci/tzInfo", "action": "NOTIFY"}), Route::LogOnly),
            (json!({"resource": "/ro/unknown", "action": "NOTIFY"}), Route::UnknownResource),
            (json!({"resource": "/ro/values", "action": "GET"}), Route::UnknownAction),
            (json!({"resource": "/ro/values", "action": "PATCH"}), Route::UnknownAction),
        ];
        for (value, expected) in cases {
            assert_eq!(route(&envelope(value.clone())), expected, "{}", value);
        }
    }

    #[test]
    fn test_outcome_json() {
        assert_eq!(DispatchOutcome::Empty.into_json(), json!({}));
        assert_eq!(
            DispatchOutcome::Error {
                code: json!(404),
                resource: "/ro/foo".to_string()
            }
            .into_json(),
            json!({"error": 404, "resource": "/ro/foo"})
        );
    }
}
