// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the Home Connect device engine

use homeconnect_config::ConfigError;
use homeconnect_transport::TransportError;
use serde_json::Value;
use std::time::Duration;

/// Result type alias using DeviceError
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Error types for the device engine
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Send or receive failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Outgoing command rejected before transmission
    #[error("Unable to configure appliance: {0}")]
    Validation(#[from] ValidationError),

    /// Inbound frame or payload had an unexpected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No session established yet (or it was torn down)
    #[error("Session not established - waiting for /ei/initialValues")]
    NotConnected,

    /// Service catalog did not arrive in time
    #[error("Service catalog not received within {0:?}")]
    NegotiationTimeout(Duration),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A poll cycle is still in progress
    #[error("Poll cycle already in progress")]
    AlreadyPolling,

    /// Generic device error
    #[error("Device error: {0}")]
    Other(String),
}

impl DeviceError {
    /// Check if error is retryable (for reconnection logic)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeviceError::Transport(_) | DeviceError::NegotiationTimeout(_) | DeviceError::NotConnected
        )
    }
}

/// Why a write command was refused
///
/// Each variant names the offending uid or program together with the
/// received value and what would have been accepted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("no program specified")]
    ProgramMissing,

    #[error("program UID must be an integer, got {received}")]
    ProgramNotInteger { received: Value },

    #[error("program UID {uid} is not valid for this device")]
    UnknownProgram { uid: String },

    #[error("program UID {uid} is not a valid program - {name}")]
    NotAProgram { uid: String, name: String },

    #[error("option without UID in program {program}")]
    OptionUidMissing { program: String },

    #[error("options of program {program} must be a list, got {received}")]
    OptionsNotArray { program: String, received: Value },

    #[error("option UID {uid} is not valid for this device")]
    UnknownOption { uid: String },

    #[error("UID is required")]
    UidMissing,

    #[error("UID must be an integer, got {received}")]
    UidNotInteger { received: Value },

    #[error("value is required for UID {uid}")]
    ValueMissing { uid: String },

    #[error("UID {uid} is not valid")]
    UnknownFeature { uid: String },

    #[error("feature {name} with uid {uid} does not have access")]
    MissingAccess { uid: String, name: String },

    #[error("feature {name} with uid {uid} has got access {access}")]
    AccessDenied {
        uid: String,
        name: String,
        access: String,
    },

    #[error("value {received} for uid {uid} must be an integer, allowed values are [{}]", .allowed.join(", "))]
    ValueNotInteger {
        uid: String,
        received: Value,
        allowed: Vec<String>,
    },

    #[error("value {received} for uid {uid} is not a valid value, allowed values are [{}]", .allowed.join(", "))]
    ValueNotAllowed {
        uid: String,
        received: Value,
        allowed: Vec<String>,
    },

    #[error("value {received} for uid {uid} must be an integer in the range {min} and {max}")]
    ValueOutOfRange {
        uid: String,
        received: Value,
        min: i64,
        max: i64,
    },
}

impl ValidationError {
    /// The uid or program the rejection refers to, if any
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::UnknownProgram { uid }
            | Self::NotAProgram { uid, .. }
            | Self::UnknownOption { uid }
            | Self::ValueMissing { uid }
            | Self::UnknownFeature { uid }
            | Self::MissingAccess { uid, .. }
            | Self::AccessDenied { uid, .. }
            | Self::ValueNotInteger { uid, .. }
            | Self::ValueNotAllowed { uid, .. }
            | Self::ValueOutOfRange { uid, .. } => Some(uid),
            Self::OptionUidMissing { program } | Self::OptionsNotArray { program, .. } => {
                Some(program)
            }
            Self::ProgramMissing
            | Self::ProgramNotInteger { .. }
            | Self::UidMissing
            | Self::UidNotInteger { .. } => None,
        }
    }
}
