// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `homeconnect_configuration.toml`, plus the device profile records read
//! from `devices.json`.

use crate::catalog::FeatureCatalog;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HomeConnectConfig {
    pub device: DeviceConfig,
    pub session: SessionConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

/// Which appliance to talk to and where its profile lives
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Profile name, matched case-insensitively against `devices.json`
    pub name: String,
    pub profiles_path: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            profiles_path: PathBuf::from("devices.json"),
        }
    }
}

/// Protocol session behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Skip outbound command validation and log every RX/TX frame
    pub debug: bool,
    /// Client name announced in the handshake reply
    pub client_name: String,
    /// Client identifier announced in the handshake reply
    pub client_id: String,
    /// How often the negotiation worker re-checks for the service catalog
    pub negotiation_poll_interval_ms: u64,
    /// Upper bound on the service catalog wait (0 = until the transport closes)
    pub negotiation_timeout_ms: u64,
    /// Protocol version used when the service catalog has no entry
    pub default_version: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debug: false,
            client_name: "hcpy".to_string(),
            client_id: "0badcafe".to_string(),
            negotiation_poll_interval_ms: 1000,
            negotiation_timeout_ms: 30_000,
            default_version: 1,
        }
    }
}

impl SessionConfig {
    pub fn negotiation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.negotiation_poll_interval_ms)
    }

    pub fn negotiation_timeout(&self) -> Option<Duration> {
        if self.negotiation_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.negotiation_timeout_ms))
        }
    }
}

/// Periodic polling of the appliance
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    pub enabled: bool,
    pub cycle_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cycle_secs: 30,
        }
    }
}

impl PollingConfig {
    pub fn cycle(&self) -> Duration {
        Duration::from_secs(self.cycle_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// One appliance entry of `devices.json`
///
/// Host and key material are consumed by the encrypting transport; the
/// protocol engine only uses `features`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceProfile {
    pub name: String,
    pub host: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub features: FeatureCatalog,
}

impl DeviceProfile {
    /// Check that the transport has what it needs to open a connection
    pub fn validate(&self) -> crate::ConfigResult<()> {
        if self.host.is_empty() {
            return Err(crate::ConfigError::MissingRequired(format!(
                "host for device '{}'",
                self.name
            )));
        }
        if self.key.is_empty() {
            return Err(crate::ConfigError::MissingRequired(format!(
                "key for device '{}'",
                self.name
            )));
        }
        Ok(())
    }
}
