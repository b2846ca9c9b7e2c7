// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Home Connect Configuration
//!
//! Type-safe configuration for the Home Connect protocol engine:
//! - `homeconnect_configuration.toml` parsing (engine, session, polling, logging)
//! - Environment variable overrides
//! - CLI argument overrides
//! - Device profiles (`devices.json`) carrying host, key material and the
//!   static feature catalog of each appliance
//!
//! ## Usage
//!
//! ```rust,no_run
//! use homeconnect_config::{load_config, load_device_profiles, select_profile};
//!
//! let config = load_config(None, None).expect("Failed to load config");
//! let profiles = load_device_profiles(&config.device.profiles_path).expect("profiles");
//! let profile = select_profile(&profiles, &config.device.name).expect("profile");
//! println!("Appliance host: {}", profile.host);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod catalog;
pub mod loader;
pub mod types;
pub mod validation;

pub use catalog::{Access, FeatureCatalog, FeatureDescriptor};
pub use loader::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config,
    load_device_profiles, parse_device_profiles, select_profile, CONFIG_FILE_NAME,
};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Invalid device profile JSON: {0}")]
    ProfileParseError(#[from] serde_json::Error),

    #[error("Device profile '{0}' not found")]
    ProfileNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_needs_only_a_device_name() {
        let mut config = HomeConnectConfig::default();
        assert!(validate_config(&config).is_err());

        config.device.name = "dishwasher".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
