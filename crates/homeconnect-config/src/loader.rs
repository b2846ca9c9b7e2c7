// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Engine settings follow a 3-tier loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)
//!
//! Device profiles are loaded separately from `devices.json`.

use crate::{ConfigError, ConfigResult, DeviceProfile, HomeConnectConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "homeconnect_configuration.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `HOMECONNECT_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("HOMECONNECT_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by HOMECONNECT_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent.to_path_buf();
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet HOMECONNECT_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<HomeConnectConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: HomeConnectConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    let lowered = value.to_lowercase();
    lowered == "true" || lowered == "1" || lowered == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `HOMECONNECT_DEVICE` -> `device.name`
/// - `HOMECONNECT_PROFILES_PATH` -> `device.profiles_path`
/// - `HOMECONNECT_DEBUG_SESSION` -> `session.debug`
/// - `HOMECONNECT_POLL_CYCLE` -> `polling.cycle_secs`
/// - `HOMECONNECT_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut HomeConnectConfig) {
    if let Ok(value) = env::var("HOMECONNECT_DEVICE") {
        config.device.name = value;
    }
    if let Ok(value) = env::var("HOMECONNECT_PROFILES_PATH") {
        config.device.profiles_path = PathBuf::from(value);
    }
    if let Ok(value) = env::var("HOMECONNECT_DEBUG_SESSION") {
        config.session.debug = parse_flag(&value);
    }
    if let Ok(value) = env::var("HOMECONNECT_POLL_CYCLE") {
        if let Ok(secs) = value.parse::<u64>() {
            config.polling.cycle_secs = secs;
        }
    }
    if let Ok(value) = env::var("HOMECONNECT_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// Recognized keys: `device`, `debug`, `poll_cycle`, `log_level`.
pub fn apply_cli_overrides(config: &mut HomeConnectConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("device") {
        config.device.name = value.clone();
    }
    if let Some(value) = cli_args.get("debug") {
        config.session.debug = parse_flag(value);
    }
    if let Some(value) = cli_args.get("poll_cycle") {
        if let Ok(secs) = value.parse::<u64>() {
            config.polling.cycle_secs = secs;
        }
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}

/// Parse the contents of a `devices.json` file
pub fn parse_device_profiles(content: &str) -> ConfigResult<Vec<DeviceProfile>> {
    Ok(serde_json::from_str(content)?)
}

/// Load all device profiles from a `devices.json` file
pub fn load_device_profiles(path: &Path) -> ConfigResult<Vec<DeviceProfile>> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    parse_device_profiles(&content)
}

/// Pick the profile whose name matches `name` case-insensitively
pub fn select_profile<'a>(
    profiles: &'a [DeviceProfile],
    name: &str,
) -> ConfigResult<&'a DeviceProfile> {
    profiles
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))
}
