// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use homeconnect_config::{
    load_config, load_device_profiles, select_profile, validate_config, Access, ConfigError,
};
use std::collections::HashMap;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_toml_file_with_cli_overrides() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("homeconnect_configuration.toml");
    fs::write(
        &path,
        r#"
[device]
name = "washer"
profiles_path = "/etc/homeconnect/devices.json"

[session]
client_name = "kitchen-bridge"
negotiation_timeout_ms = 0

[polling]
cycle_secs = 45
"#,
    )
    .unwrap();

    let mut cli = HashMap::new();
    cli.insert("poll_cycle".to_string(), "10".to_string());
    cli.insert("log_level".to_string(), "debug".to_string());

    let config = load_config(Some(&path), Some(&cli)).unwrap();
    validate_config(&config).unwrap();

    assert_eq!(config.device.name, "washer");
    assert_eq!(config.session.client_name, "kitchen-bridge");
    assert_eq!(config.session.client_id, "0badcafe");
    assert_eq!(config.session.negotiation_timeout(), None);
    assert_eq!(config.session.negotiation_poll_interval(), Duration::from_millis(1000));
    assert_eq!(config.polling.cycle_secs, 10);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_toml_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[device\nname = ").unwrap();

    assert!(matches!(
        load_config(Some(&path), None),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_profiles_file_with_lenient_descriptors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("devices.json");
    fs::write(
        &path,
        r#"[
  {"name": "Oven", "host": "10.0.0.7", "key": "k", "features": {}},
  {"name": "Dishwasher", "host": "10.0.0.5", "key": "k", "iv": "v",
   "features": {
     "558": {"name": "BSH.Common.Option.StartInRelative", "access": "readWrite",
             "min": "0", "max": 86340.0, "refCID": "10", "refDID": "82"},
     "512": {"name": "BSH.Common.Status.DoorState", "access": "READ"}
   }}
]"#,
    )
    .unwrap();

    let profiles = load_device_profiles(&path).unwrap();
    assert_eq!(profiles.len(), 2);

    let dishwasher = select_profile(&profiles, "DISHWASHER").unwrap();
    dishwasher.validate().unwrap();

    let start_in = &dishwasher.features["558"];
    assert_eq!(start_in.min, Some(0));
    assert_eq!(start_in.max, Some(86340));
    assert_eq!(start_in.access_level(), Some(Access::ReadWrite));
    assert_eq!(start_in.extra.get("refCID"), Some(&serde_json::json!("10")));
    assert_eq!(
        dishwasher.features["512"].access_level(),
        Some(Access::ReadOnly)
    );

    assert!(matches!(
        select_profile(&profiles, "dryer"),
        Err(ConfigError::ProfileNotFound(_))
    ));
}

#[test]
fn test_missing_profiles_file() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        load_device_profiles(&dir.path().join("devices.json")),
        Err(ConfigError::FileNotFound(_))
    ));
}
