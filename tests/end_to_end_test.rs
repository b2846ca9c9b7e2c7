// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Profile loading through a full poll cycle against a simulated appliance

use homeconnect::prelude::*;
use serde_json::json;
#[cfg(feature = "polling")]
use serde_json::Value;
use std::fs;
use std::sync::Arc;
#[cfg(feature = "polling")]
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(2);

const DEVICES_JSON: &str = r#"[
  {
    "name": "Dishwasher",
    "host": "192.168.1.40",
    "key": "c2VjcmV0LWtleQ",
    "iv": "aXYtbWF0ZXJpYWw",
    "description": "BOSCH dishwasher, kitchen",
    "features": {
      "512": {"name": "BSH.Common.Status.DoorState", "access": "READ",
              "values": {"0": "Open", "1": "Closed"}},
      "542": {"name": "BSH.Common.Option.RemainingProgramTime", "access": "READ"},
      "539": {"name": "BSH.Common.Setting.PowerState", "access": "READWRITE",
              "values": {"1": "Off", "2": "On"}}
    }
  }
]"#;

fn load_profile() -> DeviceProfile {
    let dir = tempdir().unwrap();
    let path = dir.path().join("devices.json");
    fs::write(&path, DEVICES_JSON).unwrap();

    let profiles = load_device_profiles(&path).unwrap();
    let profile = select_profile(&profiles, "dishwasher").unwrap().clone();
    profile.validate().unwrap();
    profile
}

#[cfg(feature = "polling")]
/// Play the appliance side of one session, then hang up
fn simulate_appliance(appliance: ApplianceEndpoint) {
    appliance
        .push_frame(&json!({
            "sID": 9, "msgID": 1, "resource": "/ei/initialValues", "version": 2,
            "action": "POST", "data": [{"edMsgID": 40}]
        }))
        .unwrap();
    let _reply = appliance.next_sent(WAIT).expect("handshake reply");
    let _services = appliance.next_sent(WAIT).expect("catalog request");

    appliance
        .push_frame(&json!({
            "sID": 9, "msgID": 2, "resource": "/ci/services", "version": 1,
            "action": "RESPONSE",
            "data": [{"service": "ci", "version": 2}, {"service": "ro", "version": 1}]
        }))
        .unwrap();
    for _ in 0..8 {
        appliance.next_sent(WAIT).expect("discovery request");
    }

    let responses: [Value; 4] = [
        json!({"sID": 9, "msgID": 3, "resource": "/ci/info", "version": 2, "action": "RESPONSE",
               "data": [{"deviceID": "SN-001", "brand": "BOSCH", "vib": "SMV68"}]}),
        json!({"sID": 9, "msgID": 4, "resource": "/ni/info", "version": 1, "action": "RESPONSE",
               "data": [{"interfaceID": "wlan0", "ssid": "home"}]}),
        json!({"sID": 9, "msgID": 5, "resource": "/ro/allMandatoryValues", "version": 1,
               "action": "RESPONSE",
               "data": [{"uid": 512, "value": 1}, {"uid": 539, "value": 2}]}),
        json!({"sID": 9, "msgID": 6, "resource": "/ro/values", "version": 1, "action": "NOTIFY",
               "data": [{"uid": 542, "value": "ProgramFinished"}]}),
    ];
    for frame in &responses {
        appliance.push_frame(frame).unwrap();
    }
    appliance.close();
}

#[cfg(feature = "polling")]
#[test]
fn test_poll_cycle_builds_device_state() {
    let profile = load_profile();
    let connector = Arc::new(ChannelConnector::new());
    let (transport, appliance) = ChannelTransport::pair();
    connector.push(transport);

    let simulator = thread::spawn(move || simulate_appliance(appliance));
    let poller = DevicePoller::new(profile, connector, SessionConfig::default());
    let applied = poller.poll_once().unwrap();
    simulator.join().unwrap();

    assert_eq!(applied, 4);
    let state = poller.snapshot();
    assert_eq!(state.lookup(StateCategory::DeviceInfo, "deviceID"), Some(json!("SN-001")));
    assert_eq!(state.lookup(StateCategory::InterfaceInfo, "ssid"), Some(json!("home")));
    assert_eq!(
        state.lookup(StateCategory::StatusInfo, "common.status.doorstate"),
        Some(json!(false))
    );
    assert_eq!(
        state.lookup(StateCategory::StatusInfo, "common.setting.powerstate"),
        Some(json!("On"))
    );
    assert_eq!(
        state.lookup(StateCategory::StatusInfo, "common.option.remainingprogramtime"),
        Some(json!(0))
    );
}

#[cfg(feature = "polling")]
#[test]
fn test_polling_service_survives_failed_cycles() {
    let profile = load_profile();
    let connector = Arc::new(ChannelConnector::new());
    let poller = Arc::new(DevicePoller::new(profile, connector.clone(), SessionConfig::default()));

    // no transport queued: every cycle fails to connect
    let mut service = PollingService::new(Arc::clone(&poller), Duration::from_millis(20));
    service.start().unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(service.is_running());

    service.stop();
    assert!(!service.is_running());
    assert_eq!(connector.opened_count(), 0);
    assert_eq!(poller.snapshot(), DeviceState::default());
}

#[test]
fn test_write_validation_uses_profile_catalog() {
    let profile = load_profile();
    let (transport, appliance) = ChannelTransport::pair();
    let session = ApplianceSession::connect(
        profile.name.clone(),
        Arc::new(transport),
        profile.features.clone(),
        SessionConfig::default(),
    );

    appliance
        .push_frame(&json!({
            "sID": 1, "msgID": 1, "resource": "/ei/initialValues", "version": 2,
            "action": "POST", "data": [{"edMsgID": 1}]
        }))
        .unwrap();
    assert_eq!(session.recv().unwrap(), Some(DispatchOutcome::Empty));
    assert!(session.wait_for_phase(SessionPhase::Negotiating, WAIT));

    let denied = session.request_resource(ResourceRequest::post(
        resources::VALUES,
        json!({"uid": 512, "value": 0}),
    ));
    assert!(matches!(
        denied,
        Err(DeviceError::Validation(ValidationError::AccessDenied { .. }))
    ));

    session
        .request_resource(ResourceRequest::post(
            resources::VALUES,
            json!({"uid": 539, "value": 1}),
        ))
        .unwrap();
    let written = std::iter::from_fn(|| appliance.next_sent(WAIT))
        .find(|m| m["resource"] == json!("/ro/values"))
        .unwrap();
    assert_eq!(written["action"], json!("POST"));
    assert_eq!(written["data"], json!([{"uid": 539, "value": 1}]));

    session.close();
}
