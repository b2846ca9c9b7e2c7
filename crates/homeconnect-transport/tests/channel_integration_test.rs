// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the in-memory transport pair across threads

use homeconnect_transport::prelude::*;
use serde_json::{json, Value};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// The appliance thread answers every client request with a RESPONSE
#[test]
fn test_request_response_across_threads() {
    let (client, appliance) = ChannelTransport::pair();
    let barrier = Arc::new(Barrier::new(2));
    let barrier_appliance = Arc::clone(&barrier);

    let appliance_handle = thread::spawn(move || {
        barrier_appliance.wait();
        for _ in 0..3 {
            let request = appliance.next_sent(Duration::from_secs(5)).unwrap();
            appliance
                .push_frame(&json!({
                    "msgID": request["msgID"],
                    "resource": request["resource"],
                    "action": "RESPONSE",
                }))
                .unwrap();
        }
        appliance.close();
    });

    barrier.wait();
    for msg_id in 0..3 {
        client
            .send(&json!({"msgID": msg_id, "resource": "/ci/info", "action": "GET"}))
            .unwrap();
    }

    let mut replies = Vec::new();
    while let Some(frame) = client.receive().unwrap() {
        let value: Value = serde_json::from_slice(&frame).unwrap();
        replies.push(value["msgID"].as_i64().unwrap());
    }

    appliance_handle.join().unwrap();
    assert_eq!(replies, vec![0, 1, 2]);
}

/// Closing from the client unblocks a receiver parked on another thread
#[test]
fn test_close_unblocks_receiver() {
    let (client, _appliance) = ChannelTransport::pair();
    let client = Arc::new(client);
    let receiver = Arc::clone(&client);

    let handle = thread::spawn(move || receiver.receive().unwrap());

    thread::sleep(Duration::from_millis(50));
    client.close();

    assert!(handle.join().unwrap().is_none());
}

#[test]
fn test_connector_returns_boxed_transport() {
    let connector = ChannelConnector::new();
    let (transport, appliance) = ChannelTransport::pair();
    connector.push(transport);

    let opened = connector.open().unwrap();
    assert_eq!(opened.transport_type(), "channel");
    opened.send(&json!({"hello": true})).unwrap();
    assert_eq!(appliance.drain_sent(), vec![json!({"hello": true})]);
}
