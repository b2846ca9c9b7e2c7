// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Service negotiation worker
//!
//! Started by the handshake. Requests the service catalog, waits for it,
//! then walks the fixed discovery sequence. Runs on its own thread so the
//! receive loop stays free to deliver the replies it waits for.

use crate::error::{DeviceError, DeviceResult};
use crate::message::{resources, Action, ResourceRequest};
use crate::session::SessionShared;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Random bytes behind the authentication nonce
const NONCE_BYTES: usize = 32;

/// Fresh authentication nonce: 32 random bytes, URL-safe base64, unpadded
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Requests sent once the service catalog is known, in order
fn discovery_sequence(nonce: &str) -> Vec<ResourceRequest> {
    vec![
        ResourceRequest::new(resources::AUTHENTICATION)
            .with_version(2)
            .with_data(json!({"nonce": nonce})),
        ResourceRequest::new(resources::CI_INFO),
        ResourceRequest::new(resources::IZ_INFO),
        ResourceRequest::new(resources::DEVICE_READY)
            .with_version(2)
            .with_action(Action::Notify),
        ResourceRequest::new(resources::NI_INFO),
        ResourceRequest::new(resources::ALL_MANDATORY_VALUES),
        ResourceRequest::new(resources::VALUES),
        ResourceRequest::new(resources::ALL_DESCRIPTION_CHANGES),
    ]
}

pub(crate) struct NegotiationWorker {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    name: String,
}

impl NegotiationWorker {
    pub(crate) fn start(shared: Arc<SessionShared>) -> DeviceResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let name = shared.name.clone();

        let running_clone = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name(format!("hc-negotiation-{}", name))
            .spawn(move || {
                debug!("[NEGOTIATION] {} started", shared.name);
                match run(&shared, &running_clone) {
                    Ok(()) => info!("[NEGOTIATION] {} discovery requests sent", shared.name),
                    Err(DeviceError::NotConnected) => {
                        debug!("[NEGOTIATION] {} abandoned, session closed", shared.name)
                    }
                    Err(e) => error!("[NEGOTIATION] {} failed: {}", shared.name, e),
                }
                running_clone.store(false, Ordering::Release);
            })
            .map_err(|e| DeviceError::Other(format!("failed to spawn negotiation thread: {}", e)))?;

        Ok(Self {
            running,
            thread: Some(thread),
            name,
        })
    }

    /// Clear the running flag without joining
    pub(crate) fn signal_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub(crate) fn stop(&mut self) {
        self.signal_stop();

        if let Some(handle) = self.thread.take() {
            // The worker can drop the last session handle itself
            if handle.thread().id() == thread::current().id() {
                return;
            }
            match handle.join() {
                Ok(()) => debug!("[NEGOTIATION] {} stopped", self.name),
                Err(e) => error!("[NEGOTIATION] {} thread panicked: {:?}", self.name, e),
            }
        }
    }
}

impl Drop for NegotiationWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &SessionShared, running: &AtomicBool) -> DeviceResult<()> {
    send(shared, running, ResourceRequest::new(resources::SERVICES))?;
    shared.wait_for_catalog(running)?;

    let nonce = generate_nonce();
    shared.on_token(nonce.clone());

    for request in discovery_sequence(&nonce) {
        send(shared, running, request)?;
    }
    Ok(())
}

/// Send one step; transport failures are logged and the sequence continues
fn send(shared: &SessionShared, running: &AtomicBool, request: ResourceRequest) -> DeviceResult<()> {
    if !running.load(Ordering::Acquire) {
        return Err(DeviceError::NotConnected);
    }
    let resource = request.resource.clone();
    match shared.request_resource(request) {
        Ok(()) => Ok(()),
        Err(DeviceError::Transport(e)) => {
            warn!("[NEGOTIATION] {} {} not sent: {}", shared.name, resource, e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
