// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory transport pair
//!
//! `ChannelTransport` is the client half handed to a session;
//! `ApplianceEndpoint` plays the appliance, injecting frames and observing
//! what the client sent. Used by tests, simulators and the decode tool.

use crate::error::{TransportError, TransportResult};
use crate::traits::{DeviceTransport, TransportConnector};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How often a blocked `receive` re-checks the open flag
const RECEIVE_POLL: Duration = Duration::from_millis(20);

/// Client half of an in-memory pair
pub struct ChannelTransport {
    outbound: Sender<Value>,
    inbound: Receiver<Vec<u8>>,
    open: Arc<AtomicBool>,
}

/// Appliance half of an in-memory pair
pub struct ApplianceEndpoint {
    to_client: Sender<Vec<u8>>,
    from_client: Receiver<Value>,
    open: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Create a connected pair sharing one open flag
    pub fn pair() -> (ChannelTransport, ApplianceEndpoint) {
        let (outbound, from_client) = channel::unbounded();
        let (to_client, inbound) = channel::unbounded();
        let open = Arc::new(AtomicBool::new(true));

        (
            ChannelTransport {
                outbound,
                inbound,
                open: Arc::clone(&open),
            },
            ApplianceEndpoint {
                to_client,
                from_client,
                open,
            },
        )
    }
}

impl DeviceTransport for ChannelTransport {
    fn send(&self, message: &Value) -> TransportResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .send(message.clone())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn receive(&self) -> TransportResult<Option<Vec<u8>>> {
        loop {
            match self.inbound.recv_timeout(RECEIVE_POLL) {
                Ok(frame) => return Ok(Some(frame)),
                Err(RecvTimeoutError::Timeout) => {
                    // Queued frames are delivered before end-of-stream
                    if !self.open.load(Ordering::Acquire) {
                        return Ok(None);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.open.store(false, Ordering::Release);
                    return Ok(None);
                }
            }
        }
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!("[TRANSPORT] channel closed by client");
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn transport_type(&self) -> &str {
        "channel"
    }
}

impl ApplianceEndpoint {
    /// Deliver a JSON frame to the client
    pub fn push_frame(&self, frame: &Value) -> TransportResult<()> {
        let bytes = serde_json::to_vec(frame)?;
        self.push_raw(bytes)
    }

    /// Deliver raw bytes to the client, valid JSON or not
    pub fn push_raw(&self, bytes: impl Into<Vec<u8>>) -> TransportResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        self.to_client
            .send(bytes.into())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Wait for the next message the client sent
    pub fn next_sent(&self, timeout: Duration) -> Option<Value> {
        self.from_client.recv_timeout(timeout).ok()
    }

    /// Everything the client has sent so far without waiting
    pub fn drain_sent(&self) -> Vec<Value> {
        self.from_client.try_iter().collect()
    }

    /// End the stream; the client sees end-of-stream after queued frames
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!("[TRANSPORT] channel closed by appliance");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Hands out pre-built transports in order, one per `open`
#[derive(Default)]
pub struct ChannelConnector {
    pending: Mutex<VecDeque<ChannelTransport>>,
    opened: AtomicUsize,
}

impl ChannelConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transport for the next `open`
    pub fn push(&self, transport: ChannelTransport) {
        self.pending.lock().push_back(transport);
    }

    /// Number of successful `open` calls
    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl TransportConnector for ChannelConnector {
    fn open(&self) -> TransportResult<Box<dyn DeviceTransport>> {
        let transport = self
            .pending
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::ConnectFailed("no channel transport queued".into()))?;
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(transport))
    }
}
