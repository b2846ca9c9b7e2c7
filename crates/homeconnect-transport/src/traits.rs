// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transport trait definitions
//!
//! The protocol engine never sees sockets, keys or framing. It talks to an
//! already-encrypted, already-framed message pipe through these traits.

use crate::error::TransportResult;
use serde_json::Value;

/// A connected, bidirectional message pipe to one appliance
pub trait DeviceTransport: Send + Sync {
    /// Serialize, encrypt and send one message
    fn send(&self, message: &Value) -> TransportResult<()>;

    /// Block until the next decrypted frame arrives
    ///
    /// Returns `Ok(None)` once the stream has ended.
    fn receive(&self) -> TransportResult<Option<Vec<u8>>>;

    /// Close the connection; a blocked `receive` returns end-of-stream
    fn close(&self);

    fn is_open(&self) -> bool;

    /// Get transport name/type
    fn transport_type(&self) -> &str;
}

/// Opens new transports, one per session
pub trait TransportConnector: Send + Sync {
    fn open(&self) -> TransportResult<Box<dyn DeviceTransport>>;
}
