// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # homeconnect-transport
//!
//! The contract between the Home Connect protocol engine and the encrypted
//! connection to an appliance.
//!
//! The real transport (TLS-PSK or AES-CBC framing over a WebSocket) lives
//! outside this workspace. Anything implementing [`DeviceTransport`] can
//! drive a session: it sends JSON messages and yields decrypted frames.
//!
//! [`ChannelTransport`] is an in-memory implementation whose other half,
//! [`ApplianceEndpoint`], can script an appliance.
//!
//! ```
//! use homeconnect_transport::prelude::*;
//! use serde_json::json;
//!
//! let (client, appliance) = ChannelTransport::pair();
//! client.send(&json!({"resource": "/ci/services"})).unwrap();
//! assert!(appliance.next_sent(std::time::Duration::from_secs(1)).is_some());
//! ```

pub mod channel;
pub mod error;
pub mod traits;

pub use channel::{ApplianceEndpoint, ChannelConnector, ChannelTransport};
pub use error::{TransportError, TransportResult};
pub use traits::{DeviceTransport, TransportConnector};

pub mod prelude {
    pub use crate::channel::{ApplianceEndpoint, ChannelConnector, ChannelTransport};
    pub use crate::error::{TransportError, TransportResult};
    pub use crate::traits::{DeviceTransport, TransportConnector};
}
