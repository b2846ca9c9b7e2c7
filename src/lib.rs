// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # homeconnect - Home Connect appliance protocol engine
//!
//! Client-side engine for the local JSON message protocol spoken by
//! Home Connect appliances (dishwashers, washers, ovens, ...). It runs over
//! an already established and decrypted transport and handles the session
//! handshake, service negotiation, value decoding and command validation.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! homeconnect = "0.1"
//! ```
//!
//! ```rust,no_run
//! use homeconnect::prelude::*;
//! use std::sync::Arc;
//!
//! let profiles = load_device_profiles(std::path::Path::new("devices.json")).unwrap();
//! let profile = select_profile(&profiles, "dishwasher").unwrap();
//!
//! let (transport, _appliance) = ChannelTransport::pair();
//! let session = ApplianceSession::connect(
//!     profile.name.clone(),
//!     Arc::new(transport),
//!     profile.features.clone(),
//!     SessionConfig::default(),
//! );
//!
//! let mut state = DeviceState::new();
//! session
//!     .run_forever(|outcome| { state.apply(&outcome); }, || println!("closed"))
//!     .unwrap();
//! ```
//!
//! ## Crates
//!
//! - **`config`**: TOML configuration, env/CLI overrides, device profiles
//! - **`observability`**: logging initialization and per-crate debug flags
//! - **`transport`**: the transport contract and an in-memory transport pair
//! - **`device`**: the protocol engine itself
//!
//! ## Feature Flags
//!
//! - **`polling`** (default): background polling service
//! - **`file-logging`**: daily-rolling JSON log files

pub use homeconnect_config as config;
pub use homeconnect_device as device;
pub use homeconnect_observability as observability;
pub use homeconnect_transport as transport;

pub mod prelude {
    pub use crate::config::{
        load_config, load_device_profiles, select_profile, DeviceProfile, FeatureCatalog,
        FeatureDescriptor, HomeConnectConfig, SessionConfig,
    };
    pub use crate::device::{
        resources, Action, ApplianceSession, DeviceError, DeviceResult, DeviceState,
        DispatchOutcome, FeatureRegistry, ResourceRequest, SessionPhase, StateCategory,
        ValidationError, ValueCodec,
    };
    #[cfg(feature = "polling")]
    pub use crate::device::{DevicePoller, PollingService};
    pub use crate::transport::{
        ApplianceEndpoint, ChannelConnector, ChannelTransport, DeviceTransport,
        TransportConnector, TransportError,
    };
}

/// Version of the umbrella crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
