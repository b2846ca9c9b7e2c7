// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Home Connect appliance protocol engine
//!
//! Speaks the appliance-local JSON message protocol over an already
//! established, decrypted transport.
//!
//! # Features
//! - Session handshake, sequence numbering and per-service versioning
//! - Background service negotiation and device discovery
//! - Feature registry updated from description-change notifications
//! - Decoding of raw value batches into a canonical value tree
//! - Validation of write commands before they reach the appliance
//! - Device state aggregation and periodic polling
//!
//! # Quick Start
//!
//! ```ignore
//! use homeconnect_device::{ApplianceSession, DeviceState};
//!
//! let session = ApplianceSession::connect("dishwasher", transport, profile.features, config);
//! let mut state = DeviceState::new();
//! session.run_forever(|outcome| { state.apply(&outcome); }, || println!("closed"))?;
//! ```
//!
//! # Thread Safety
//!
//! `ApplianceSession` is `Clone + Send + Sync`. The receive loop runs on the
//! caller's thread; negotiation runs on its own thread; `get()` may be
//! called from any thread.

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod negotiation;
#[cfg(feature = "polling")]
pub mod poller;
pub mod registry;
pub mod session;
pub mod state;
pub mod validator;

pub use codec::{merge_trees, ValueCodec};
pub use dispatcher::{route, DispatchOutcome, Route};
pub use error::{DeviceError, DeviceResult, ValidationError};
pub use message::{resources, Action, Envelope, ResourceRequest};
pub use negotiation::generate_nonce;
#[cfg(feature = "polling")]
pub use poller::{DevicePoller, PollingService};
pub use registry::FeatureRegistry;
pub use session::{ApplianceSession, SessionPhase, SessionState};
pub use state::{DeviceState, StateCategory};
pub use validator::CommandValidator;

// Re-export configuration types used in the public API
pub use homeconnect_config::{DeviceProfile, FeatureCatalog, FeatureDescriptor, SessionConfig};
