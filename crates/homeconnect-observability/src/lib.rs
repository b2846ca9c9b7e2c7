// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # homeconnect-observability
//!
//! Logging setup shared by the Home Connect binaries and tests, with
//! per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: daily-rotated JSON log files in a timestamped run folder

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Workspace crate names accepted by `--debug-<crate>`
pub const KNOWN_CRATES: &[&str] = &[
    "homeconnect",
    "homeconnect-config",
    "homeconnect-device",
    "homeconnect-observability",
    "homeconnect-transport",
];
