// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output is always installed. With the `file-logging` feature a
//! combined JSON log is also written to a timestamped run folder:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       └── homeconnect.log
//! ```

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Keeps file writers alive; logs are flushed when it is dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder of the file log, if one was created
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

fn console_layer(filter: EnvFilter) -> Box<dyn Layer<Registry> + Send + Sync> {
    tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(filter)
        .boxed()
}

/// Install console logging
///
/// # Arguments
/// * `debug_flags` - crates to raise to debug level
/// * `level` - level for everything else (`info`, `warn`, ...)
///
/// # Errors
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_logging(debug_flags: &CrateDebugFlags, level: &str) -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_new(debug_flags.to_filter_string(level))
        .map_err(|e| anyhow!("Invalid log filter: {}", e))?;

    Registry::default()
        .with(vec![console_layer(env_filter)])
        .try_init()
        .map_err(|e| anyhow!("Failed to install subscriber: {}", e))?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: Vec::new(),
        log_dir: None,
    })
}

/// Install console logging plus a daily-rotated JSON file
#[cfg(feature = "file-logging")]
pub fn init_logging_with_files(
    debug_flags: &CrateDebugFlags,
    level: &str,
    log_dir: Option<PathBuf>,
) -> Result<LoggingGuard> {
    use anyhow::Context;
    use chrono::Utc;
    use tracing_appender::rolling;

    let base_log_dir = log_dir.unwrap_or_else(|| PathBuf::from("./logs"));
    let run_folder = base_log_dir.join(format!("run_{}", Utc::now().format("%Y%m%d_%H%M%S")));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    let filter = debug_flags.to_filter_string(level);
    let console_filter =
        EnvFilter::try_new(&filter).map_err(|e| anyhow!("Invalid log filter: {}", e))?;
    let file_filter =
        EnvFilter::try_new(&filter).map_err(|e| anyhow!("Invalid log filter: {}", e))?;

    let appender = rolling::daily(&run_folder, "homeconnect.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(file_filter)
        .boxed();

    Registry::default()
        .with(vec![console_layer(console_filter), file_layer])
        .try_init()
        .map_err(|e| anyhow!("Failed to install subscriber: {}", e))?;

    Ok(LoggingGuard {
        _file_guards: vec![guard],
        log_dir: Some(run_folder),
    })
}

