// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Offline value decoder.
//!
//! Decodes a captured `/ro/values` payload against a device profile and
//! prints the resulting value tree.
//!
//! The values file may hold either the bare `data` array or a whole message
//! envelope.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use homeconnect::config::{load_device_profiles, select_profile};
use homeconnect::device::{FeatureRegistry, ValueCodec};
use homeconnect::observability::{debug_flags_help, init_logging, parse_debug_flags};
use serde_json::Value;
use tracing::debug;

struct Args {
    profiles: PathBuf,
    device: String,
    values: PathBuf,
    flat: bool,
    log_level: String,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: hc_decode [--flat] [--log-level <level>] [--debug-<crate>] \
         <devices.json> <device-name> <values.json>\n\n\
         Options:\n\
         - --flat: legacy flat decoding (short names, labels only)\n\
         - --log-level: base log level (default: warn)\n\n{}",
        debug_flags_help()
    );
    process::exit(2);
}

fn parse_args() -> Args {
    let mut flat = false;
    let mut log_level = "warn".to_string();
    let mut positional = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--flat" => flat = true,
            "--log-level" => {
                log_level = args.next().unwrap_or_else(|| usage_and_exit());
            }
            "-h" | "--help" => usage_and_exit(),
            other if other.starts_with("--debug-") => {}
            other if other.starts_with("--") => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
            _ => positional.push(arg),
        }
    }

    let [profiles, device, values]: [String; 3] =
        positional.try_into().unwrap_or_else(|_| usage_and_exit());

    Args {
        profiles: PathBuf::from(profiles),
        device,
        values: PathBuf::from(values),
        flat,
        log_level,
    }
}

/// Accept a bare data array or an envelope carrying one
fn extract_batch(payload: Value) -> Result<Vec<Value>> {
    match payload {
        Value::Array(batch) => Ok(batch),
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::Array(batch)) => Ok(batch),
            _ => bail!("message has no data array"),
        },
        _ => bail!("expected a data array or a message object"),
    }
}

fn read_batch(path: &Path) -> Result<Vec<Value>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read values file {}", path.display()))?;
    let payload: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse values file {}", path.display()))?;
    extract_batch(payload)
}

fn run(args: Args) -> Result<()> {
    let _logging = init_logging(&parse_debug_flags(), &args.log_level)?;

    let profiles = load_device_profiles(&args.profiles)
        .with_context(|| format!("Failed to load profiles from {}", args.profiles.display()))?;
    let profile = select_profile(&profiles, &args.device)?;
    let batch = read_batch(&args.values)?;

    let registry = FeatureRegistry::new(profile.features.clone());
    debug!(
        "[DECODE] {} entries against {} features of {}",
        batch.len(),
        registry.len(),
        profile.name
    );
    let codec = ValueCodec::new(&registry);
    let tree = if args.flat {
        codec.decode_flat(&batch)?
    } else {
        codec.decode_batch(&batch)?
    };

    println!("{}", serde_json::to_string_pretty(&Value::Object(tree))?);
    Ok(())
}

fn main() {
    if let Err(e) = run(parse_args()) {
        eprintln!("hc_decode: {e:#}");
        process::exit(1);
    }
}
