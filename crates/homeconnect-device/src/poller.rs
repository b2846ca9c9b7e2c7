// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Periodic appliance polling
//!
//! [`DevicePoller`] runs one cycle: open a transport, let the appliance
//! drive a session until it hangs up, fold every outcome into a shared
//! [`DeviceState`]. [`PollingService`] repeats that on a background thread.

use crate::error::{DeviceError, DeviceResult};
use crate::session::ApplianceSession;
use crate::state::DeviceState;
use homeconnect_config::{DeviceProfile, SessionConfig};
use homeconnect_transport::{DeviceTransport, TransportConnector};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Granularity of the sleep between cycles and of the stop handshake
const STOP_POLL: Duration = Duration::from_millis(10);

/// Clears the busy flag when a cycle ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DevicePoller {
    profile: DeviceProfile,
    connector: Arc<dyn TransportConnector>,
    config: SessionConfig,
    state: Arc<Mutex<DeviceState>>,
    busy: AtomicBool,
    current: Mutex<Option<ApplianceSession>>,
}

impl DevicePoller {
    pub fn new(
        profile: DeviceProfile,
        connector: Arc<dyn TransportConnector>,
        config: SessionConfig,
    ) -> Self {
        Self {
            profile,
            connector,
            config,
            state: Arc::new(Mutex::new(DeviceState::new())),
            busy: AtomicBool::new(false),
            current: Mutex::new(None),
        }
    }

    /// Shared handle to the aggregated state
    pub fn state(&self) -> Arc<Mutex<DeviceState>> {
        Arc::clone(&self.state)
    }

    pub fn snapshot(&self) -> DeviceState {
        self.state.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn device_name(&self) -> &str {
        &self.profile.name
    }

    /// Run one poll cycle, returning how many outcomes were folded in
    ///
    /// # Errors
    /// - `DeviceError::AlreadyPolling` if a cycle is already running
    /// - `DeviceError::Transport` if the connector fails or the receive loop breaks
    pub fn poll_once(&self) -> DeviceResult<usize> {
        if self.busy.swap(true, Ordering::AcqRel) {
            warn!("[POLL] {} previous cycle still running, skipping", self.profile.name);
            return Err(DeviceError::AlreadyPolling);
        }
        let _guard = BusyGuard(&self.busy);

        let transport: Arc<dyn DeviceTransport> = Arc::from(self.connector.open()?);
        let session = ApplianceSession::connect(
            self.profile.name.clone(),
            transport,
            self.profile.features.clone(),
            self.config.clone(),
        );
        *self.current.lock() = Some(session.clone());

        let started = Instant::now();
        let mut applied = 0usize;
        let result = session.run_forever(
            |outcome| {
                if self.state.lock().apply(&outcome).is_some() {
                    applied += 1;
                }
            },
            || debug!("[POLL] {} connection closed", self.profile.name),
        );
        self.current.lock().take();

        result?;
        info!(
            "[POLL] {} cycle finished: {} updates in {:?}",
            self.profile.name,
            applied,
            started.elapsed()
        );
        Ok(applied)
    }

    /// Close the session of the running cycle, if any
    pub fn cancel(&self) {
        if let Some(session) = self.current.lock().as_ref() {
            debug!("[POLL] {} cancelling running cycle", self.profile.name);
            session.close();
        }
    }
}

/// Runs poll cycles on a background thread
pub struct PollingService {
    poller: Arc<DevicePoller>,
    interval: Duration,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PollingService {
    pub fn new(poller: Arc<DevicePoller>, interval: Duration) -> Self {
        Self {
            poller,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start polling; the first cycle runs immediately
    pub fn start(&mut self) -> DeviceResult<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(DeviceError::Other(
                "Polling service already running".to_string(),
            ));
        }
        self.running.store(true, Ordering::Release);

        let poller = Arc::clone(&self.poller);
        let running = Arc::clone(&self.running);
        let interval = self.interval;

        let thread = thread::Builder::new()
            .name(format!("hc-poll-{}", poller.device_name()))
            .spawn(move || {
                debug!("[POLL] Service started for {}", poller.device_name());

                while running.load(Ordering::Acquire) {
                    match poller.poll_once() {
                        Ok(applied) => debug!("[POLL] {} applied {} updates", poller.device_name(), applied),
                        // Network might recover; keep polling
                        Err(e) => warn!("[POLL] {} cycle failed: {}", poller.device_name(), e),
                    }

                    let deadline = Instant::now() + interval;
                    while running.load(Ordering::Acquire) && Instant::now() < deadline {
                        thread::sleep(STOP_POLL);
                    }
                }

                debug!("[POLL] Service stopped for {}", poller.device_name());
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                DeviceError::Other(format!("failed to spawn polling thread: {}", e))
            })?;

        self.thread = Some(thread);
        Ok(())
    }

    /// Stop polling, interrupting a running cycle, and join the thread
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) && self.thread.is_none() {
            return;
        }
        debug!("[POLL] Stopping service for {}", self.poller.device_name());

        if let Some(thread) = self.thread.take() {
            // A cycle may open its session after the first cancel
            while !thread.is_finished() {
                self.poller.cancel();
                thread::sleep(STOP_POLL);
            }
            match thread.join() {
                Ok(()) => debug!("[POLL] Thread stopped cleanly for {}", self.poller.device_name()),
                Err(e) => warn!(
                    "[POLL] Thread join failed for {} (thread may have panicked): {:?}",
                    self.poller.device_name(),
                    e
                ),
            }
        }
    }
}

impl Drop for PollingService {
    fn drop(&mut self) {
        self.stop();
    }
}
