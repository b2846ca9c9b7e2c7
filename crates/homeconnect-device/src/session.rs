// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Session State Machine
//!
//! Owns the session identity, the outbound message sequence and the
//! per-service version table of one appliance connection.
//!
//! ```text
//! Disconnected -> AwaitingInitialValues -> Negotiating -> Ready
//!       ^                                                  |
//!       +------------------ transport closed --------------+
//! ```
//!
//! One thread runs the receive loop ([`ApplianceSession::run_forever`]);
//! service discovery runs on a second thread started by the handshake so the
//! receive loop never waits on a reply. Both share [`SessionState`] behind a
//! single lock.

use crate::codec::ValueCodec;
use crate::dispatcher::{self, DispatchOutcome};
use crate::error::{DeviceError, DeviceResult};
use crate::message::{resources, service_of, Action, Envelope, ResourceRequest};
use crate::negotiation::NegotiationWorker;
use crate::registry::FeatureRegistry;
use crate::validator::CommandValidator;
use homeconnect_config::{FeatureCatalog, SessionConfig};
use homeconnect_transport::DeviceTransport;
use parking_lot::{Condvar, Mutex};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No session id, no sequence counter
    #[default]
    Disconnected,
    /// Transport open, waiting for `/ei/initialValues`
    AwaitingInitialValues,
    /// Handshake answered, service catalog pending
    Negotiating,
    /// Service catalog recorded
    Ready,
}

impl SessionPhase {
    /// Phases in which outbound requests may be stamped and sent
    pub fn accepts_requests(self) -> bool {
        matches!(self, SessionPhase::Negotiating | SessionPhase::Ready)
    }
}

/// Mutable session data, guarded by one lock
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Assigned by the appliance, echoed on every message
    pub session_id: Option<Value>,
    /// msgID of the next outbound message
    pub tx_msg_id: Option<i64>,
    pub token: Option<String>,
    /// service name -> negotiated protocol version
    pub services: BTreeMap<String, i64>,
    pub services_initialized: bool,
}

pub(crate) struct SessionShared {
    pub(crate) name: String,
    pub(crate) transport: Arc<dyn DeviceTransport>,
    pub(crate) registry: Arc<FeatureRegistry>,
    pub(crate) config: SessionConfig,
    state: Mutex<SessionState>,
    /// Signalled on every phase change and when the service catalog lands
    state_changed: Condvar,
    negotiation: Mutex<Option<NegotiationWorker>>,
}

impl SessionShared {
    /// Stamp and send one request
    ///
    /// Write payloads are validated first (unless debug mode is on). The
    /// sequence counter advances once the message is handed to the
    /// transport, whether or not the send succeeds.
    pub(crate) fn request_resource(&self, request: ResourceRequest) -> DeviceResult<()> {
        let ResourceRequest {
            resource,
            version,
            action,
            data,
        } = request;

        if let Some(data) = &data {
            if action == Action::Post && !self.config.debug {
                self.validate_write(&resource, data)?;
            }
        }

        let mut state = self.state.lock();
        if !state.phase.accepts_requests() {
            return Err(DeviceError::NotConnected);
        }
        let msg_id = state.tx_msg_id.ok_or(DeviceError::NotConnected)?;
        let version = self.resolve_version(&state, &resource, version);

        let envelope = Envelope {
            session_id: state.session_id.clone(),
            msg_id: Some(Value::from(msg_id)),
            resource,
            version,
            action,
            data,
            code: None,
        };
        let message = serde_json::to_value(&envelope)?;

        if self.config.debug {
            debug!("[SESSION] {} TX: {}", self.name, message);
        }
        let sent = self.transport.send(&message);
        state.tx_msg_id = Some(msg_id + 1);
        drop(state);

        sent.map_err(|e| {
            warn!(
                "[SESSION] {} failed to send {} (msgID {}): {}",
                self.name, envelope.resource, msg_id, e
            );
            DeviceError::from(e)
        })
    }

    fn validate_write(&self, resource: &str, data: &[Value]) -> DeviceResult<()> {
        let validator = CommandValidator::new(&self.registry);
        match resource {
            resources::VALUES => validator.validate_feature_write(data)?,
            resources::ACTIVE_PROGRAM | resources::SELECTED_PROGRAM => {
                validator.validate_program_selection(data)?
            }
            _ => {}
        }
        Ok(())
    }

    fn resolve_version(&self, state: &SessionState, resource: &str, requested: Option<i64>) -> i64 {
        let fallback = requested.unwrap_or(i64::from(self.config.default_version));
        if !state.services_initialized {
            return fallback;
        }
        match service_of(resource) {
            Some(service) => match state.services.get(service) {
                Some(version) => *version,
                None => {
                    warn!(
                        "[SESSION] {} service '{}' not known, using version {}",
                        self.name, service, fallback
                    );
                    fallback
                }
            },
            None => fallback,
        }
    }

    /// Answer an appliance-initiated request with the same msgID
    pub(crate) fn reply(&self, request: &Envelope, payload: Value) -> DeviceResult<()> {
        let envelope = Envelope {
            session_id: request.session_id.clone(),
            msg_id: request.msg_id.clone(),
            resource: request.resource.clone(),
            version: request.version,
            action: Action::Response,
            data: Some(vec![payload]),
            code: None,
        };
        let message = serde_json::to_value(&envelope)?;
        if self.config.debug {
            debug!("[SESSION] {} TX: {}", self.name, message);
        }
        self.transport.send(&message)?;
        Ok(())
    }

    /// `/ei/initialValues`: adopt the session, answer, start negotiation
    pub(crate) fn on_initial_values(self: &Arc<Self>, envelope: &Envelope) -> DeviceResult<()> {
        let first_msg_id = envelope
            .first_data()
            .and_then(|d| d.get("edMsgID"))
            .and_then(Value::as_i64)
            .ok_or_else(|| DeviceError::Protocol("initialValues without edMsgID".to_string()))?;

        // A repeated handshake starts a fresh session
        self.stop_negotiation();

        {
            let mut state = self.state.lock();
            *state = SessionState {
                phase: SessionPhase::AwaitingInitialValues,
                session_id: envelope.session_id.clone(),
                tx_msg_id: Some(first_msg_id),
                ..SessionState::default()
            };
        }
        info!(
            "[SESSION] {} session {:?} established, first msgID {}",
            self.name, envelope.session_id, first_msg_id
        );

        self.reply(
            envelope,
            json!({
                "deviceType": "Application",
                "deviceName": self.config.client_name,
                "deviceID": self.config.client_id,
            }),
        )?;

        self.set_phase(SessionPhase::Negotiating);

        let worker = NegotiationWorker::start(Arc::clone(self))?;
        *self.negotiation.lock() = Some(worker);
        Ok(())
    }

    /// `/ci/services`: record the version table once and become ready
    pub(crate) fn on_service_catalog(&self, services: &[Value]) {
        let mut state = self.state.lock();
        if state.services_initialized {
            debug!("[SESSION] {} service catalog already recorded", self.name);
            return;
        }

        for service in services {
            let name = service.get("service").and_then(Value::as_str);
            let version = service.get("version").and_then(Value::as_i64);
            match (name, version) {
                (Some(name), Some(version)) => {
                    state.services.insert(name.to_string(), version);
                }
                _ => warn!("[SESSION] {} malformed service entry: {}", self.name, service),
            }
        }
        state.services_initialized = true;
        if state.phase == SessionPhase::Negotiating {
            state.phase = SessionPhase::Ready;
        }
        info!(
            "[SESSION] {} {} services recorded, phase {:?}",
            self.name,
            state.services.len(),
            state.phase
        );
        drop(state);
        self.state_changed.notify_all();
    }

    pub(crate) fn on_token(&self, token: String) {
        self.state.lock().token = Some(token);
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.state.lock().phase = phase;
        self.state_changed.notify_all();
    }

    /// Block until the service catalog is recorded
    ///
    /// Re-checks every `negotiation_poll_interval_ms`. Gives up when the
    /// session is torn down, `running` is cleared or the configured timeout
    /// passes.
    pub(crate) fn wait_for_catalog(&self, running: &AtomicBool) -> DeviceResult<()> {
        let poll = self
            .config
            .negotiation_poll_interval()
            .max(Duration::from_millis(1));
        let timeout = self.config.negotiation_timeout();
        let started = Instant::now();

        let mut state = self.state.lock();
        loop {
            if state.services_initialized {
                return Ok(());
            }
            if !running.load(Ordering::Acquire) || state.phase == SessionPhase::Disconnected {
                return Err(DeviceError::NotConnected);
            }
            let wait = match timeout {
                Some(limit) => {
                    let elapsed = started.elapsed();
                    if elapsed >= limit {
                        return Err(DeviceError::NegotiationTimeout(limit));
                    }
                    poll.min(limit - elapsed)
                }
                None => poll,
            };
            self.state_changed.wait_for(&mut state, wait);
        }
    }

    fn stop_negotiation(&self) {
        let worker = self.negotiation.lock().take();
        if let Some(mut worker) = worker {
            worker.signal_stop();
            // The worker holds the state lock between its flag check and its wait
            drop(self.state.lock());
            self.state_changed.notify_all();
            worker.stop();
        }
    }

    /// Reset to `Disconnected`; no further sends until a new handshake
    pub(crate) fn teardown(&self) {
        let previous = {
            let mut state = self.state.lock();
            std::mem::take(&mut *state).phase
        };
        self.state_changed.notify_all();
        self.stop_negotiation();

        if previous != SessionPhase::Disconnected {
            info!("[SESSION] {} torn down (was {:?})", self.name, previous);
        }
    }
}

/// Handle to one appliance session
///
/// Cheap to clone; all clones share the same state, registry and transport.
///
/// # Example
/// ```ignore
/// let session = ApplianceSession::connect("dishwasher", transport, profile.features.clone(), config);
/// session.run_forever(|outcome| println!("{}", outcome.into_json()), || println!("closed"))?;
/// ```
#[derive(Clone)]
pub struct ApplianceSession {
    shared: Arc<SessionShared>,
}

impl ApplianceSession {
    /// Wrap an opened transport; the appliance speaks first
    pub fn connect(
        name: impl Into<String>,
        transport: Arc<dyn DeviceTransport>,
        catalog: FeatureCatalog,
        config: SessionConfig,
    ) -> Self {
        let phase = if transport.is_open() {
            SessionPhase::AwaitingInitialValues
        } else {
            SessionPhase::Disconnected
        };
        let name = name.into();
        debug!(
            "[SESSION] {} connected over {} with {} features",
            name,
            transport.transport_type(),
            catalog.len()
        );

        Self {
            shared: Arc::new(SessionShared {
                name,
                transport,
                registry: Arc::new(FeatureRegistry::new(catalog)),
                config,
                state: Mutex::new(SessionState {
                    phase,
                    ..SessionState::default()
                }),
                state_changed: Condvar::new(),
                negotiation: Mutex::new(None),
            }),
        }
    }

    /// Send a request to the appliance
    ///
    /// # Errors
    /// - `DeviceError::Validation` if a write payload is rejected (nothing is sent)
    /// - `DeviceError::NotConnected` before the handshake or after teardown
    /// - `DeviceError::Transport` if the send failed (the sequence still advances)
    pub fn request_resource(&self, request: ResourceRequest) -> DeviceResult<()> {
        self.shared.request_resource(request)
    }

    /// Shorthand for [`request_resource`](Self::request_resource)
    pub fn get(
        &self,
        resource: &str,
        version: Option<i64>,
        action: Action,
        data: Option<Value>,
    ) -> DeviceResult<()> {
        let mut request = ResourceRequest::new(resource).with_action(action);
        request.version = version;
        if let Some(data) = data {
            request = request.with_data(data);
        }
        self.shared.request_resource(request)
    }

    /// Answer an appliance-initiated request; does not use the sequence
    pub fn reply(&self, request: &Envelope, payload: Value) -> DeviceResult<()> {
        self.shared.reply(request, payload)
    }

    /// Dispatch one inbound frame
    ///
    /// Malformed frames are logged with their raw content and yield
    /// [`DispatchOutcome::Empty`].
    pub fn handle_message(&self, buf: &[u8]) -> DispatchOutcome {
        match dispatcher::dispatch(&self.shared, buf) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "[SESSION] {} error handling frame: {} | raw: {}",
                    self.shared.name,
                    e,
                    String::from_utf8_lossy(buf)
                );
                DispatchOutcome::Empty
            }
        }
    }

    /// Receive and dispatch one frame
    ///
    /// Returns `Ok(None)` at end-of-stream, after tearing the session down.
    pub fn recv(&self) -> DeviceResult<Option<DispatchOutcome>> {
        match self.shared.transport.receive()? {
            Some(buf) => Ok(Some(self.handle_message(&buf))),
            None => {
                self.shared.teardown();
                Ok(None)
            }
        }
    }

    /// Receive loop
    ///
    /// Calls `on_message` with every non-empty outcome and `on_close` once
    /// the transport is gone. A receive failure closes the transport and is
    /// returned after `on_close`.
    pub fn run_forever<F, C>(&self, mut on_message: F, on_close: C) -> DeviceResult<()>
    where
        F: FnMut(DispatchOutcome),
        C: FnOnce(),
    {
        info!("[SESSION] {} receive loop started", self.shared.name);
        let result = loop {
            match self.recv() {
                Ok(Some(outcome)) => {
                    if !outcome.is_empty() {
                        on_message(outcome);
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => {
                    error!("[SESSION] {} receive failed: {}", self.shared.name, e);
                    self.close();
                    break Err(e);
                }
            }
        };
        info!("[SESSION] {} receive loop ended", self.shared.name);
        on_close();
        result
    }

    /// Close the transport and tear the session down
    pub fn close(&self) {
        self.shared.transport.close();
        self.shared.teardown();
    }

    /// Decode a value batch against this session's registry
    pub fn decode_values(&self, batch: &[Value]) -> DeviceResult<Map<String, Value>> {
        ValueCodec::new(&self.shared.registry).decode_batch(batch)
    }

    /// Block until `phase` is reached or `timeout` passes
    pub fn wait_for_phase(&self, phase: SessionPhase, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.phase != phase {
            if self
                .shared
                .state_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.phase == phase;
            }
        }
        true
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.state.lock().phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == SessionPhase::Ready
    }

    pub fn session_id(&self) -> Option<Value> {
        self.shared.state.lock().session_id.clone()
    }

    /// msgID the next outbound message will carry
    pub fn tx_msg_id(&self) -> Option<i64> {
        self.shared.state.lock().tx_msg_id
    }

    pub fn token(&self) -> Option<String> {
        self.shared.state.lock().token.clone()
    }

    pub fn services(&self) -> BTreeMap<String, i64> {
        self.shared.state.lock().services.clone()
    }

    /// Copy of the whole session state
    pub fn state(&self) -> SessionState {
        self.shared.state.lock().clone()
    }

    pub fn registry(&self) -> &Arc<FeatureRegistry> {
        &self.shared.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeconnect_transport::{ApplianceEndpoint, ChannelTransport};

    fn session_with(config: SessionConfig) -> (ApplianceSession, ApplianceEndpoint) {
        let (transport, appliance) = ChannelTransport::pair();
        let catalog: FeatureCatalog = serde_json::from_value(json!({
            "539": {"name": "BSH.Common.Setting.PowerState", "access": "READWRITE",
                    "values": {"1": "Off", "2": "On"}},
            "512": {"name": "BSH.Common.Status.DoorState", "access": "READ"},
        }))
        .unwrap();
        let session = ApplianceSession::connect("test", Arc::new(transport), catalog, config);
        (session, appliance)
    }

    fn handshake(session: &ApplianceSession, appliance: &ApplianceEndpoint, first_msg_id: i64) {
        let frame = json!({
            "sID": 4242, "msgID": 9, "resource": "/ei/initialValues", "version": 2,
            "action": "POST", "data": [{"edMsgID": first_msg_id}]
        });
        assert_eq!(session.handle_message(frame.to_string().as_bytes()), DispatchOutcome::Empty);

        let reply = appliance.next_sent(Duration::from_secs(1)).unwrap();
        assert_eq!(reply["msgID"], json!(9));
        assert_eq!(reply["action"], json!("RESPONSE"));
    }

    #[test]
    fn test_phase_starts_awaiting_initial_values() {
        let (session, _appliance) = session_with(SessionConfig::default());
        assert_eq!(session.phase(), SessionPhase::AwaitingInitialValues);
        assert!(matches!(
            session.get("/ci/info", None, Action::Get, None),
            Err(DeviceError::NotConnected)
        ));
        assert_eq!(session.tx_msg_id(), None);
    }

    #[test]
    fn test_handshake_reply_identity() {
        let (session, appliance) = session_with(SessionConfig::default());
        let frame = json!({
            "sID": 4242, "msgID": 9, "resource": "/ei/initialValues", "version": 2,
            "action": "POST", "data": [{"edMsgID": 100}]
        });
        session.handle_message(frame.to_string().as_bytes());

        let reply = appliance.next_sent(Duration::from_secs(1)).unwrap();
        assert_eq!(
            reply,
            json!({
                "sID": 4242, "msgID": 9, "resource": "/ei/initialValues", "version": 2,
                "action": "RESPONSE",
                "data": [{"deviceType": "Application", "deviceName": "hcpy", "deviceID": "0badcafe"}]
            })
        );
        assert_eq!(session.session_id(), Some(json!(4242)));
        session.close();
    }

    #[test]
    fn test_sequence_advances_once_per_request() {
        let (session, appliance) = session_with(SessionConfig::default());
        handshake(&session, &appliance, 500);

        // the negotiation worker sends /ci/services as 500
        let services = appliance.next_sent(Duration::from_secs(1)).unwrap();
        assert_eq!(services["resource"], json!("/ci/services"));
        assert_eq!(services["msgID"], json!(500));

        for _ in 0..5 {
            session.get("/ro/values", None, Action::Get, None).unwrap();
        }
        assert_eq!(session.tx_msg_id(), Some(506));
        session.close();
    }

    #[test]
    fn test_rejected_write_is_not_sent() {
        let (session, appliance) = session_with(SessionConfig::default());
        handshake(&session, &appliance, 1);
        let _services = appliance.next_sent(Duration::from_secs(1)).unwrap();
        let before = session.tx_msg_id();

        let result = session.request_resource(ResourceRequest::post(
            "/ro/values",
            json!({"uid": 512, "value": 1}),
        ));
        assert!(matches!(result, Err(DeviceError::Validation(_))));
        assert_eq!(session.tx_msg_id(), before);
        assert!(appliance.next_sent(Duration::from_millis(50)).is_none());
        session.close();
    }

    #[test]
    fn test_debug_mode_skips_validation() {
        let config = SessionConfig {
            debug: true,
            ..SessionConfig::default()
        };
        let (session, appliance) = session_with(config);
        handshake(&session, &appliance, 1);
        let _services = appliance.next_sent(Duration::from_secs(1)).unwrap();

        session
            .request_resource(ResourceRequest::post("/ro/values", json!({"uid": 512, "value": 1})))
            .unwrap();
        let sent = appliance.next_sent(Duration::from_secs(1)).unwrap();
        assert_eq!(sent["data"], json!([{"uid": 512, "value": 1}]));
        session.close();
    }

    #[test]
    fn test_send_failure_still_advances_sequence() {
        let (session, appliance) = session_with(SessionConfig::default());
        handshake(&session, &appliance, 10);
        let _services = appliance.next_sent(Duration::from_secs(1)).unwrap();
        let before = session.tx_msg_id().unwrap();

        // closing only the appliance side leaves the session established
        appliance.close();
        let result = session.get("/ci/info", None, Action::Get, None);
        assert!(matches!(result, Err(DeviceError::Transport(_))));
        assert_eq!(session.tx_msg_id(), Some(before + 1));
        session.close();
    }

    #[test]
    fn test_catalog_versions_override_requested_version() {
        let (session, appliance) = session_with(SessionConfig::default());
        handshake(&session, &appliance, 1);
        let _services = appliance.next_sent(Duration::from_secs(1)).unwrap();

        let catalog = json!({
            "sID": 4242, "msgID": 1, "resource": "/ci/services", "version": 1,
            "action": "RESPONSE",
            "data": [{"service": "ci", "version": 3}, {"service": "ro", "version": 2}]
        });
        session.handle_message(catalog.to_string().as_bytes());
        assert!(session.wait_for_phase(SessionPhase::Ready, Duration::from_secs(1)));

        session.get("/ro/values", Some(7), Action::Get, None).unwrap();
        session.get("/xx/unknown", Some(7), Action::Get, None).unwrap();

        // discovery requests from the worker are interleaved
        let sent: Vec<Value> =
            std::iter::from_fn(|| appliance.next_sent(Duration::from_millis(200))).collect();
        let ro: Vec<&Value> = sent
            .iter()
            .filter(|m| m["resource"] == json!("/ro/values"))
            .collect();
        let unknown = sent
            .iter()
            .find(|m| m["resource"] == json!("/xx/unknown"))
            .unwrap();
        assert!(!ro.is_empty());
        assert!(ro.iter().all(|m| m["version"] == json!(2)));
        assert_eq!(unknown["version"], json!(7));
        session.close();
    }

    #[test]
    fn test_second_handshake_does_not_wait_out_catalog_poll() {
        let config = SessionConfig {
            negotiation_poll_interval_ms: 1000,
            negotiation_timeout_ms: 0,
            ..SessionConfig::default()
        };
        let (session, appliance) = session_with(config);
        handshake(&session, &appliance, 1);
        let _services = appliance.next_sent(Duration::from_secs(1)).unwrap();

        // the first worker is now parked waiting for the catalog
        std::thread::sleep(Duration::from_millis(50));

        let frame = json!({
            "sID": 5151, "msgID": 3, "resource": "/ei/initialValues", "version": 2,
            "action": "POST", "data": [{"edMsgID": 200}]
        });
        let started = Instant::now();
        session.handle_message(frame.to_string().as_bytes());
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_millis(500), "handshake took {:?}", elapsed);
        assert_eq!(session.session_id(), Some(json!(5151)));
        let reply = appliance.next_sent(Duration::from_secs(1)).unwrap();
        assert_eq!(reply["msgID"], json!(3));
        session.close();
    }

    #[test]
    fn test_close_resets_state() {
        let (session, appliance) = session_with(SessionConfig::default());
        handshake(&session, &appliance, 1);
        session.close();

        assert_eq!(session.state(), SessionState::default());
        assert!(matches!(
            session.get("/ci/info", None, Action::Get, None),
            Err(DeviceError::NotConnected)
        ));
    }
}
