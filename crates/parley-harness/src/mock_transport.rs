//! Mock Transport for Testing
//!
//! Deterministic transport implementation for driving a session without a
//! server. The provider hands out one `MockTransport` per connect attempt; all
//! of them share a [`TransportProbe`] through which tests script the server
//! side (statuses, inbound stanzas, connection drops) and inspect what the
//! session emitted.

use parley_core::{
    BrokerError, BrokerResult, Credential, Element, FullJid, LinkId, RelayConfig, Transport,
    TransportEvents, TransportProvider, TransportStatus,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::debug;

// ----------------------------------------------------------------------------
// Mock Behavior
// ----------------------------------------------------------------------------

/// How a mock transport reacts to `connect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockBehavior {
    /// Report `Connecting`, `Authenticating` and `Connected` right away
    pub auto_connect: bool,
    /// Report this failure status instead of connecting
    pub fail_with: Option<TransportStatus>,
    /// Reject every `send` with a transport error
    pub reject_sends: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            auto_connect: true,
            fail_with: None,
            reject_sends: false,
        }
    }
}

impl MockBehavior {
    /// Stop after `Connecting`; the test completes the handshake itself
    pub fn manual() -> Self {
        Self {
            auto_connect: false,
            ..Self::default()
        }
    }

    /// Fail every connect attempt with `status`
    pub fn failing(status: TransportStatus) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Transport Probe
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ProbeState {
    behavior: MockBehavior,
    provided: usize,
    connects: Vec<FullJid>,
    sent: Vec<Element>,
    disconnects: Vec<String>,
    connected: bool,
    events: Option<TransportEvents>,
}

/// Shared view of every transport created by a `MockTransportProvider`
#[derive(Debug, Clone, Default)]
pub struct TransportProbe {
    state: Arc<Mutex<ProbeState>>,
    changed: Arc<Notify>,
}

impl TransportProbe {
    fn state(&self) -> MutexGuard<'_, ProbeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn touch(&self) {
        self.changed.notify_waiters();
    }

    /// Replace the behavior used by subsequent connect attempts
    pub fn set_behavior(&self, behavior: MockBehavior) {
        self.state().behavior = behavior;
    }

    /// Link of the most recent transport, if one has connected
    pub fn current_link(&self) -> Option<LinkId> {
        self.state().events.as_ref().map(TransportEvents::link)
    }

    /// Report a status as the current transport
    pub fn emit_status(&self, status: TransportStatus) -> bool {
        let events = {
            let mut state = self.state();
            match status {
                TransportStatus::Connected => state.connected = true,
                TransportStatus::Disconnected
                | TransportStatus::AuthFailure
                | TransportStatus::ConnectFailure
                | TransportStatus::ConnectTimeout => state.connected = false,
                _ => {}
            }
            state.events.clone()
        };
        events.map(|events| events.status(status)).unwrap_or(false)
    }

    /// Finish a handshake left pending by `MockBehavior::manual`
    pub fn complete_connect(&self) -> bool {
        self.emit_status(TransportStatus::Authenticating)
            && self.emit_status(TransportStatus::Connected)
    }

    /// Simulate the server dropping the stream
    pub fn drop_connection(&self) -> bool {
        self.emit_status(TransportStatus::Disconnected)
    }

    /// Deliver an inbound stanza through the current transport
    pub fn deliver(&self, stanza: Element) -> bool {
        let events = self.state().events.clone();
        match events {
            Some(events) => {
                events.raw_input(stanza.to_string());
                events.stanza(stanza)
            }
            None => false,
        }
    }

    /// Every stanza emitted so far, across all transports
    pub fn sent(&self) -> Vec<Element> {
        self.state().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state().sent.len()
    }

    pub fn last_sent(&self) -> Option<Element> {
        self.state().sent.last().cloned()
    }

    /// Identities passed to `connect`, in order
    pub fn connects(&self) -> Vec<FullJid> {
        self.state().connects.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.state().connects.len()
    }

    /// Number of transports handed out by the provider
    pub fn provided_count(&self) -> usize {
        self.state().provided
    }

    /// Reasons passed to `disconnect`, in order
    pub fn disconnect_reasons(&self) -> Vec<String> {
        self.state().disconnects.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Wait until at least `count` stanzas were emitted, returning all of them
    pub async fn wait_for_sent(&self, count: usize) -> Vec<Element> {
        loop {
            let notified = self.changed.notified();
            {
                let state = self.state();
                if state.sent.len() >= count {
                    return state.sent.clone();
                }
            }
            notified.await;
        }
    }

    /// Wait until at least `count` connect attempts were made
    pub async fn wait_for_connects(&self, count: usize) {
        loop {
            let notified = self.changed.notified();
            if self.state().connects.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

// ----------------------------------------------------------------------------
// Mock Transport Implementation
// ----------------------------------------------------------------------------

/// Mock transport for deterministic testing
#[derive(Debug)]
pub struct MockTransport {
    probe: TransportProbe,
    events: Option<TransportEvents>,
}

impl MockTransport {
    /// Whether this transport is the one the probe currently drives
    fn is_current(&self) -> bool {
        let current = self.probe.current_link();
        self.events.as_ref().map(TransportEvents::link) == current && current.is_some()
    }
}

impl Transport for MockTransport {
    fn connect(
        &mut self,
        jid: &FullJid,
        _credential: &Credential,
        events: TransportEvents,
    ) -> BrokerResult<()> {
        let behavior = {
            let mut state = self.probe.state();
            state.connects.push(jid.clone());
            state.events = Some(events.clone());
            state.connected = false;
            state.behavior.clone()
        };
        self.events = Some(events.clone());
        self.probe.touch();
        debug!("Mock transport connecting {} on {}", jid, events.link());

        events.status(TransportStatus::Connecting);
        if let Some(failure) = behavior.fail_with {
            if failure == TransportStatus::AuthFailure {
                events.status(TransportStatus::Authenticating);
            }
            events.status(failure);
        } else if behavior.auto_connect {
            self.probe.state().connected = true;
            events.status(TransportStatus::Authenticating);
            events.status(TransportStatus::Connected);
        }
        Ok(())
    }

    fn disconnect(&mut self, reason: &str) {
        let current = self.is_current();
        {
            let mut state = self.probe.state();
            state.disconnects.push(reason.to_string());
            if current {
                state.connected = false;
            }
        }
        self.probe.touch();

        if let Some(events) = self.events.take() {
            events.status(TransportStatus::Disconnecting);
            events.status(TransportStatus::Disconnected);
        }
    }

    fn send(&mut self, stanza: &Element) -> BrokerResult<()> {
        {
            let mut state = self.probe.state();
            if state.behavior.reject_sends {
                return Err(BrokerError::transport_error("mock transport rejects sends"));
            }
            state.sent.push(stanza.clone());
        }
        self.probe.touch();

        if let Some(events) = &self.events {
            events.raw_output(stanza.to_string());
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.is_current() && self.probe.is_connected()
    }

    fn protocol(&self) -> String {
        "wss".to_string()
    }
}

// ----------------------------------------------------------------------------
// Mock Transport Provider
// ----------------------------------------------------------------------------

/// Provider handing out `MockTransport`s bound to one probe
#[derive(Debug, Clone, Default)]
pub struct MockTransportProvider {
    probe: TransportProbe,
}

impl MockTransportProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        let provider = Self::default();
        provider.probe.set_behavior(behavior);
        provider
    }

    pub fn probe(&self) -> TransportProbe {
        self.probe.clone()
    }
}

impl TransportProvider for MockTransportProvider {
    fn provide(&self, relay: &RelayConfig) -> BrokerResult<Box<dyn Transport>> {
        debug!("Providing mock transport for {:?}", relay.endpoint);
        self.probe.state().provided += 1;
        Ok(Box::new(MockTransport {
            probe: self.probe.clone(),
            events: None,
        }))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
