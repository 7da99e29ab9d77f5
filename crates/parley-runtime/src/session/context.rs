//! Session context: identity, credential and the status flags mirrored to
//! collaborators. Flags are published only when one of them actually changes.

use parley_core::{AppEvent, Credential, EventBus, FullJid, SessionStatus};
use tracing::debug;

#[derive(Debug)]
pub struct SessionContext {
    jid: Option<FullJid>,
    credential: Option<Credential>,
    status: SessionStatus,
    bus: EventBus,
}

impl SessionContext {
    pub fn new(bus: EventBus) -> Self {
        Self {
            jid: None,
            credential: None,
            status: SessionStatus::default(),
            bus,
        }
    }

    /// Store the identity and credential used by every (re)connect
    pub fn store(&mut self, jid: FullJid, credential: Credential) {
        self.jid = Some(jid);
        self.credential = Some(credential);
    }

    /// Drop the credential; a later disconnect then ends the session for good
    pub fn forget_credential(&mut self) {
        self.credential = None;
    }

    pub fn jid(&self) -> Option<&FullJid> {
        self.jid.as_ref()
    }

    /// Identity and credential for a reconnect, when both are on file
    pub fn credentials(&self) -> Option<(FullJid, Credential)> {
        match (&self.jid, &self.credential) {
            (Some(jid), Some(credential)) => Some((jid.clone(), credential.clone())),
            _ => None,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Connection established
    pub fn setup(&mut self, protocol: &str) {
        self.update(SessionStatus {
            connected: true,
            connecting: false,
            protocol: protocol.to_uppercase(),
        });
    }

    /// Connect attempt under way
    pub fn resume(&mut self) {
        self.update(SessionStatus {
            connecting: true,
            ..self.status.clone()
        });
    }

    /// Disconnected, possibly temporarily
    pub fn pause(&mut self) {
        self.update(SessionStatus {
            connected: false,
            connecting: false,
            protocol: self.status.protocol.clone(),
        });
    }

    /// Disconnected for good: identity unassigned and credential dropped
    pub fn clear(&mut self) {
        self.update(SessionStatus::default());
        self.jid = None;
        self.credential = None;
    }

    fn update(&mut self, status: SessionStatus) {
        if status == self.status {
            return;
        }
        debug!(
            "Session status: connected={} connecting={} protocol={:?}",
            status.connected, status.connecting, status.protocol
        );
        self.status = status.clone();
        self.bus.publish(AppEvent::SessionStatusChanged(status));
    }
}
