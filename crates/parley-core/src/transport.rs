//! Transport abstraction for Parley sessions
//!
//! A transport owns the socket and the stream framing. It reports everything
//! (status changes, decoded stanzas, raw traffic) through the single
//! [`TransportEvents`] channel it receives on `connect`, which keeps the
//! session task the only place where connection state changes.

use crate::channel::communication::{LinkEvent, LinkId, TransportEvent, TransportStatus};
use crate::channel::utils::LinkEventSender;
use crate::config::RelayConfig;
use crate::errors::BrokerResult;
use crate::identity::{Credential, FullJid};
use crate::stanza::Element;
use tracing::trace;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// One live stream to the server
///
/// Methods are synchronous: a transport performs its I/O on its own tasks and
/// reports progress through `TransportEvents`. Every call is made from the
/// session task.
pub trait Transport: Send {
    /// Begin connecting and authenticating; progress is reported as statuses
    fn connect(
        &mut self,
        jid: &FullJid,
        credential: &Credential,
        events: TransportEvents,
    ) -> BrokerResult<()>;

    /// Ask the transport to terminate the stream
    fn disconnect(&mut self, reason: &str);

    /// Emit one stanza
    fn send(&mut self, stanza: &Element) -> BrokerResult<()>;

    /// Whether the stream is currently established
    fn is_connected(&self) -> bool;

    /// Protocol label of the established stream (e.g. "wss")
    fn protocol(&self) -> String;
}

/// Factory creating one transport per connect attempt
pub trait TransportProvider: Send + Sync {
    fn provide(&self, relay: &RelayConfig) -> BrokerResult<Box<dyn Transport>>;
}

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Reporting channel handed to a transport on `connect`
///
/// Every event is tagged with the link it belongs to, so reports from a
/// transport that has since been replaced are recognised and ignored.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    link: LinkId,
    sender: LinkEventSender,
}

impl TransportEvents {
    pub fn new(link: LinkId, sender: LinkEventSender) -> Self {
        Self { link, sender }
    }

    pub fn link(&self) -> LinkId {
        self.link
    }

    /// Report a status change
    pub fn status(&self, status: TransportStatus) -> bool {
        self.emit(TransportEvent::Status(status))
    }

    /// Deliver a decoded top-level stanza
    pub fn stanza(&self, stanza: Element) -> bool {
        self.emit(TransportEvent::Stanza(stanza))
    }

    /// Report undecoded inbound data
    pub fn raw_input<T: Into<String>>(&self, data: T) -> bool {
        self.emit(TransportEvent::RawInput(data.into()))
    }

    /// Report undecoded outbound data
    pub fn raw_output<T: Into<String>>(&self, data: T) -> bool {
        self.emit(TransportEvent::RawOutput(data.into()))
    }

    /// Returns false once the session task is gone
    fn emit(&self, event: TransportEvent) -> bool {
        let delivered = self
            .sender
            .send(LinkEvent {
                link: self.link,
                event,
            })
            .is_ok();
        if !delivered {
            trace!("Session task gone, dropping event from {}", self.link);
        }
        delivered
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
