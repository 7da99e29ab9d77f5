//! Channel Communication Protocol Types
//!
//! All communication with the session task flows through these message types:
//! - `Command`: facade → session task, each carrying its own reply channel
//! - `LinkEvent`: transport → session task, tagged with the originating link
//! - `AppEvent`: session task and collaborators → UI/store subscribers

use crate::errors::BrokerResult;
use crate::identity::{BareJid, Credential, FullJid};
use crate::link_state::LinkState;
use crate::stanza::Element;
use core::fmt;
use core::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Completion channel for a single command
pub type Reply<T> = oneshot::Sender<BrokerResult<T>>;

// ----------------------------------------------------------------------------
// Command: Facade → Session Task
// ----------------------------------------------------------------------------

/// Commands sent from the session facade to the session task
#[derive(Debug)]
pub enum Command {
    /// Open a session for `jid`, resolving once connected or failed
    Authenticate {
        jid: FullJid,
        credential: Credential,
        reply: Reply<()>,
    },
    /// Emit a stanza without awaiting any response
    Send { stanza: Element, reply: Reply<()> },
    /// Emit a validated `iq` request and await its correlated response
    Request {
        id: String,
        stanza: Element,
        timeout: Duration,
        reply: Reply<Element>,
    },
    /// (Re)schedule a reconnect with the stored credential
    Reconnect { after: Duration, reply: Reply<()> },
    /// Terminate the session for good
    Logout { reply: Reply<()> },
    /// Read-only view of the session state
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    /// Release every timer, binding and transport, then stop the task
    Shutdown { reply: Reply<()> },
}

impl Command {
    /// Variant name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Authenticate { .. } => "Authenticate",
            Command::Send { .. } => "Send",
            Command::Request { .. } => "Request",
            Command::Reconnect { .. } => "Reconnect",
            Command::Logout { .. } => "Logout",
            Command::Snapshot { .. } => "Snapshot",
            Command::Shutdown { .. } => "Shutdown",
        }
    }
}

// ----------------------------------------------------------------------------
// LinkEvent: Transport → Session Task
// ----------------------------------------------------------------------------

/// Status transitions reported by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportStatus {
    /// The connection is currently being made
    Connecting,
    /// The connection is authenticating
    Authenticating,
    /// The connection has succeeded
    Connected,
    /// The connection is currently being terminated
    Disconnecting,
    /// The connection has been terminated
    Disconnected,
    /// The authentication attempt failed
    AuthFailure,
    /// The connection attempt failed
    ConnectFailure,
    /// The connection attempt timed out
    ConnectTimeout,
    /// A transport-level error occurred
    Error,
    /// The connection has been attached to an existing stream
    Attached,
    /// The connection has been redirected
    Redirect,
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportStatus::Connecting => "Connecting",
            TransportStatus::Authenticating => "Authenticating",
            TransportStatus::Connected => "Connected",
            TransportStatus::Disconnecting => "Disconnecting",
            TransportStatus::Disconnected => "Disconnected",
            TransportStatus::AuthFailure => "AuthFailure",
            TransportStatus::ConnectFailure => "ConnectFailure",
            TransportStatus::ConnectTimeout => "ConnectTimeout",
            TransportStatus::Error => "Error",
            TransportStatus::Attached => "Attached",
            TransportStatus::Redirect => "Redirect",
        };
        f.write_str(name)
    }
}

/// Everything a transport can report to the session task
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Lifecycle status change
    Status(TransportStatus),
    /// Decoded top-level stanza
    Stanza(Element),
    /// Undecoded inbound data (debug tracing only)
    RawInput(String),
    /// Undecoded outbound data (debug tracing only)
    RawOutput(String),
}

/// Identifier of one transport instance (one connect attempt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(u64);

impl LinkId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// A transport event tagged with the link that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEvent {
    pub link: LinkId,
    pub event: TransportEvent,
}

// ----------------------------------------------------------------------------
// AppEvent: Session Task / Collaborators → Subscribers
// ----------------------------------------------------------------------------

/// Connection flags mirrored to UI collaborators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub connected: bool,
    pub connecting: bool,
    pub protocol: String,
}

/// One-way notifications delivered to subscribers
///
/// Delivered at most once per occurrence and never replayed on reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppEvent {
    /// Session reached the connected state
    Connected { jid: FullJid },
    /// Session ended for good (logout, rejected credential, no credential)
    Disconnected { reason: Option<String> },
    /// Connection flags changed
    SessionStatusChanged(SessionStatus),
    /// A roster contact changed
    ContactChanged { jid: BareJid },
    /// A contact avatar changed
    AvatarChanged { jid: BareJid },
    /// The set of users composing in a room changed
    ComposingUsersChanged { room: BareJid, users: Vec<BareJid> },
    /// Messages were appended to a room
    MessagesAppended { room: BareJid, message_ids: Vec<String> },
    /// Messages were edited in a room
    MessagesUpdated { room: BareJid, message_ids: Vec<String> },
    /// Messages were retracted from a room
    MessagesDeleted { room: BareJid, message_ids: Vec<String> },
    /// The room list must be reloaded
    SidebarChanged,
    /// Room attributes (name, topic, members) changed
    RoomAttributesChanged { room: BareJid },
}

/// Subscription topics, one per notification family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    Lifecycle,
    Status,
    Contact,
    Avatar,
    Composing,
    Messages,
    Rooms,
}

impl AppEvent {
    /// Topic this event is published under
    pub fn topic(&self) -> EventTopic {
        match self {
            AppEvent::Connected { .. } | AppEvent::Disconnected { .. } => EventTopic::Lifecycle,
            AppEvent::SessionStatusChanged(_) => EventTopic::Status,
            AppEvent::ContactChanged { .. } => EventTopic::Contact,
            AppEvent::AvatarChanged { .. } => EventTopic::Avatar,
            AppEvent::ComposingUsersChanged { .. } => EventTopic::Composing,
            AppEvent::MessagesAppended { .. }
            | AppEvent::MessagesUpdated { .. }
            | AppEvent::MessagesDeleted { .. } => EventTopic::Messages,
            AppEvent::SidebarChanged | AppEvent::RoomAttributesChanged { .. } => EventTopic::Rooms,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Snapshot
// ----------------------------------------------------------------------------

/// Read-only view of a session, answered by the session task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: LinkState,
    pub jid: Option<FullJid>,
    pub status: SessionStatus,
    pub has_credential: bool,
    pub has_transport: bool,
    pub pending_requests: usize,
    pub receivers_bound: bool,
    pub reconnect_scheduled: bool,
    pub reconnect_attempts: u32,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
