//! Parley Core
//!
//! Foundational types for the Parley session connection manager:
//! - `stanza`: the structured document model exchanged with the transport
//! - `identity`: principal identifiers and transient credentials
//! - `errors`: the error hierarchy surfaced to callers
//! - `config`: session, channel and relay configuration
//! - `link_state`: the connection lifecycle transition table
//! - `transport`: the boundary every socket implementation plugs into
//! - `channel`: the typed messages flowing between facade, actor and collaborators
//!
//! The runtime engine lives in `parley-runtime`; this crate only holds the stable
//! API definitions shared by the engine, transports and UI collaborators.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod identity;
pub mod link_state;
pub mod stanza;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{
    AppEvent, Command, EventBus, EventStream, EventTopic, LinkEvent, LinkId, Reply,
    SessionSnapshot, SessionStatus, TransportEvent, TransportStatus,
};
pub use config::{BrokerConfig, ChannelConfig, RelayConfig, SessionConfig};
pub use errors::{BrokerError, BrokerResult, ConnectError, RequestError, Result};
pub use identity::{BareJid, Credential, FullJid};
pub use link_state::{AuditEntry, LinkAction, LinkState, StateTransitionError, Transition};
pub use stanza::{Element, IqType, MessageType, Node, StanzaKind};
pub use transport::{Transport, TransportEvents, TransportProvider};
