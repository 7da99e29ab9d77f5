//! Parley Runtime Engine
//!
//! This crate contains the session engine on top of `parley-core`:
//! - `SessionTask`: the actor owning connection lifecycle, requests and dispatch
//! - `SessionHandle`: the clonable facade callers talk to
//! - `RequestCorrelator`: pending `iq` requests keyed by identifier
//! - Receiver dispatch and the reconnect timer
//! - Feature modules (chat, archive) layered on the facade

pub mod builder;
pub mod correlator;
pub mod dispatch;
pub mod modules;
pub mod session;
pub mod timers;

pub use builder::SessionBuilder;
pub use correlator::RequestCorrelator;
pub use dispatch::{dispatch, Dispatch, NoopIngestor, ReceiverBinding, Receivers, StanzaIngestor};
pub use modules::{ArchiveModule, ChatModule, ChatState};
pub use session::{
    ConnectionSetup, InitialPresence, LinkManager, LinkStats, SessionContext, SessionHandle,
    SessionTask,
};

// Re-export core types for convenience
pub use parley_core::{
    AppEvent, BareJid, BrokerConfig, BrokerError, BrokerResult, ConnectError, Credential, Element,
    EventStream, EventTopic, FullJid, LinkState, RequestError, SessionConfig, SessionSnapshot,
    TransportStatus,
};
