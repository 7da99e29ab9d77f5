//! Channel Module
//!
//! This module contains the actor channel infrastructure:
//! - `communication`: commands, transport events and app events
//! - `bus`: topic-based publish/subscribe for collaborator notifications
//! - `utils`: channel aliases and constructors for the session task

pub mod bus;
pub mod communication;
pub mod utils;

pub use bus::{EventBus, EventStream};
pub use communication::{
    AppEvent, Command, EventTopic, LinkEvent, LinkId, Reply, SessionSnapshot, SessionStatus,
    TransportEvent, TransportStatus,
};
pub use utils::{
    create_command_channel, create_link_channel, CommandReceiver, CommandSender,
    LinkEventReceiver, LinkEventSender,
};
