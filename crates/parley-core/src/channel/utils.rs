//! Channel Utilities for CSP Communication
//!
//! Type aliases and constructors for the channels feeding the session task.

use crate::channel::communication::{Command, LinkEvent};
use crate::config::ChannelConfig;

pub type CommandSender = tokio::sync::mpsc::Sender<Command>;
pub type CommandReceiver = tokio::sync::mpsc::Receiver<Command>;
pub type LinkEventSender = tokio::sync::mpsc::UnboundedSender<LinkEvent>;
pub type LinkEventReceiver = tokio::sync::mpsc::UnboundedReceiver<LinkEvent>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create bounded command channel (Facade → Session Task)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    tokio::sync::mpsc::channel(config.command_buffer_size.max(1))
}

/// Create the link event channel (Transport → Session Task)
///
/// Unbounded because transports report from synchronous callbacks and every
/// status must be observed in arrival order.
pub fn create_link_channel() -> (LinkEventSender, LinkEventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}
