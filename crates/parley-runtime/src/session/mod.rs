//! Session Module
//!
//! One session per authenticated identity:
//! - `task`: the actor owning all mutable session state
//! - `handle`: the clonable facade callers talk to
//! - `context`: identity, credential and status flags
//! - `link`: lifecycle state with its audit trail
//! - `setup`: connection-scoped setup run on every connect

pub mod context;
pub mod handle;
pub mod link;
pub mod setup;
pub mod task;

pub use context::SessionContext;
pub use handle::SessionHandle;
pub use link::{LinkManager, LinkStats};
pub use setup::{ConnectionSetup, InitialPresence};
pub use task::SessionTask;
