//! Feature Modules
//!
//! Thin protocol features layered on the session facade. Each module owns no
//! state of its own: it builds stanzas and hands them to a `SessionHandle`.

pub mod archive;
pub mod chat;

pub use archive::{ArchiveModule, HISTORY_PAGE_SIZE};
pub use chat::{ChatModule, ChatState, RETRACT_MESSAGE_BODY};
