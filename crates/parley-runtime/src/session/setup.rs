//! Connection-scoped setup run every time a link reaches `Connected`.

use parley_core::{stanza, Element, FullJid};

/// Produces the stanzas emitted right after a connection is established
pub trait ConnectionSetup: Send {
    fn initial_stanzas(&mut self, jid: &FullJid) -> Vec<Element>;
}

/// Announces initial availability with an empty `<presence/>`
#[derive(Debug, Clone, Copy, Default)]
pub struct InitialPresence;

impl ConnectionSetup for InitialPresence {
    fn initial_stanzas(&mut self, _jid: &FullJid) -> Vec<Element> {
        vec![stanza::presence()]
    }
}
