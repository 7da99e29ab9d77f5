//! One-to-one messaging stanzas: messages, corrections, retractions, chat
//! states, reactions and message carbons.

use crate::session::SessionHandle;
use parley_core::stanza::{self, ns};
use parley_core::{BareJid, BrokerResult, Element, IqType, MessageType};

/// Body shown by clients that do not understand retractions
pub const RETRACT_MESSAGE_BODY: &str =
    "This person attempted to retract a previous message, but it's unsupported by your client.";

/// Chat state notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatState {
    Active,
    Composing,
    Paused,
    Inactive,
    Gone,
}

impl ChatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatState::Active => "active",
            ChatState::Composing => "composing",
            ChatState::Paused => "paused",
            ChatState::Inactive => "inactive",
            ChatState::Gone => "gone",
        }
    }
}

// ----------------------------------------------------------------------------
// Stanza Builders
// ----------------------------------------------------------------------------

fn chat(to: &BareJid) -> Element {
    stanza::message(&to.to_string(), Some(MessageType::Chat))
}

fn body(text: &str) -> Element {
    Element::new("body").text(text)
}

fn store_hint() -> Element {
    Element::new("store").ns(ns::HINTS)
}

pub fn message_stanza(to: &BareJid, text: &str) -> Element {
    chat(to).child(body(text))
}

/// Last message correction: `replacement` supersedes `original`
pub fn correction_stanza(to: &BareJid, text: &str, original: &str, replacement: &str) -> Element {
    stanza::message(&to.to_string(), None)
        .attr("id", replacement)
        .child(body(text))
        .child(
            Element::new("replace")
                .ns(ns::MESSAGE_CORRECT)
                .attr("id", original),
        )
}

pub fn retraction_stanza(to: &BareJid, message_id: &str) -> Element {
    chat(to)
        .child(body(RETRACT_MESSAGE_BODY))
        .child(
            Element::new("apply-to")
                .ns(ns::FASTEN)
                .attr("id", message_id)
                .child(Element::new("retract").ns(ns::MESSAGE_RETRACT)),
        )
        .child(Element::new("fallback").ns(ns::FALLBACK))
        .child(store_hint())
}

pub fn chat_state_stanza(to: &BareJid, state: ChatState) -> Element {
    chat(to).child(Element::new(state.as_str()).ns(ns::CHAT_STATES))
}

/// Reactions to one message; an empty set withdraws every reaction
pub fn reactions_stanza<'a, I>(to: &BareJid, message_id: &str, reactions: I) -> Element
where
    I: IntoIterator<Item = &'a str>,
{
    let list = reactions.into_iter().fold(
        Element::new("reactions")
            .ns(ns::REACTIONS)
            .attr("id", message_id),
        |list, reaction| list.child(Element::new("reaction").text(reaction)),
    );
    chat(to).child(list).child(store_hint())
}

pub fn carbons_stanza(enabled: bool) -> Element {
    let toggle = if enabled { "enable" } else { "disable" };
    stanza::iq(IqType::Set).child(Element::new(toggle).ns(ns::CARBONS))
}

// ----------------------------------------------------------------------------
// Chat Module
// ----------------------------------------------------------------------------

/// Messaging operations over a session
#[derive(Debug, Clone)]
pub struct ChatModule {
    session: SessionHandle,
}

impl ChatModule {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    pub async fn send_message(&self, to: &BareJid, text: &str) -> BrokerResult<()> {
        self.session.send(message_stanza(to, text)).await
    }

    pub async fn update_message(
        &self,
        to: &BareJid,
        text: &str,
        original: &str,
        replacement: &str,
    ) -> BrokerResult<()> {
        self.session
            .send(correction_stanza(to, text, original, replacement))
            .await
    }

    pub async fn retract_message(&self, to: &BareJid, message_id: &str) -> BrokerResult<()> {
        self.session.send(retraction_stanza(to, message_id)).await
    }

    pub async fn send_chat_state(&self, to: &BareJid, state: ChatState) -> BrokerResult<()> {
        self.session.send(chat_state_stanza(to, state)).await
    }

    pub async fn send_reactions(
        &self,
        to: &BareJid,
        message_id: &str,
        reactions: &[&str],
    ) -> BrokerResult<()> {
        self.session
            .send(reactions_stanza(to, message_id, reactions.iter().copied()))
            .await
    }

    /// Toggle message carbons; resolves once the server acknowledged
    pub async fn set_message_carbons_enabled(&self, enabled: bool) -> BrokerResult<()> {
        self.session.request(carbons_stanza(enabled)).await.map(|_| ())
    }
}
