//! Stanza document model
//!
//! The core never decodes wire bytes itself: transports hand it structured
//! `Element` trees and accept them back for emission. The session only inspects
//! routing fields (tag, `type`, `id`, `from`) and the nested error text of
//! responses; everything else is opaque payload for collaborators.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ----------------------------------------------------------------------------
// Namespaces
// ----------------------------------------------------------------------------

/// Protocol namespaces used by the bundled feature modules
pub mod ns {
    pub const MESSAGE_CORRECT: &str = "urn:xmpp:message-correct:0";
    pub const MESSAGE_RETRACT: &str = "urn:xmpp:message-retract:0";
    pub const CHAT_STATES: &str = "http://jabber.org/protocol/chatstates";
    pub const FASTEN: &str = "urn:xmpp:fasten:0";
    pub const FALLBACK: &str = "urn:xmpp:fallback:0";
    pub const REACTIONS: &str = "urn:xmpp:reactions:0";
    pub const HINTS: &str = "urn:xmpp:hints";
    pub const CARBONS: &str = "urn:xmpp:carbons:2";
    pub const MAM: &str = "urn:xmpp:mam:2";
    pub const RSM: &str = "http://jabber.org/protocol/rsm";
    pub const DATA: &str = "jabber:x:data";
    pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
}

// ----------------------------------------------------------------------------
// Stanza Categories and Types
// ----------------------------------------------------------------------------

/// Top-level stanza categories routed by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StanzaKind {
    Presence,
    Message,
    Iq,
}

impl StanzaKind {
    /// All categories, in binding order
    pub const ALL: [StanzaKind; 3] = [StanzaKind::Presence, StanzaKind::Message, StanzaKind::Iq];

    pub fn as_str(&self) -> &'static str {
        match self {
            StanzaKind::Presence => "presence",
            StanzaKind::Message => "message",
            StanzaKind::Iq => "iq",
        }
    }
}

impl fmt::Display for StanzaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StanzaKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "presence" => Ok(StanzaKind::Presence),
            "message" => Ok(StanzaKind::Message),
            "iq" => Ok(StanzaKind::Iq),
            _ => Err(()),
        }
    }
}

/// `type` attribute values of an `iq` stanza
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IqType {
    Get,
    Set,
    Result,
    Error,
}

impl IqType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IqType::Get => "get",
            IqType::Set => "set",
            IqType::Result => "result",
            IqType::Error => "error",
        }
    }

    /// Whether this type may open a correlated request
    pub fn is_request(&self) -> bool {
        matches!(self, IqType::Get | IqType::Set)
    }
}

impl FromStr for IqType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(IqType::Get),
            "set" => Ok(IqType::Set),
            "result" => Ok(IqType::Result),
            "error" => Ok(IqType::Error),
            _ => Err(()),
        }
    }
}

/// `type` attribute values of a `message` stanza
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Chat,
    Groupchat,
    Headline,
    Normal,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Chat => "chat",
            MessageType::Groupchat => "groupchat",
            MessageType::Headline => "headline",
            MessageType::Normal => "normal",
            MessageType::Error => "error",
        }
    }
}

// ----------------------------------------------------------------------------
// Element Tree
// ----------------------------------------------------------------------------

/// Child node of an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// Structured stanza document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    name: String,
    attrs: BTreeMap<String, String>,
    children: Vec<Node>,
}

impl Element {
    /// Create an empty element
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder: set an attribute
    pub fn attr<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Builder: set the `xmlns` attribute
    pub fn ns<V: Into<String>>(self, namespace: V) -> Self {
        self.attr("xmlns", namespace)
    }

    /// Builder: append a child element
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder: append a text node
    pub fn text<T: Into<String>>(mut self, text: T) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Append a child element in place
    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn set_attr<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Direct child elements
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// First direct child with the given tag name
    pub fn get_child(&self, name: &str) -> Option<&Element> {
        self.children().find(|child| child.name == name)
    }

    /// First descendant (depth-first, document order) with the given tag name
    pub fn find_descendant(&self, name: &str) -> Option<&Element> {
        for child in self.children() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated text content of this element and its descendants
    pub fn text_content(&self) -> String {
        let mut content = String::new();
        self.collect_text(&mut content);
        content
    }

    fn collect_text(&self, buffer: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(text) => buffer.push_str(text),
                Node::Element(element) => element.collect_text(buffer),
            }
        }
    }

    // Routing fields

    /// Top-level category, if the tag is one the session routes
    pub fn kind(&self) -> Option<StanzaKind> {
        self.name.parse().ok()
    }

    /// Raw `type` attribute
    pub fn stanza_type(&self) -> Option<&str> {
        self.get_attr("type")
    }

    /// `type` attribute of an `iq` stanza
    pub fn iq_type(&self) -> Option<IqType> {
        if self.kind() != Some(StanzaKind::Iq) {
            return None;
        }
        self.stanza_type().and_then(|kind| kind.parse().ok())
    }

    /// `id` attribute, treating an empty value as absent
    pub fn id(&self) -> Option<&str> {
        self.get_attr("id").filter(|id| !id.is_empty())
    }

    pub fn from(&self) -> Option<&str> {
        self.get_attr("from")
    }

    pub fn to(&self) -> Option<&str> {
        self.get_attr("to")
    }

    /// Human-readable error text (`<error><text>…</text></error>`), if any
    pub fn error_text(&self) -> Option<String> {
        let error = if self.name == "error" {
            Some(self)
        } else {
            self.find_descendant("error")
        }?;

        error
            .find_descendant("text")
            .map(Element::text_content)
            .filter(|text| !text.is_empty())
    }
}

// ----------------------------------------------------------------------------
// Stanza Builders
// ----------------------------------------------------------------------------

/// Generate a fresh stanza identifier
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Build an `iq` stanza with a freshly generated identifier
pub fn iq(kind: IqType) -> Element {
    Element::new("iq")
        .attr("type", kind.as_str())
        .attr("id", generate_id())
}

/// Build a `message` stanza addressed to `to`
pub fn message(to: &str, kind: Option<MessageType>) -> Element {
    let element = Element::new("message").attr("to", to);
    match kind {
        Some(kind) => element.attr("type", kind.as_str()),
        None => element,
    }
}

/// Build an empty `presence` stanza (initial availability)
pub fn presence() -> Element {
    Element::new("presence")
}

// ----------------------------------------------------------------------------
// Display (logging only; the wire codec belongs to the transport)
// ----------------------------------------------------------------------------

fn escape(text: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for ch in text.chars() {
        match ch {
            '&' => f.write_str("&amp;")?,
            '<' => f.write_str("&lt;")?,
            '>' => f.write_str("&gt;")?,
            '"' => f.write_str("&quot;")?,
            '\'' => f.write_str("&apos;")?,
            _ => write!(f, "{}", ch)?,
        }
    }
    Ok(())
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (key, value) in &self.attrs {
            write!(f, " {}=\"", key)?;
            escape(value, f)?;
            f.write_str("\"")?;
        }

        if self.children.is_empty() {
            return f.write_str("/>");
        }

        f.write_str(">")?;
        for node in &self.children {
            match node {
                Node::Element(element) => write!(f, "{}", element)?,
                Node::Text(text) => escape(text, f)?,
            }
        }
        write!(f, "</{}>", self.name)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
