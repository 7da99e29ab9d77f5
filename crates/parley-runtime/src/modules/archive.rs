//! Message archive queries.
//!
//! History pages are requested through a data form filtered on one
//! conversation partner. Archived messages arrive as ordinary `message`
//! stanzas (handed to the ingestor); the request resolves with the closing
//! `iq` result once the page is complete.

use crate::session::SessionHandle;
use parley_core::stanza::{self, ns};
use parley_core::{BareJid, BrokerResult, Element, IqType};

/// Messages fetched per history page
pub const HISTORY_PAGE_SIZE: usize = 40;

fn field(var: &str, value: &str) -> Element {
    Element::new("field")
        .attr("var", var)
        .child(Element::new("value").text(value))
}

/// Query for the page of history with `with` preceding `before_id`
pub fn archive_query(with: &BareJid, before_id: Option<&str>) -> Element {
    let mut form = Element::new("x")
        .ns(ns::DATA)
        .attr("type", "submit")
        .child(field("FORM_TYPE", ns::MAM).attr("type", "hidden"))
        .child(field("with", &with.to_string()));
    if let Some(before_id) = before_id {
        form.push_child(field("before-id", before_id));
    }

    let paging = Element::new("set")
        .ns(ns::RSM)
        .child(Element::new("max").text(HISTORY_PAGE_SIZE.to_string()));

    stanza::iq(IqType::Set).child(Element::new("query").ns(ns::MAM).child(form).child(paging))
}

/// Archive operations over a session
#[derive(Debug, Clone)]
pub struct ArchiveModule {
    session: SessionHandle,
}

impl ArchiveModule {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    /// Load one page of history; resolves with the archive's closing response
    pub async fn load_messages(
        &self,
        with: &BareJid,
        before_id: Option<&str>,
    ) -> BrokerResult<Element> {
        self.session.request(archive_query(with, before_id)).await
    }
}
