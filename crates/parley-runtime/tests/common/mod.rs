//! Shared fixtures for the session integration tests

#![allow(dead_code)]

use core::time::Duration;
use parley_core::{stanza, AppEvent, EventStream, StanzaKind};
use parley_harness::{init_test_logging, MockBehavior, MockTransportProvider, TransportProbe};
use parley_runtime::{
    BrokerConfig, BrokerResult, Element, FullJid, SessionBuilder, SessionHandle, StanzaIngestor,
};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

// ----------------------------------------------------------------------------
// Recording Ingestor
// ----------------------------------------------------------------------------

/// Ingestor remembering every stanza handed to it
#[derive(Debug, Clone, Default)]
pub struct RecordingIngestor {
    seen: Arc<Mutex<Vec<(StanzaKind, Element)>>>,
}

impl RecordingIngestor {
    fn record(&self, kind: StanzaKind, stanza: &Element) {
        self.seen.lock().unwrap().push((kind, stanza.clone()));
    }

    pub fn seen(&self) -> Vec<(StanzaKind, Element)> {
        self.seen.lock().unwrap().clone()
    }
}

impl StanzaIngestor for RecordingIngestor {
    fn presence(&mut self, stanza: &Element) {
        self.record(StanzaKind::Presence, stanza);
    }

    fn message(&mut self, stanza: &Element) {
        self.record(StanzaKind::Message, stanza);
    }

    fn iq(&mut self, stanza: &Element) {
        self.record(StanzaKind::Iq, stanza);
    }
}

// ----------------------------------------------------------------------------
// Session Fixture
// ----------------------------------------------------------------------------

pub struct TestSession {
    pub handle: SessionHandle,
    pub probe: TransportProbe,
    pub ingested: RecordingIngestor,
    pub task: JoinHandle<BrokerResult<()>>,
}

pub fn create_test_jid() -> FullJid {
    "alice@example.com/phone".parse().unwrap()
}

pub fn create_test_session_with(config: BrokerConfig, behavior: MockBehavior) -> TestSession {
    init_test_logging();

    let provider = MockTransportProvider::new(behavior);
    let probe = provider.probe();
    let ingested = RecordingIngestor::default();
    let (handle, task) = SessionBuilder::new(provider)
        .with_config(config)
        .with_ingestor(ingested.clone())
        .spawn()
        .unwrap();

    TestSession {
        handle,
        probe,
        ingested,
        task,
    }
}

pub fn create_test_session(behavior: MockBehavior) -> TestSession {
    create_test_session_with(BrokerConfig::testing(), behavior)
}

/// Authenticated session whose initial presence has gone out
pub async fn create_connected_session(config: BrokerConfig) -> TestSession {
    let session = create_test_session_with(config, MockBehavior::default());
    session
        .handle
        .authenticate(create_test_jid(), "secret")
        .await
        .unwrap();
    session.probe.wait_for_sent(1).await;
    session
}

// ----------------------------------------------------------------------------
// Stanza Helpers
// ----------------------------------------------------------------------------

pub fn create_test_request() -> Element {
    stanza::iq(parley_core::IqType::Get)
        .attr("to", "example.com")
        .child(Element::new("ping").ns("urn:xmpp:ping"))
}

pub fn create_test_result(request: &Element) -> Element {
    Element::new("iq")
        .attr("type", "result")
        .attr("id", request.id().unwrap())
        .attr("from", "example.com")
}

pub fn create_test_error(request: &Element, text: &str) -> Element {
    Element::new("iq")
        .attr("type", "error")
        .attr("id", request.id().unwrap())
        .attr("from", "example.com")
        .child(
            Element::new("error").attr("type", "cancel").child(
                Element::new("text")
                    .ns(stanza::ns::STANZAS)
                    .text(text),
            ),
        )
}

/// Next event on `stream`, failing the test instead of hanging
pub async fn next_event(stream: &mut EventStream) -> AppEvent {
    tokio::time::timeout(Duration::from_secs(60), stream.next())
        .await
        .expect("no event within a minute")
        .expect("event bus closed")
}
