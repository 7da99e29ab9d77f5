//! Request Correlator
//!
//! Matches inbound responses to outstanding `iq` requests by identifier. Each
//! pending entry is removed exactly once: by a matching stanza, by its timeout,
//! by bulk cancellation on disconnect, or when the transport refuses to emit it.
//! The responder is a oneshot sender, so a second completion is impossible by
//! construction.

use crate::timers::{arm, TimerEvent, TimerSender, Tickets};
use core::time::Duration;
use hashbrown::HashMap;
use parley_core::{BrokerError, Element, IqType, Reply, RequestError, StanzaKind};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ----------------------------------------------------------------------------
// Pending Request
// ----------------------------------------------------------------------------

/// One outstanding request awaiting its response
#[derive(Debug)]
pub struct PendingRequest {
    ticket: u64,
    responder: Reply<Element>,
    timeout: JoinHandle<()>,
}

impl PendingRequest {
    fn complete(self, outcome: Result<Element, BrokerError>) {
        self.timeout.abort();
        // Caller gave up waiting; the outcome has no audience
        let _ = self.responder.send(outcome);
    }
}

// ----------------------------------------------------------------------------
// Request Correlator
// ----------------------------------------------------------------------------

/// Table of outstanding requests keyed by stanza identifier
#[derive(Debug)]
pub struct RequestCorrelator {
    pending: HashMap<String, PendingRequest>,
    tickets: Tickets,
    timers: TimerSender,
}

impl RequestCorrelator {
    pub fn new(timers: TimerSender) -> Self {
        Self {
            pending: HashMap::new(),
            tickets: Tickets::default(),
            timers,
        }
    }

    /// Validate an outbound request and extract its identifier
    ///
    /// The root must be an `iq` of type `get` or `set` carrying a non-empty id.
    pub fn request_id(stanza: &Element) -> Result<String, RequestError> {
        if stanza.kind() != Some(StanzaKind::Iq) {
            return Err(RequestError::NotAnIq {
                tag: stanza.name().to_string(),
            });
        }

        match stanza.iq_type() {
            Some(kind) if kind.is_request() => {}
            _ => {
                return Err(RequestError::InvalidIqType {
                    kind: stanza.stanza_type().unwrap_or("null").to_string(),
                })
            }
        }

        stanza
            .id()
            .map(str::to_string)
            .ok_or(RequestError::MissingId)
    }

    /// Register a pending request and arm its timeout
    ///
    /// Returns false, failing `responder` with `DuplicateId`, when a request
    /// with the same identifier is still outstanding.
    pub fn insert(&mut self, id: String, timeout: Duration, responder: Reply<Element>) -> bool {
        if self.pending.contains_key(&id) {
            warn!("Refusing request #{}: identifier already pending", id);
            let _ = responder.send(Err(RequestError::DuplicateId { id }.into()));
            return false;
        }

        let ticket = self.tickets.issue();
        let handle = arm(
            timeout,
            &self.timers,
            TimerEvent::RequestExpired {
                id: id.clone(),
                ticket,
            },
        );
        debug!("Pending request #{} armed for {:?}", id, timeout);

        self.pending.insert(
            id,
            PendingRequest {
                ticket,
                responder,
                timeout: handle,
            },
        );
        true
    }

    /// Offer an inbound stanza; returns whether it answered a pending request
    pub fn resolve(&mut self, stanza: &Element) -> bool {
        let Some(id) = stanza.id() else {
            return false;
        };
        let Some(request) = self.pending.remove(id) else {
            return false;
        };

        let from = stanza.from().unwrap_or_default();
        if stanza.kind() == Some(StanzaKind::Iq) && stanza.iq_type() == Some(IqType::Result) {
            info!("Pending request #{} to: '{}' response received", id, from);
            request.complete(Ok(stanza.clone()));
        } else {
            let error = BrokerError::protocol(stanza.error_text());
            warn!(
                "Pending request #{} to: '{}' received error reply: {}",
                id, from, error
            );
            request.complete(Err(error));
        }
        true
    }

    /// Handle a request timeout; stale tickets are ignored
    pub fn expire(&mut self, id: &str, ticket: u64) -> bool {
        match self.pending.get(id) {
            Some(request) if request.ticket == ticket => {}
            _ => return false,
        }

        if let Some(request) = self.pending.remove(id) {
            warn!("Pending request #{} has been cancelled (timed out)", id);
            request.complete(Err(BrokerError::Cancelled));
            return true;
        }
        false
    }

    /// Remove one request, failing it with `error`
    pub fn abandon(&mut self, id: &str, error: BrokerError) -> bool {
        match self.pending.remove(id) {
            Some(request) => {
                debug!("Pending request #{} abandoned: {}", id, error);
                request.complete(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding request with `error`, emptying the table
    pub fn cancel_all(&mut self, error: BrokerError) -> usize {
        let count = self.pending.len();
        if count > 0 {
            warn!("Cancelling {} pending request(s): {}", count, error);
        }
        for (_, request) in self.pending.drain() {
            request.complete(Err(error.clone()));
        }
        count
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for RequestCorrelator {
    fn drop(&mut self) {
        self.cancel_all(BrokerError::Disconnected);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timers::{create_timer_channel, TimerReceiver};
    use parley_core::stanza::{self, ns};
    use tokio::sync::oneshot;

    fn create_test_correlator() -> (RequestCorrelator, TimerReceiver) {
        let (sender, receiver) = create_timer_channel();
        (RequestCorrelator::new(sender), receiver)
    }

    fn create_test_response(id: &str, kind: &str) -> Element {
        Element::new("iq")
            .attr("type", kind)
            .attr("id", id)
            .attr("from", "example.com")
    }

    #[test]
    fn test_request_validation() {
        let valid = stanza::iq(IqType::Get).attr("id", "q1");
        assert_eq!(RequestCorrelator::request_id(&valid), Ok("q1".to_string()));

        assert_eq!(
            RequestCorrelator::request_id(&stanza::message("bob@example.com", None)),
            Err(RequestError::NotAnIq {
                tag: "message".to_string()
            })
        );
        assert_eq!(
            RequestCorrelator::request_id(&create_test_response("q2", "result")),
            Err(RequestError::InvalidIqType {
                kind: "result".to_string()
            })
        );
        assert_eq!(
            RequestCorrelator::request_id(&Element::new("iq").attr("id", "q3")),
            Err(RequestError::InvalidIqType {
                kind: "null".to_string()
            })
        );
        assert_eq!(
            RequestCorrelator::request_id(&Element::new("iq").attr("type", "set")),
            Err(RequestError::MissingId)
        );
    }

    #[tokio::test]
    async fn test_result_resolves_success() {
        let (mut correlator, _timers) = create_test_correlator();
        let (responder, response) = oneshot::channel();

        assert!(correlator.insert("q1".to_string(), Duration::from_secs(10), responder));
        assert!(correlator.is_pending("q1"));

        let reply = create_test_response("q1", "result");
        assert!(correlator.resolve(&reply));
        assert!(correlator.is_empty());
        assert_eq!(response.await.unwrap(), Ok(reply.clone()));

        // Second arrival of the same id is not claimed
        assert!(!correlator.resolve(&reply));
    }

    #[tokio::test]
    async fn test_error_reply_carries_text() {
        let (mut correlator, _timers) = create_test_correlator();
        let (responder, response) = oneshot::channel();
        correlator.insert("q1".to_string(), Duration::from_secs(10), responder);

        let reply = create_test_response("q1", "error").child(
            Element::new("error").attr("type", "cancel").child(
                Element::new("text")
                    .ns(ns::STANZAS)
                    .text("Item not found"),
            ),
        );
        assert!(correlator.resolve(&reply));
        assert_eq!(
            response.await.unwrap(),
            Err(BrokerError::Protocol {
                text: "Item not found".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_non_iq_reply_without_text_fails() {
        let (mut correlator, _timers) = create_test_correlator();
        let (responder, response) = oneshot::channel();
        correlator.insert("shared".to_string(), Duration::from_secs(10), responder);

        let reply = stanza::message("alice@example.com", None).attr("id", "shared");
        assert!(correlator.resolve(&reply));
        assert_eq!(
            response.await.unwrap(),
            Err(BrokerError::Protocol {
                text: "Failed".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let (mut correlator, _timers) = create_test_correlator();
        let (first, _first_response) = oneshot::channel();
        let (second, second_response) = oneshot::channel();

        assert!(correlator.insert("q1".to_string(), Duration::from_secs(10), first));
        assert!(!correlator.insert("q1".to_string(), Duration::from_secs(10), second));
        assert_eq!(correlator.len(), 1);
        assert_eq!(
            second_response.await.unwrap(),
            Err(BrokerError::Validation(RequestError::DuplicateId {
                id: "q1".to_string()
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_expires_exactly_once() {
        let (mut correlator, mut timers) = create_test_correlator();
        let (responder, response) = oneshot::channel();
        correlator.insert("q1".to_string(), Duration::from_secs(10), responder);

        let fired = timers.recv().await.unwrap();
        let TimerEvent::RequestExpired { id, ticket } = fired else {
            panic!("Expected request expiry");
        };
        assert_eq!(id, "q1");

        assert!(correlator.expire(&id, ticket));
        assert!(!correlator.expire(&id, ticket));
        assert_eq!(response.await.unwrap(), Err(BrokerError::Cancelled));

        // Late response after the timeout is not claimed
        assert!(!correlator.resolve(&create_test_response("q1", "result")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_ticket_ignored() {
        let (mut correlator, _timers) = create_test_correlator();
        let (responder, _response) = oneshot::channel();
        correlator.insert("q1".to_string(), Duration::from_secs(10), responder);

        assert!(!correlator.expire("q1", 999));
        assert!(correlator.is_pending("q1"));
    }

    #[tokio::test]
    async fn test_cancel_all_fails_every_request() {
        let (mut correlator, _timers) = create_test_correlator();
        let mut responses = Vec::new();
        for id in ["a", "b", "c"] {
            let (responder, response) = oneshot::channel();
            correlator.insert(id.to_string(), Duration::from_secs(10), responder);
            responses.push(response);
        }

        assert_eq!(correlator.cancel_all(BrokerError::Disconnected), 3);
        assert!(correlator.is_empty());
        for response in responses {
            assert_eq!(response.await.unwrap(), Err(BrokerError::Disconnected));
        }
    }

    #[tokio::test]
    async fn test_abandon_on_transport_rejection() {
        let (mut correlator, _timers) = create_test_correlator();
        let (responder, response) = oneshot::channel();
        correlator.insert("q1".to_string(), Duration::from_secs(10), responder);

        let error = BrokerError::transport_error("socket closed");
        assert!(correlator.abandon("q1", error.clone()));
        assert!(!correlator.abandon("q1", error.clone()));
        assert_eq!(response.await.unwrap(), Err(error));
    }
}
