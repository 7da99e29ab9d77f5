//! Session Facade
//!
//! `SessionHandle` is the caller-facing surface of a session. Every operation
//! becomes a `Command` for the session task and resolves through its own
//! oneshot reply, so each caller receives exactly its own outcome.

use crate::correlator::RequestCorrelator;
use core::time::Duration;
use parley_core::channel::CommandSender;
use parley_core::{
    BrokerError, BrokerResult, Command, ConnectError, Credential, Element, EventBus, EventStream,
    EventTopic, FullJid, Reply, SessionSnapshot,
};
use tokio::sync::oneshot;

/// Clonable handle to a running session task
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: CommandSender,
    bus: EventBus,
    request_timeout: Duration,
}

impl SessionHandle {
    pub(crate) fn new(commands: CommandSender, bus: EventBus, request_timeout: Duration) -> Self {
        Self {
            commands,
            bus,
            request_timeout,
        }
    }

    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> BrokerResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| BrokerError::channel_error("Session task is not running"))?;
        response
            .await
            .map_err(|_| BrokerError::channel_error("Session task dropped the reply"))?
    }

    /// Open a session, resolving once connected or failed
    ///
    /// Fails with `MissingCredential` for an empty credential, and with
    /// `AlreadyConnecting` / `AlreadyConnected` while another attempt or
    /// connection exists. Any other failure clears the session.
    pub async fn authenticate(
        &self,
        jid: FullJid,
        credential: impl Into<Credential>,
    ) -> BrokerResult<()> {
        let credential = credential.into();
        if credential.is_empty() {
            return Err(ConnectError::MissingCredential.into());
        }
        self.call(|reply| Command::Authenticate {
            jid,
            credential,
            reply,
        })
        .await
    }

    /// Emit a stanza without awaiting a response; `Disconnected` when offline
    pub async fn send(&self, stanza: Element) -> BrokerResult<()> {
        self.call(|reply| Command::Send { stanza, reply }).await
    }

    /// Emit an `iq` request and await its response with the default timeout
    pub async fn request(&self, stanza: Element) -> BrokerResult<Element> {
        self.request_with_timeout(stanza, self.request_timeout).await
    }

    /// Emit an `iq` request and await its response
    ///
    /// Validation happens before anything is queued: a malformed request never
    /// reaches the transport.
    pub async fn request_with_timeout(
        &self,
        stanza: Element,
        timeout: Duration,
    ) -> BrokerResult<Element> {
        let id = RequestCorrelator::request_id(&stanza)?;
        self.call(|reply| Command::Request {
            id,
            stanza,
            timeout,
            reply,
        })
        .await
    }

    /// (Re)schedule a reconnect with the stored credential after `after`
    pub async fn reconnect(&self, after: Duration) -> BrokerResult<()> {
        self.call(|reply| Command::Reconnect { after, reply }).await
    }

    /// End the session for good
    pub async fn logout(&self) -> BrokerResult<()> {
        self.call(|reply| Command::Logout { reply }).await
    }

    pub async fn snapshot(&self) -> BrokerResult<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| BrokerError::channel_error("Session task is not running"))?;
        response
            .await
            .map_err(|_| BrokerError::channel_error("Session task dropped the reply"))
    }

    /// Release everything and stop the session task
    pub async fn shutdown(&self) -> BrokerResult<()> {
        self.call(|reply| Command::Shutdown { reply }).await
    }

    /// Subscribe to every notification
    pub fn events(&self) -> EventStream {
        self.bus.subscribe()
    }

    pub fn subscribe_to(&self, topics: &[EventTopic]) -> EventStream {
        self.bus.subscribe_to(topics)
    }

    /// Bus collaborators publish their own notifications on
    pub fn publisher(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}
