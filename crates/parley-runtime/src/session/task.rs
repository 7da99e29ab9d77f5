//! Session Task Implementation
//!
//! The single actor owning a session: its link state, transport, pending
//! requests, receivers and reconnect timer. Everything that mutates those
//! happens here, one event at a time.

use super::context::SessionContext;
use super::link::LinkManager;
use super::setup::ConnectionSetup;
use crate::correlator::RequestCorrelator;
use crate::dispatch::{dispatch, Receivers, StanzaIngestor};
use crate::timers::{ReconnectTimer, TimerEvent, TimerReceiver, TimerSender};
use core::time::Duration;
use parley_core::channel::{CommandReceiver, LinkEventReceiver, LinkEventSender};
use parley_core::{
    AppEvent, BrokerConfig, BrokerError, BrokerResult, Command, ConnectError, Credential, Element,
    FullJid, LinkAction, LinkEvent, LinkId, LinkState, Reply, SessionSnapshot, Transport,
    TransportEvent, TransportEvents, TransportProvider, TransportStatus,
};
use tracing::{debug, error, info, trace, warn};

// ----------------------------------------------------------------------------
// Connect Bookkeeping
// ----------------------------------------------------------------------------

/// What started the connect attempt in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectOrigin {
    Authenticate,
    Reconnect,
}

/// The connect attempt in flight and whoever awaits its outcome
#[derive(Debug)]
struct ConnectLifecycle {
    origin: ConnectOrigin,
    responder: Option<Reply<()>>,
}

/// The one live transport and the link id its events carry
struct ActiveLink {
    id: LinkId,
    transport: Box<dyn Transport>,
}

// ----------------------------------------------------------------------------
// Session Task
// ----------------------------------------------------------------------------

/// The session actor; run it with [`SessionTask::run`]
pub struct SessionTask {
    config: BrokerConfig,
    provider: Box<dyn TransportProvider>,
    ingestor: Box<dyn StanzaIngestor>,
    setup: Box<dyn ConnectionSetup>,

    context: SessionContext,
    link: LinkManager,
    active: Option<ActiveLink>,
    next_link: LinkId,
    lifecycle: Option<ConnectLifecycle>,
    /// Current link reached `Connected`
    established: bool,
    /// Logout requested; the coming disconnect is final
    closing: bool,

    correlator: RequestCorrelator,
    receivers: Receivers,
    reconnect: ReconnectTimer,
    reconnect_attempts: u32,

    command_receiver: CommandReceiver,
    link_sender: LinkEventSender,
    link_receiver: LinkEventReceiver,
    timer_sender: TimerSender,
    timer_receiver: TimerReceiver,
    running: bool,
}

impl SessionTask {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: BrokerConfig,
        provider: Box<dyn TransportProvider>,
        ingestor: Box<dyn StanzaIngestor>,
        setup: Box<dyn ConnectionSetup>,
        context: SessionContext,
        command_receiver: CommandReceiver,
        (link_sender, link_receiver): (LinkEventSender, LinkEventReceiver),
        (timer_sender, timer_receiver): (TimerSender, TimerReceiver),
    ) -> Self {
        Self {
            config,
            provider,
            ingestor,
            setup,
            context,
            link: LinkManager::new(),
            active: None,
            next_link: LinkId::new(1),
            lifecycle: None,
            established: false,
            closing: false,
            correlator: RequestCorrelator::new(timer_sender.clone()),
            receivers: Receivers::default(),
            reconnect: ReconnectTimer::default(),
            reconnect_attempts: 0,
            command_receiver,
            link_sender,
            link_receiver,
            timer_sender,
            timer_receiver,
            running: true,
        }
    }

    /// Run the session loop until shutdown or until every handle is dropped
    ///
    /// Transport events are drained before timers, and timers before
    /// commands, so a command always observes every status already reported.
    pub async fn run(mut self) -> BrokerResult<()> {
        info!("Session task starting");

        while self.running {
            tokio::select! {
                biased;

                Some(event) = self.link_receiver.recv() => {
                    self.handle_link_event(event);
                }

                Some(timer) = self.timer_receiver.recv() => {
                    self.handle_timer(timer);
                }

                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            info!("Command channel closed, shutting down");
                            self.teardown();
                            break;
                        }
                    }
                }
            }
        }

        let stats = self.link.stats();
        info!(
            "Session task stopped ({} transitions, {} rejected statuses, {} connect attempts)",
            stats.state_transitions, stats.invalid_transitions, stats.connect_attempts
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        debug!("Processing {} command", command.name());

        match command {
            Command::Authenticate {
                jid,
                credential,
                reply,
            } => self.handle_authenticate(jid, credential, reply),
            Command::Send { stanza, reply } => {
                let _ = reply.send(self.emit(&stanza));
            }
            Command::Request {
                id,
                stanza,
                timeout,
                reply,
            } => self.handle_request(id, stanza, timeout, reply),
            Command::Reconnect { after, reply } => {
                let _ = reply.send(self.handle_reconnect(after));
            }
            Command::Logout { reply } => {
                self.handle_logout();
                let _ = reply.send(Ok(()));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown { reply } => {
                self.teardown();
                self.running = false;
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn handle_authenticate(&mut self, jid: FullJid, credential: Credential, reply: Reply<()>) {
        if credential.is_empty() {
            let _ = reply.send(Err(ConnectError::MissingCredential.into()));
            return;
        }
        if let Err(error) = self.link.state().begin_connect() {
            let _ = reply.send(Err(error.into()));
            return;
        }

        info!("Authenticating as {}", jid);
        self.reconnect.cancel();
        self.reconnect_attempts = 0;
        self.context.store(jid.clone(), credential.clone());

        match self.open_link(&jid, &credential) {
            Ok(()) => {
                self.lifecycle = Some(ConnectLifecycle {
                    origin: ConnectOrigin::Authenticate,
                    responder: Some(reply),
                });
            }
            Err(error) => {
                error!("Could not connect: {}", error);
                self.clear_session(Some(error.to_string()));
                let _ = reply.send(Err(error));
            }
        }
    }

    fn handle_request(
        &mut self,
        id: String,
        stanza: Element,
        timeout: Duration,
        reply: Reply<Element>,
    ) {
        if !self.is_live() {
            let _ = reply.send(Err(BrokerError::Disconnected));
            return;
        }
        if !self.correlator.insert(id.clone(), timeout, reply) {
            return;
        }
        if let Err(error) = self.emit(&stanza) {
            self.correlator.abandon(&id, error);
        }
    }

    fn handle_reconnect(&mut self, after: Duration) -> BrokerResult<()> {
        if !self.context.has_credential() {
            return Err(ConnectError::NoCredential.into());
        }
        if self.active.is_some() {
            return Err(ConnectError::ConnectionActive.into());
        }

        self.schedule_reconnect(after);
        Ok(())
    }

    fn handle_logout(&mut self) {
        info!("Logging out");
        self.context.forget_credential();
        self.reconnect.cancel();

        match self.active.as_mut() {
            Some(active) => {
                self.closing = true;
                active.transport.disconnect("logout");
            }
            None if self.link.state() != LinkState::Idle || self.context.jid().is_some() => {
                self.clear_session(None);
            }
            None => debug!("Nothing to log out from"),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.link.state(),
            jid: self.context.jid().cloned(),
            status: self.context.status().clone(),
            has_credential: self.context.has_credential(),
            has_transport: self.active.is_some(),
            pending_requests: self.correlator.len(),
            receivers_bound: self.receivers.is_bound(),
            reconnect_scheduled: self.reconnect.is_scheduled(),
            reconnect_attempts: self.reconnect_attempts,
        }
    }

    // ------------------------------------------------------------------------
    // Transport Events
    // ------------------------------------------------------------------------

    fn handle_link_event(&mut self, LinkEvent { link, event }: LinkEvent) {
        if self.active.as_ref().map(|active| active.id) != Some(link) {
            trace!("Ignoring {:?} from stale {}", event, link);
            return;
        }

        match event {
            TransportEvent::Status(status) => self.handle_status(status),
            TransportEvent::Stanza(stanza) => {
                let outcome = dispatch(
                    &stanza,
                    &self.receivers,
                    &mut self.correlator,
                    self.ingestor.as_mut(),
                );
                trace!("Inbound <{}/> dispatched: {:?}", stanza.name(), outcome);
            }
            TransportEvent::RawInput(data) => debug!("(in) {}", data),
            TransportEvent::RawOutput(data) => debug!("(out) {}", data),
        }
    }

    fn handle_status(&mut self, status: TransportStatus) {
        match status {
            TransportStatus::Connecting => debug!("Connecting…"),
            TransportStatus::Authenticating => debug!("Authenticating…"),
            TransportStatus::Connected => info!("Connected"),
            TransportStatus::Disconnecting => debug!("Disconnecting…"),
            TransportStatus::Disconnected => warn!("Disconnected"),
            TransportStatus::AuthFailure => error!("Authentication failure"),
            TransportStatus::ConnectFailure => error!("Connection failure"),
            TransportStatus::ConnectTimeout => error!("Connection timed out"),
            TransportStatus::Error => error!("Connection error"),
            TransportStatus::Attached => info!("Connection has been attached to"),
            TransportStatus::Redirect => info!("Connection has been redirected"),
        }

        match self.link.apply(status) {
            Ok(transition) => {
                if !transition.is_noop() {
                    debug!(
                        "Link {} -> {} ({} actions)",
                        transition.from,
                        transition.to,
                        transition.actions.len()
                    );
                }
                for action in transition.actions {
                    self.perform(action);
                }
            }
            Err(error) => {
                warn!("Ignoring status: {}", error);
                for entry in self.link.recent_audit_entries(3) {
                    debug!(
                        "  after {} -> {} on {}",
                        entry.from_state, entry.to_state, entry.status
                    );
                }
            }
        }
    }

    fn perform(&mut self, action: LinkAction) {
        match action {
            LinkAction::ResumeContext => self.context.resume(),
            LinkAction::SetupContext => {
                let protocol = self
                    .active
                    .as_ref()
                    .map(|active| active.transport.protocol())
                    .unwrap_or_else(|| self.config.relay.protocol.clone());
                self.context.setup(&protocol);
                self.established = true;
                self.reconnect_attempts = 0;
            }
            LinkAction::BindReceivers => {
                self.receivers.bind();
            }
            LinkAction::ResolveConnect => {
                if let Some(ConnectLifecycle {
                    responder: Some(responder),
                    ..
                }) = self.lifecycle.take()
                {
                    let _ = responder.send(Ok(()));
                }
                if let Some(jid) = self.context.jid().cloned() {
                    self.context.bus().publish(AppEvent::Connected { jid });
                }
            }
            LinkAction::SetupConnection => {
                let Some(jid) = self.context.jid().cloned() else {
                    return;
                };
                for stanza in self.setup.initial_stanzas(&jid) {
                    if let Err(error) = self.emit(&stanza) {
                        warn!("Connection setup stanza not sent: {}", error);
                    }
                }
            }
            LinkAction::UnbindReceivers => {
                self.receivers.unbind();
            }
            LinkAction::CancelPendingRequests => {
                self.correlator.cancel_all(BrokerError::Disconnected);
            }
            LinkAction::RejectConnect(error) => {
                if let Some(responder) = self
                    .lifecycle
                    .as_mut()
                    .and_then(|lifecycle| lifecycle.responder.take())
                {
                    let _ = responder.send(Err(error.into()));
                }
            }
            LinkAction::ClearConnection { disconnect } => {
                self.reconnect.cancel();
                if let Some(mut active) = self.active.take() {
                    if disconnect {
                        active.transport.disconnect("closed");
                    }
                    debug!("Released transport of {}", active.id);
                }
            }
            LinkAction::Recover => self.recover(),
            LinkAction::SettleFailure(error) => self.settle_failure(error),
        }
    }

    /// After a disconnect: reconnect when possible, else end the session
    fn recover(&mut self) {
        let origin = self.lifecycle.take().map(|lifecycle| lifecycle.origin);
        let established = core::mem::take(&mut self.established);
        let resumable = established || origin == Some(ConnectOrigin::Reconnect);

        if !self.context.has_credential() || !resumable {
            let reason = if self.closing {
                None
            } else {
                Some(ConnectError::Disconnected.to_string())
            };
            self.clear_session(reason);
            return;
        }

        if let Some(max) = self.config.session.max_reconnect_attempts {
            if self.reconnect_attempts >= max {
                warn!("Giving up after {} reconnect attempts", self.reconnect_attempts);
                self.clear_session(Some(format!(
                    "Gave up reconnecting after {} attempts",
                    self.reconnect_attempts
                )));
                return;
            }
        }

        self.context.pause();
        self.schedule_reconnect(self.config.session.reconnect_interval);
    }

    /// After a failed connect attempt: keep a reconnecting session paused,
    /// end everything else
    fn settle_failure(&mut self, error: ConnectError) {
        let origin = self.lifecycle.take().map(|lifecycle| lifecycle.origin);
        self.established = false;

        let keep = origin == Some(ConnectOrigin::Reconnect)
            && error != ConnectError::AuthFailure
            && self.context.has_credential();
        if keep {
            info!("Reconnect attempt failed ({}), awaiting an explicit reconnect", error);
            self.context.pause();
        } else {
            self.clear_session(Some(error.to_string()));
        }
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    fn handle_timer(&mut self, timer: TimerEvent) {
        match timer {
            TimerEvent::RequestExpired { id, ticket } => {
                self.correlator.expire(&id, ticket);
            }
            TimerEvent::ReconnectDue { ticket } => {
                if !self.reconnect.fire(ticket) {
                    trace!("Ignoring stale reconnect timer #{}", ticket);
                    return;
                }
                self.reconnect_now();
            }
        }
    }

    fn schedule_reconnect(&mut self, after: Duration) {
        let ticket = self.reconnect.schedule(after, &self.timer_sender);
        debug!("Reconnect #{} scheduled in {:?}", ticket, after);
    }

    fn reconnect_now(&mut self) {
        debug!("Reconnecting now…");

        let Some((jid, credential)) = self.context.credentials() else {
            warn!("{}", ConnectError::NoCredential);
            return;
        };
        if self.active.is_some() {
            warn!("{}", ConnectError::ConnectionActive);
            return;
        }

        self.reconnect_attempts += 1;
        match self.open_link(&jid, &credential) {
            Ok(()) => {
                self.lifecycle = Some(ConnectLifecycle {
                    origin: ConnectOrigin::Reconnect,
                    responder: None,
                });
            }
            Err(error) => error!("Reconnect failed: {}", error),
        }
    }

    // ------------------------------------------------------------------------
    // Transport Plumbing
    // ------------------------------------------------------------------------

    /// Create a transport and start connecting it
    fn open_link(&mut self, jid: &FullJid, credential: &Credential) -> BrokerResult<()> {
        let previous = self.link.state();
        self.link.begin_connect()?;

        match self.create_link(jid, credential) {
            Ok(active) => {
                self.active = Some(active);
                Ok(())
            }
            Err(error) => {
                self.link.force(previous);
                Err(error)
            }
        }
    }

    fn create_link(&mut self, jid: &FullJid, credential: &Credential) -> BrokerResult<ActiveLink> {
        if self.config.relay.endpoint.is_none() {
            return Err(ConnectError::NoRelayHost.into());
        }

        let mut transport = self.provider.provide(&self.config.relay)?;
        let id = self.next_link;
        self.next_link = id.next();

        transport.connect(
            jid,
            credential,
            TransportEvents::new(id, self.link_sender.clone()),
        )?;
        debug!("Opened {} for {}", id, jid);

        Ok(ActiveLink { id, transport })
    }

    /// Whether stanzas can be emitted right now
    fn is_live(&self) -> bool {
        self.link.state().can_send()
            && self
                .active
                .as_ref()
                .map(|active| active.transport.is_connected())
                .unwrap_or(false)
    }

    fn emit(&mut self, stanza: &Element) -> BrokerResult<()> {
        if !self.is_live() {
            return Err(BrokerError::Disconnected);
        }
        match self.active.as_mut() {
            Some(active) => active.transport.send(stanza),
            None => Err(BrokerError::Disconnected),
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Clear the session context for good and return to `Idle`
    fn clear_session(&mut self, reason: Option<String>) {
        self.reconnect.cancel();
        self.reconnect_attempts = 0;
        self.established = false;
        self.closing = false;
        self.context.clear();
        self.link.force(LinkState::Idle);

        info!("Session cleared");
        self.context
            .bus()
            .publish(AppEvent::Disconnected { reason });
    }

    /// Release every timer, pending request, binding and transport
    fn teardown(&mut self) {
        self.reconnect.cancel();
        self.correlator.cancel_all(BrokerError::Disconnected);
        self.receivers.unbind();

        if let Some(ConnectLifecycle {
            responder: Some(responder),
            ..
        }) = self.lifecycle.take()
        {
            let _ = responder.send(Err(ConnectError::Disconnected.into()));
        }

        let had_session = self.active.is_some()
            || self.context.jid().is_some()
            || self.link.state() != LinkState::Idle;
        if let Some(mut active) = self.active.take() {
            active.transport.disconnect("shutdown");
        }
        if had_session {
            self.clear_session(None);
        }
    }
}
