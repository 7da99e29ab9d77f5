//! Session Builder API
//!
//! Provides a builder-style API for embedding applications and tests to wire a
//! transport provider, an ingestor and connection setup into a session, and
//! get back the facade handle plus the task to run.

use crate::dispatch::{NoopIngestor, StanzaIngestor};
use crate::session::{ConnectionSetup, InitialPresence, SessionContext, SessionHandle, SessionTask};
use crate::timers::create_timer_channel;
use parley_core::channel::{create_command_channel, create_link_channel};
use parley_core::{BrokerConfig, BrokerResult, EventBus, TransportProvider};
use tokio::task::JoinHandle;
use tracing::info;

// ----------------------------------------------------------------------------
// Session Builder
// ----------------------------------------------------------------------------

/// Builder for creating a session task and its handle
pub struct SessionBuilder {
    provider: Box<dyn TransportProvider>,
    config: BrokerConfig,
    ingestor: Box<dyn StanzaIngestor>,
    setup: Box<dyn ConnectionSetup>,
}

impl SessionBuilder {
    /// Create a new session builder around a transport provider
    pub fn new<P: TransportProvider + 'static>(provider: P) -> Self {
        Self {
            provider: Box::new(provider),
            config: BrokerConfig::default(),
            ingestor: Box::new(NoopIngestor),
            setup: Box::new(InitialPresence),
        }
    }

    /// Set the session configuration
    pub fn with_config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register the consumer of stanzas no request claims
    pub fn with_ingestor<I: StanzaIngestor + 'static>(mut self, ingestor: I) -> Self {
        self.ingestor = Box::new(ingestor);
        self
    }

    /// Replace the connection-scoped setup (initial presence by default)
    pub fn with_setup<S: ConnectionSetup + 'static>(mut self, setup: S) -> Self {
        self.setup = Box::new(setup);
        self
    }

    /// Validate the configuration and create the handle/task pair
    pub fn build(self) -> BrokerResult<(SessionHandle, SessionTask)> {
        self.config.validate()?;

        let (command_sender, command_receiver) = create_command_channel(&self.config.channels);
        let bus = EventBus::new(self.config.channels.app_event_buffer_size);
        let handle = SessionHandle::new(
            command_sender,
            bus.clone(),
            self.config.session.request_timeout,
        );

        let task = SessionTask::new(
            self.config,
            self.provider,
            self.ingestor,
            self.setup,
            SessionContext::new(bus),
            command_receiver,
            create_link_channel(),
            create_timer_channel(),
        );

        Ok((handle, task))
    }

    /// Build and spawn the session task on the current tokio runtime
    pub fn spawn(self) -> BrokerResult<(SessionHandle, JoinHandle<BrokerResult<()>>)> {
        let (handle, task) = self.build()?;
        info!("Spawning session task");
        Ok((handle, tokio::spawn(task.run())))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{BrokerError, LinkState, SessionConfig};
    use parley_harness::MockTransportProvider;

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = BrokerConfig::testing();
        config.session.reconnect_interval = core::time::Duration::ZERO;

        let result = SessionBuilder::new(MockTransportProvider::default())
            .with_config(config)
            .build();
        assert!(matches!(result, Err(BrokerError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_spawned_session_starts_idle() {
        let (handle, task) = SessionBuilder::new(MockTransportProvider::default())
            .with_config(BrokerConfig::testing().with_session(SessionConfig::testing()))
            .spawn()
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, LinkState::Idle);
        assert_eq!(snapshot.pending_requests, 0);
        assert!(!snapshot.receivers_bound);

        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
        assert!(!handle.is_running());
    }
}
