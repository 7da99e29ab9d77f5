//! Centralized Configuration Management
//!
//! All tunables of the session manager in one place, with presets for common
//! environments. Loading configuration from disk is left to the embedding
//! application; these structs are plain serde values.

use crate::errors::BrokerError;
use core::time::Duration;

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Timeouts and reconnection policy for a session
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    /// Default window for a correlated request to receive its response
    pub request_timeout: Duration,
    /// Fixed delay before reconnecting after an unexpected disconnect
    pub reconnect_interval: Duration,
    /// Cap on consecutive automatic reconnects (`None` retries indefinitely)
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(5),
            max_reconnect_attempts: None,
        }
    }
}

impl SessionConfig {
    /// Short windows for fast-failing tests
    pub fn testing() -> Self {
        Self {
            request_timeout: Duration::from_millis(500),
            reconnect_interval: Duration::from_millis(100),
            max_reconnect_attempts: Some(5),
        }
    }

    /// Long windows for slow or metered links
    pub fn patient() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(15),
            max_reconnect_attempts: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes of the channels owned by the session
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for Command channel (facade → session task)
    pub command_buffer_size: usize,
    /// Buffer size for AppEvent broadcast (session task → collaborators)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            app_event_buffer_size: 64,
        }
    }
}

impl ChannelConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            app_event_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Relay Configuration
// ----------------------------------------------------------------------------

/// Where and how the transport reaches the server
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RelayConfig {
    /// Relay endpoint (e.g. a websocket URL); connect fails without one
    pub endpoint: Option<String>,
    /// Protocol label reported in the session status
    pub protocol: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            protocol: "wss".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn websocket<T: Into<String>>(endpoint: T) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            protocol: "wss".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// Master configuration struct for a session
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
pub struct BrokerConfig {
    /// Session timeouts and reconnection policy
    pub session: SessionConfig,
    /// Channel buffer configuration
    pub channels: ChannelConfig,
    /// Relay endpoint configuration
    pub relay: RelayConfig,
}

impl BrokerConfig {
    /// Create new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            session: SessionConfig::testing(),
            channels: ChannelConfig::testing(),
            relay: RelayConfig::websocket("wss://relay.test/websocket/"),
        }
    }

    /// Builder method for customizing session configuration
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Builder method for customizing channel configuration
    pub fn with_channels(mut self, channels: ChannelConfig) -> Self {
        self.channels = channels;
        self
    }

    /// Builder method for customizing relay configuration
    pub fn with_relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.session.request_timeout.is_zero() {
            return Err(BrokerError::config_error("Request timeout cannot be zero"));
        }
        if self.session.reconnect_interval.is_zero() {
            return Err(BrokerError::config_error(
                "Reconnect interval cannot be zero",
            ));
        }
        if self.session.max_reconnect_attempts == Some(0) {
            return Err(BrokerError::config_error(
                "Max reconnect attempts cannot be zero (use None for unbounded)",
            ));
        }

        if self.channels.command_buffer_size == 0 {
            return Err(BrokerError::config_error(
                "Command buffer size cannot be zero",
            ));
        }
        if self.channels.app_event_buffer_size == 0 {
            return Err(BrokerError::config_error(
                "App event buffer size cannot be zero",
            ));
        }

        if self.relay.protocol.is_empty() {
            return Err(BrokerError::config_error("Relay protocol cannot be empty"));
        }
        if let Some(endpoint) = &self.relay.endpoint {
            if endpoint.trim().is_empty() {
                return Err(BrokerError::config_error(
                    "Relay endpoint cannot be blank (use None to leave unset)",
                ));
            }
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
