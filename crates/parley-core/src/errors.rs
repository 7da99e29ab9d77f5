//! Error types for the Parley session manager
//!
//! Every asynchronous operation carries its own completion, so these errors are
//! delivered to the specific caller that triggered them. There is no global
//! unhandled-error channel. `BrokerError` unifies the specific kinds below.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Malformed outbound request, rejected before reaching the transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Cannot request using non-IQ stanza, got: {tag}")]
    NotAnIq { tag: String },
    #[error("Cannot request using IQ type: '{kind}'")]
    InvalidIqType { kind: String },
    #[error("Missing required IQ identifier")]
    MissingId,
    #[error("Another request is already pending with identifier: {id}")]
    DuplicateId { id: String },
}

/// Errors surfaced to the in-flight connect caller (or to `reconnect`)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("Please provide a password")]
    MissingCredential,
    #[error("Another connection is pending")]
    AlreadyConnecting,
    #[error("Another connection already exist")]
    AlreadyConnected,
    #[error("Failed to authenticate")]
    AuthFailure,
    #[error("Failed to connect")]
    ConnectFailure,
    #[error("Connection timed out")]
    ConnectTimeout,
    #[error("Disconnected from server")]
    Disconnected,
    #[error("Cannot reconnect: credentials are not set")]
    NoCredential,
    #[error("Cannot reconnect: connection is active")]
    ConnectionActive,
    #[error("No relay host to connect to")]
    NoRelayHost,
}

// ----------------------------------------------------------------------------
// Broker Error
// ----------------------------------------------------------------------------

/// Core error type for the Parley session manager
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Outbound request failed validation
    #[error("Invalid request: {0}")]
    Validation(#[from] RequestError),

    /// No live transport, or the request was bulk-cancelled by a disconnect
    #[error("Client is disconnected")]
    Disconnected,

    /// No response arrived within the request window
    #[error("Cancelled")]
    Cancelled,

    /// The peer answered with an error-typed response
    #[error("{text}")]
    Protocol { text: String },

    /// Connection lifecycle failure
    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    /// The transport refused an operation
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// Channel communication error between facade and session task
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Malformed principal identifier
    #[error("Invalid identity: {reason}")]
    Identity { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl BrokerError {
    /// Create a protocol error from an optional error text, falling back to "Failed"
    pub fn protocol<T: Into<String>>(text: Option<T>) -> Self {
        BrokerError::Protocol {
            text: text.map(Into::into).unwrap_or_else(|| "Failed".to_string()),
        }
    }

    /// Create a transport error with a reason
    pub fn transport_error<T: Into<String>>(reason: T) -> Self {
        BrokerError::Transport {
            reason: reason.into(),
        }
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        BrokerError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        BrokerError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an identity error with a reason
    pub fn identity_error<T: Into<String>>(reason: T) -> Self {
        BrokerError::Identity {
            reason: reason.into(),
        }
    }

    /// Whether this error came from a disconnection (transport gone or bulk cancel)
    pub fn is_disconnected(&self) -> bool {
        matches!(
            self,
            BrokerError::Disconnected | BrokerError::Connect(ConnectError::Disconnected)
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, BrokerError>;
pub type BrokerResult<T> = Result<T>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
