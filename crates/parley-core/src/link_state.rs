//! Connection State Machine
//!
//! Pure transition table driving a session's connection lifecycle. The session
//! task feeds every transport status through [`LinkState::on_status`] and
//! executes the returned [`LinkAction`]s in order; nothing here touches a
//! transport, a timer or a channel, so the table is testable in isolation.
//!
//! ```text
//! Idle ─authenticate─▶ Connecting ─▶ Authenticating ─▶ Connected
//!   ▲                      ▲                              │
//!   │                      └──────── reconnect ◀──────────┤
//!   └──── logout / no credential ◀── Disconnected ◀── Disconnecting
//! ```

use crate::channel::TransportStatus;
use crate::errors::ConnectError;
use core::fmt;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

// ----------------------------------------------------------------------------
// States
// ----------------------------------------------------------------------------

/// Lifecycle state of a session's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkState {
    /// No session context (never authenticated, logged out, or credential rejected)
    #[default]
    Idle,
    /// A transport is establishing the stream
    Connecting,
    /// The transport is authenticating
    Authenticating,
    /// Stream established; receivers bound and requests allowed
    Connected,
    /// A transport-level disconnect is under way
    Disconnecting,
    /// Transport gone; a reconnect may be scheduled
    Disconnected,
}

impl LinkState {
    /// Get current state name for logging/audit
    pub fn name(&self) -> &'static str {
        match self {
            LinkState::Idle => "Idle",
            LinkState::Connecting => "Connecting",
            LinkState::Authenticating => "Authenticating",
            LinkState::Connected => "Connected",
            LinkState::Disconnecting => "Disconnecting",
            LinkState::Disconnected => "Disconnected",
        }
    }

    /// Check if state allows emitting stanzas
    pub fn can_send(&self) -> bool {
        matches!(self, LinkState::Connected)
    }

    /// Check if a connect attempt is in flight
    pub fn is_connecting(&self) -> bool {
        matches!(self, LinkState::Connecting | LinkState::Authenticating)
    }

    /// Start a connect attempt (`authenticate` or a reconnect firing)
    pub fn begin_connect(self) -> Result<LinkState, ConnectError> {
        match self {
            LinkState::Idle | LinkState::Disconnected => Ok(LinkState::Connecting),
            LinkState::Connecting | LinkState::Authenticating => {
                Err(ConnectError::AlreadyConnecting)
            }
            LinkState::Connected | LinkState::Disconnecting => Err(ConnectError::AlreadyConnected),
        }
    }

    /// Process a transport status and compute the next state
    pub fn on_status(self, status: TransportStatus) -> Result<Transition, StateTransitionError> {
        use LinkState::*;
        use TransportStatus as S;

        let (to, actions): (LinkState, SmallVec<[LinkAction; 6]>) = match (self, status) {
            (Idle | Connecting | Disconnected, S::Connecting) => {
                (Connecting, smallvec![LinkAction::ResumeContext])
            }

            (Connecting | Authenticating, S::Authenticating) => (Authenticating, SmallVec::new()),

            (Connecting | Authenticating, S::Connected) => (
                Connected,
                smallvec![
                    LinkAction::SetupContext,
                    LinkAction::BindReceivers,
                    LinkAction::ResolveConnect,
                    LinkAction::SetupConnection,
                ],
            ),

            (Connecting | Authenticating | Connected | Disconnecting, S::Disconnecting) => {
                (Disconnecting, SmallVec::new())
            }

            // No transport-level disconnect here: the transport is already gone
            (Connecting | Authenticating | Connected | Disconnecting, S::Disconnected) => (
                Disconnected,
                smallvec![
                    LinkAction::UnbindReceivers,
                    LinkAction::CancelPendingRequests,
                    LinkAction::RejectConnect(ConnectError::Disconnected),
                    LinkAction::ClearConnection { disconnect: false },
                    LinkAction::Recover,
                ],
            ),

            // Stream failure on an established link is a connection loss
            (Connected, S::AuthFailure | S::ConnectFailure | S::ConnectTimeout) => (
                Disconnected,
                smallvec![
                    LinkAction::UnbindReceivers,
                    LinkAction::CancelPendingRequests,
                    LinkAction::ClearConnection { disconnect: true },
                    LinkAction::Recover,
                ],
            ),

            // A half-open transport may exist, so it is disconnected explicitly
            (
                Connecting | Authenticating | Disconnecting,
                S::AuthFailure | S::ConnectFailure | S::ConnectTimeout,
            ) => {
                let error = failure_error(status);
                (
                    Disconnected,
                    smallvec![
                        LinkAction::RejectConnect(error.clone()),
                        LinkAction::ClearConnection { disconnect: true },
                        LinkAction::SettleFailure(error),
                    ],
                )
            }

            // Informational statuses never move the machine
            (state, S::Error | S::Attached | S::Redirect) => (state, SmallVec::new()),

            (state, status) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state: state.name(),
                    status,
                });
            }
        };

        let audit_entry = AuditEntry {
            from_state: self.name(),
            to_state: to.name(),
            status,
            actions_count: actions.len(),
        };

        Ok(Transition {
            from: self,
            to,
            actions,
            audit_entry,
        })
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn failure_error(status: TransportStatus) -> ConnectError {
    match status {
        TransportStatus::AuthFailure => ConnectError::AuthFailure,
        TransportStatus::ConnectTimeout => ConnectError::ConnectTimeout,
        _ => ConnectError::ConnectFailure,
    }
}

// ----------------------------------------------------------------------------
// Transition Results
// ----------------------------------------------------------------------------

/// Side effects the session task performs for a transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Mark the session as connecting (resumed context)
    ResumeContext,
    /// Mark the session as connected, assign identity and protocol
    SetupContext,
    /// Bind the `presence`, `message` and `iq` receivers as one group
    BindReceivers,
    /// Complete the pending connect with success
    ResolveConnect,
    /// Run connection-scoped setup (initial availability and the like)
    SetupConnection,
    /// Unbind every receiver as one group
    UnbindReceivers,
    /// Fail every outstanding request with `Disconnected`
    CancelPendingRequests,
    /// Complete the pending connect, if any, with this error
    RejectConnect(ConnectError),
    /// Drop the transport, asking it to disconnect first when `disconnect` is set
    ClearConnection { disconnect: bool },
    /// Schedule a reconnect when a credential is on file, else clear the session
    Recover,
    /// Decide between full clear and paused context after a failed attempt
    SettleFailure(ConnectError),
}

/// Result of a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: LinkState,
    pub to: LinkState,
    pub actions: SmallVec<[LinkAction; 6]>,
    pub audit_entry: AuditEntry,
}

impl Transition {
    /// True when the status neither moved the machine nor requested actions
    pub fn is_noop(&self) -> bool {
        self.from == self.to && self.actions.is_empty()
    }
}

/// Audit trail entry for state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub from_state: &'static str,
    pub to_state: &'static str,
    pub status: TransportStatus,
    pub actions_count: usize,
}

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    #[error("Invalid transition from {from_state} on status {status}")]
    InvalidTransition {
        from_state: &'static str,
        status: TransportStatus,
    },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_connected_state() -> LinkState {
        LinkState::Idle
            .begin_connect()
            .unwrap()
            .on_status(TransportStatus::Connecting)
            .unwrap()
            .to
            .on_status(TransportStatus::Authenticating)
            .unwrap()
            .to
            .on_status(TransportStatus::Connected)
            .unwrap()
            .to
    }

    #[test]
    fn test_initial_state() {
        let state = LinkState::default();
        assert_eq!(state, LinkState::Idle);
        assert_eq!(state.name(), "Idle");
        assert!(!state.can_send());
    }

    #[test]
    fn test_connect_flow_actions() {
        let state = LinkState::Idle.begin_connect().unwrap();
        assert_eq!(state, LinkState::Connecting);

        let transition = state.on_status(TransportStatus::Connecting).unwrap();
        assert_eq!(transition.to, LinkState::Connecting);
        assert_eq!(transition.actions.as_slice(), &[LinkAction::ResumeContext]);

        let transition = transition.to.on_status(TransportStatus::Connected).unwrap();
        assert_eq!(transition.to, LinkState::Connected);
        assert_eq!(
            transition.actions.as_slice(),
            &[
                LinkAction::SetupContext,
                LinkAction::BindReceivers,
                LinkAction::ResolveConnect,
                LinkAction::SetupConnection,
            ]
        );
        assert_eq!(transition.audit_entry.from_state, "Connecting");
        assert_eq!(transition.audit_entry.to_state, "Connected");
        assert_eq!(transition.audit_entry.actions_count, 4);
        assert!(transition.to.can_send());
    }

    #[test]
    fn test_unexpected_disconnect_actions() {
        let transition = create_test_connected_state()
            .on_status(TransportStatus::Disconnected)
            .unwrap();

        assert_eq!(transition.to, LinkState::Disconnected);
        assert_eq!(
            transition.actions.as_slice(),
            &[
                LinkAction::UnbindReceivers,
                LinkAction::CancelPendingRequests,
                LinkAction::RejectConnect(ConnectError::Disconnected),
                LinkAction::ClearConnection { disconnect: false },
                LinkAction::Recover,
            ]
        );
    }

    #[test]
    fn test_connect_failures_are_never_retried() {
        for (status, error) in [
            (TransportStatus::AuthFailure, ConnectError::AuthFailure),
            (TransportStatus::ConnectFailure, ConnectError::ConnectFailure),
            (TransportStatus::ConnectTimeout, ConnectError::ConnectTimeout),
        ] {
            let transition = LinkState::Connecting.on_status(status).unwrap();
            assert_eq!(transition.to, LinkState::Disconnected);
            assert!(!transition.actions.contains(&LinkAction::Recover));
            assert_eq!(
                transition.actions.as_slice(),
                &[
                    LinkAction::RejectConnect(error.clone()),
                    LinkAction::ClearConnection { disconnect: true },
                    LinkAction::SettleFailure(error),
                ]
            );
        }
    }

    #[test]
    fn test_stream_failure_while_connected_recovers() {
        let transition = create_test_connected_state()
            .on_status(TransportStatus::ConnectFailure)
            .unwrap();
        assert_eq!(transition.to, LinkState::Disconnected);
        assert!(transition.actions.contains(&LinkAction::CancelPendingRequests));
        assert_eq!(transition.actions.last(), Some(&LinkAction::Recover));
    }

    #[test]
    fn test_informational_statuses_do_not_transition() {
        let state = create_test_connected_state();
        for status in [
            TransportStatus::Error,
            TransportStatus::Attached,
            TransportStatus::Redirect,
        ] {
            let transition = state.on_status(status).unwrap();
            assert!(transition.is_noop());
            assert_eq!(transition.to, LinkState::Connected);
        }
    }

    #[test]
    fn test_invalid_transitions() {
        let result = LinkState::Idle.on_status(TransportStatus::Connected);
        match result {
            Err(StateTransitionError::InvalidTransition { from_state, status }) => {
                assert_eq!(from_state, "Idle");
                assert_eq!(status, TransportStatus::Connected);
            }
            other => panic!("Expected InvalidTransition error, got {:?}", other),
        }

        assert!(LinkState::Disconnected
            .on_status(TransportStatus::Connected)
            .is_err());
        assert!(LinkState::Idle
            .on_status(TransportStatus::Authenticating)
            .is_err());
        assert!(LinkState::Idle
            .on_status(TransportStatus::Disconnected)
            .is_err());
    }

    #[test]
    fn test_begin_connect_guards() {
        assert_eq!(
            LinkState::Authenticating.begin_connect(),
            Err(ConnectError::AlreadyConnecting)
        );
        assert_eq!(
            LinkState::Connected.begin_connect(),
            Err(ConnectError::AlreadyConnected)
        );
        assert_eq!(
            LinkState::Disconnected.begin_connect(),
            Ok(LinkState::Connecting)
        );
    }

    #[test]
    fn test_logout_path() {
        let transition = create_test_connected_state()
            .on_status(TransportStatus::Disconnecting)
            .unwrap();
        assert_eq!(transition.to, LinkState::Disconnecting);
        assert!(transition.actions.is_empty());

        let transition = transition
            .to
            .on_status(TransportStatus::Disconnected)
            .unwrap();
        assert_eq!(transition.to, LinkState::Disconnected);
        assert_eq!(transition.actions.last(), Some(&LinkAction::Recover));
    }

    #[test]
    fn test_connect_attempt_states() {
        assert!(LinkState::Connecting.is_connecting());
        assert!(LinkState::Authenticating.is_connecting());
        assert!(!LinkState::Disconnected.is_connecting());
        assert!(!LinkState::Authenticating.can_send());
    }
}
