//! Link state management
//!
//! Owns the session's `LinkState` and keeps a bounded audit trail of every
//! status-driven transition.

use parley_core::{
    AuditEntry, ConnectError, LinkState, StateTransitionError, Transition, TransportStatus,
};
use std::collections::VecDeque;

const AUDIT_TRAIL_CAPACITY: usize = 256;

/// Current lifecycle state plus its transition history
#[derive(Debug)]
pub struct LinkManager {
    state: LinkState,
    audit_trail: VecDeque<AuditEntry>,
    stats: LinkStats,
}

/// Counters over the lifetime of a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub state_transitions: u64,
    pub invalid_transitions: u64,
    pub connect_attempts: u64,
}

impl Default for LinkManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkManager {
    pub fn new() -> Self {
        Self {
            state: LinkState::Idle,
            audit_trail: VecDeque::new(),
            stats: LinkStats::default(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Enter `Connecting` for a new attempt
    pub fn begin_connect(&mut self) -> Result<(), ConnectError> {
        self.state = self.state.begin_connect()?;
        self.stats.connect_attempts += 1;
        Ok(())
    }

    /// Apply a transport status, recording the transition
    pub fn apply(&mut self, status: TransportStatus) -> Result<Transition, StateTransitionError> {
        let transition = self.state.on_status(status).map_err(|error| {
            self.stats.invalid_transitions += 1;
            error
        })?;

        self.state = transition.to;
        self.stats.state_transitions += 1;
        if self.audit_trail.len() == AUDIT_TRAIL_CAPACITY {
            self.audit_trail.pop_front();
        }
        self.audit_trail.push_back(transition.audit_entry.clone());

        Ok(transition)
    }

    /// Force a state outside the status table (logout, full clear)
    pub fn force(&mut self, state: LinkState) {
        self.state = state;
    }

    /// Most recent audit entries, oldest first
    pub fn recent_audit_entries(&self, limit: usize) -> Vec<AuditEntry> {
        let start = self.audit_trail.len().saturating_sub(limit);
        self.audit_trail.iter().skip(start).cloned().collect()
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }
}
