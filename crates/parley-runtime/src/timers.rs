//! Ticketed one-shot timers
//!
//! A timer is a spawned sleep that posts a [`TimerEvent`] back to the session
//! task. Cancelling aborts the sleep, and every event carries the ticket it was
//! armed with, so an event that raced its own cancellation is recognised as
//! stale and ignored.

use core::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Timer firings delivered to the session task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// The response window of request `id` elapsed
    RequestExpired { id: String, ticket: u64 },
    /// The reconnect delay elapsed
    ReconnectDue { ticket: u64 },
}

pub type TimerSender = mpsc::UnboundedSender<TimerEvent>;
pub type TimerReceiver = mpsc::UnboundedReceiver<TimerEvent>;

pub fn create_timer_channel() -> (TimerSender, TimerReceiver) {
    mpsc::unbounded_channel()
}

/// Post `event` on `sender` once `after` has elapsed
pub fn arm(after: Duration, sender: &TimerSender, event: TimerEvent) -> JoinHandle<()> {
    let sender = sender.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        // Session task gone: nothing left to notify
        let _ = sender.send(event);
    })
}

/// Monotonic ticket source
#[derive(Debug, Default)]
pub struct Tickets {
    next: u64,
}

impl Tickets {
    pub fn issue(&mut self) -> u64 {
        self.next = self.next.wrapping_add(1);
        self.next
    }
}

/// The single reconnect timer of a session
#[derive(Debug, Default)]
pub struct ReconnectTimer {
    armed: Option<(u64, JoinHandle<()>)>,
    tickets: Tickets,
}

impl ReconnectTimer {
    /// Arm the timer, replacing any previously armed one
    pub fn schedule(&mut self, after: Duration, sender: &TimerSender) -> u64 {
        self.cancel();
        let ticket = self.tickets.issue();
        let handle = arm(after, sender, TimerEvent::ReconnectDue { ticket });
        self.armed = Some((ticket, handle));
        ticket
    }

    /// Disarm the timer; returns whether one was armed
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Consume a firing; false when `ticket` is not the armed one
    pub fn fire(&mut self, ticket: u64) -> bool {
        match &self.armed {
            Some((armed, _)) if *armed == ticket => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for ReconnectTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
