//! Topic-based event bus
//!
//! Collaborators (roster store, inbox, UI) subscribe to the notification
//! families they care about. Publishing never blocks the publisher: a
//! subscriber that falls behind loses the oldest notifications and is told so.

use crate::channel::communication::{AppEvent, EventTopic};
use smallvec::SmallVec;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

// ----------------------------------------------------------------------------
// Event Bus
// ----------------------------------------------------------------------------

/// Fan-out of `AppEvent`s to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a bus retaining up to `capacity` undelivered events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many subscribers will see it
    pub fn publish(&self, event: AppEvent) -> usize {
        let topic = event.topic();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("No subscribers for {:?} event", topic);
                0
            }
        }
    }

    /// Subscribe to every topic
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            topics: SmallVec::new(),
        }
    }

    /// Subscribe to the listed topics only
    pub fn subscribe_to(&self, topics: &[EventTopic]) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            topics: topics.iter().copied().collect(),
        }
    }

    /// Register a handler task for one topic
    ///
    /// Must be called from within a tokio runtime. The task ends once every
    /// `EventBus` clone is dropped.
    pub fn on<F>(&self, topic: EventTopic, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(AppEvent) + Send + 'static,
    {
        let mut stream = self.subscribe_to(&[topic]);
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                handler(event);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

// ----------------------------------------------------------------------------
// Event Stream
// ----------------------------------------------------------------------------

/// One subscriber's view of the bus, optionally filtered by topic
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<AppEvent>,
    /// Empty means every topic
    topics: SmallVec<[EventTopic; 4]>,
}

impl EventStream {
    fn accepts(&self, event: &AppEvent) -> bool {
        self.topics.is_empty() || self.topics.contains(&event.topic())
    }

    /// Wait for the next matching event; `None` once the bus is gone
    pub async fn next(&mut self) -> Option<AppEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, {} notifications skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next matching event if one is already queued
    pub fn try_next(&mut self) -> Option<AppEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, {} notifications skipped", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain every queued matching event
    pub fn drain(&mut self) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
