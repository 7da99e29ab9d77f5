//! Receiver Dispatch
//!
//! Routes every inbound top-level stanza: first to the request correlator,
//! then, if unclaimed, to the ingestor callback of its category. Receivers for
//! `presence`, `message` and `iq` are bound together once per connection and
//! unbound together when it drops.

use crate::correlator::RequestCorrelator;
use parley_core::{Element, IqType, StanzaKind};
use tracing::{debug, trace};

// ----------------------------------------------------------------------------
// Stanza Ingestor
// ----------------------------------------------------------------------------

/// Owner-registered consumer of stanzas no request claimed
///
/// Called from the session task, so implementations must not block.
pub trait StanzaIngestor: Send {
    fn presence(&mut self, _stanza: &Element) {}

    fn message(&mut self, _stanza: &Element) {}

    fn iq(&mut self, _stanza: &Element) {}
}

/// Ingestor discarding everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIngestor;

impl StanzaIngestor for NoopIngestor {}

// ----------------------------------------------------------------------------
// Receiver Bindings
// ----------------------------------------------------------------------------

/// One category receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverBinding {
    pub category: StanzaKind,
    pub active: bool,
}

impl ReceiverBinding {
    fn matches(&self, stanza: &Element) -> bool {
        self.active && stanza.kind() == Some(self.category)
    }
}

/// The group of category receivers, never partially bound
#[derive(Debug, Default)]
pub struct Receivers {
    bindings: Vec<ReceiverBinding>,
    generation: u64,
}

impl Receivers {
    /// Bind every category; no-op when already bound
    pub fn bind(&mut self) -> bool {
        if !self.bindings.is_empty() {
            return false;
        }
        self.bindings = StanzaKind::ALL
            .iter()
            .map(|category| ReceiverBinding {
                category: *category,
                active: true,
            })
            .collect();
        self.generation += 1;
        debug!("Bound {} receivers", self.bindings.len());
        true
    }

    /// Unbind every category; no-op when nothing is bound
    pub fn unbind(&mut self) -> bool {
        if self.bindings.is_empty() {
            return false;
        }
        self.bindings.clear();
        debug!("Unbound receivers");
        true
    }

    pub fn is_bound(&self) -> bool {
        !self.bindings.is_empty()
    }

    pub fn bindings(&self) -> &[ReceiverBinding] {
        &self.bindings
    }

    /// How many times the group has been bound
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn find(&self, stanza: &Element) -> Option<&ReceiverBinding> {
        self.bindings.iter().find(|binding| binding.matches(stanza))
    }
}

// ----------------------------------------------------------------------------
// Dispatch
// ----------------------------------------------------------------------------

/// Where an inbound stanza ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Answered a pending request
    Correlated,
    /// Handed to the ingestor of this category
    Ingested(StanzaKind),
    /// `iq` response nobody is waiting for (e.g. after its timeout)
    Orphaned,
    /// Receivers were not bound
    Unbound,
    /// Tag outside the routed categories
    Unroutable,
}

/// Route one inbound stanza
pub fn dispatch(
    stanza: &Element,
    receivers: &Receivers,
    correlator: &mut RequestCorrelator,
    ingestor: &mut dyn StanzaIngestor,
) -> Dispatch {
    if !receivers.is_bound() {
        debug!("Dropping <{}/> received while unbound", stanza.name());
        return Dispatch::Unbound;
    }

    let Some(binding) = receivers.find(stanza) else {
        debug!("Dropping unroutable <{}/>", stanza.name());
        return Dispatch::Unroutable;
    };
    trace!("({}) {}", binding.category, stanza);

    if correlator.resolve(stanza) {
        return Dispatch::Correlated;
    }

    match binding.category {
        StanzaKind::Presence => ingestor.presence(stanza),
        StanzaKind::Message => ingestor.message(stanza),
        StanzaKind::Iq => {
            if matches!(stanza.iq_type(), Some(IqType::Result | IqType::Error)) {
                debug!(
                    "Dropping orphaned iq response #{}",
                    stanza.id().unwrap_or_default()
                );
                return Dispatch::Orphaned;
            }
            ingestor.iq(stanza)
        }
    }
    Dispatch::Ingested(binding.category)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
