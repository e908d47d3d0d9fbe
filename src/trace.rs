//! Injected observability sink for cache activity.
//!
//! The engine reports every clear, recompute and cache hit to a
//! [`TraceSink`] supplied by the caller; there is no global logger.
//! [`NoopSink`] is the default, [`RecordingSink`] captures events for
//! inspection (tests assert coherence with it).

use crate::model::{EntityId, EntityType};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// A cache slot was set to null by the invalidation walk.
    Cleared { entity: EntityType, id: EntityId, attribute: &'static str },
    /// A read was served from the cache without re-deriving.
    CacheHit { entity: EntityType, id: EntityId, attribute: &'static str },
    /// A cleared slot was materialized by the recomputer.
    Recomputed { entity: EntityType, id: EntityId, attribute: &'static str },
}

pub trait TraceSink {
    fn record(&mut self, event: TraceEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn record(&mut self, _event: TraceEvent) {}
}

/// Captures events into a shared buffer; clones observe the same buffer,
/// so a handle can be kept after the sink is handed to the engine.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<TraceEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self { Self::default() }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    pub fn count(&self, matches: impl Fn(&TraceEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|&e| matches(e)).count()
    }
}

impl TraceSink for RecordingSink {
    fn record(&mut self, event: TraceEvent) {
        self.events.borrow_mut().push(event);
    }
}
