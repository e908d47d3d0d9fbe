//! The computed-attribute engine: cascading invalidation plus lazy
//! recompute, driven entirely by the declared spec table.
pub mod invalidate;
pub mod recompute;

pub use invalidate::InvalidationEngine;
pub use recompute::Recomputer;

use crate::error::CoreError;
use crate::model::{EntityId, EntityType, Value};
use crate::specs::SpecRegistry;
use crate::store::Storage;
use crate::trace::{NoopSink, TraceSink};

/// Facade pairing a spec registry with a trace sink.
///
/// The storage collaborator is borrowed per call, so one engine can serve
/// any number of stores; nothing in here holds entity state.
pub struct AttributeEngine {
    registry: SpecRegistry,
    tracer: Box<dyn TraceSink>,
}

impl AttributeEngine {
    /// An engine over the standard course spec table, tracing to nowhere.
    pub fn course() -> Result<Self, CoreError> {
        Ok(Self {
            registry: SpecRegistry::course()?,
            tracer: Box::new(NoopSink),
        })
    }

    pub fn with_registry(registry: SpecRegistry) -> Self {
        Self { registry, tracer: Box::new(NoopSink) }
    }

    pub fn with_tracer(mut self, tracer: Box<dyn TraceSink>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn registry(&self) -> &SpecRegistry {
        &self.registry
    }

    /// Reports a mutation of `changed_fields` on the given records and
    /// clears every transitively dependent stored computed attribute
    /// before returning.
    pub fn on_mutate(
        &mut self,
        store: &mut dyn Storage,
        entity: EntityType,
        ids: &[EntityId],
        changed_fields: &[&str],
    ) -> Result<(), CoreError> {
        InvalidationEngine::new(&self.registry).on_mutate(
            store,
            self.tracer.as_mut(),
            entity,
            ids,
            changed_fields,
        )
    }

    /// Reads a stored computed attribute, materializing it if cleared.
    pub fn get(
        &mut self,
        store: &mut dyn Storage,
        entity: EntityType,
        id: EntityId,
        attribute: &str,
    ) -> Result<Value, CoreError> {
        Recomputer::new(&self.registry).get(store, self.tracer.as_mut(), entity, id, attribute)
    }
}
