//! invalidate.rs
//! The cascading invalidation walk.
//!
//! A mutation of entity fields clears every stored computed attribute that
//! transitively depends on them, across entity-type boundaries, before
//! control returns to the caller. Values are only cleared here, never
//! recomputed: materialization happens lazily on the next read.

use crate::error::CoreError;
use crate::model::{EntityId, EntityType, Value};
use crate::specs::{ComputedSpec, SpecRegistry};
use crate::store::{read_field, Storage};
use crate::trace::{TraceEvent, TraceSink};
use std::collections::HashSet;

type Visited = HashSet<(EntityType, EntityId, &'static str)>;

pub struct InvalidationEngine<'a> {
    registry: &'a SpecRegistry,
}

impl<'a> InvalidationEngine<'a> {
    pub fn new(registry: &'a SpecRegistry) -> Self {
        Self { registry }
    }

    /// Applies the invalidation cascade for a mutation of `changed_fields`
    /// on the given records.
    ///
    /// Two cascades converging on the same (type, id, attribute) within one
    /// call compose: the second arrival is a no-op, not an error. A triple
    /// re-entered while it is still being cleared further up the walk is a
    /// genuine cycle and aborts the pass with `CascadeCycleDetected`.
    ///
    /// A mutated parent link (a `link_sources` field such as
    /// `Page.chapter_id`) stales the owner the link currently points at.
    /// Reparenting therefore takes two reports: one before the link write,
    /// while the field still names the former owner, and one after, once it
    /// names the new owner. Callers that instead report the collection
    /// fields of both owners get the same effect.
    pub fn on_mutate(
        &self,
        store: &mut dyn Storage,
        tracer: &mut dyn TraceSink,
        entity: EntityType,
        ids: &[EntityId],
        changed_fields: &[&str],
    ) -> Result<(), CoreError> {
        // Both sets are scoped to this top-level mutation, so concurrent
        // callers on separate stores never share tracking state.
        let mut clearing = Visited::new();
        let mut cleared = Visited::new();

        for &field in changed_fields {
            for spec in self.registry.dependents_of(entity, field) {
                for &id in ids {
                    self.clear(store, tracer, spec, id, &mut clearing, &mut cleared)?;
                }
            }
            for spec in self.registry.link_dependents_of(entity, field) {
                for &id in ids {
                    match read_field(store, entity, id, field)? {
                        Value::Id(owner) => {
                            self.clear(store, tracer, spec, owner, &mut clearing, &mut cleared)?;
                        }
                        // A detached record has no owner to stale.
                        Value::Null => {}
                        other => {
                            return Err(CoreError::MissingField {
                                entity,
                                id,
                                field: format!("{field} (expected a link, got {other:?})"),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn clear(
        &self,
        store: &mut dyn Storage,
        tracer: &mut dyn TraceSink,
        spec: &ComputedSpec,
        id: EntityId,
        clearing: &mut Visited,
        cleared: &mut Visited,
    ) -> Result<(), CoreError> {
        let key = (spec.entity, id, spec.attribute);
        if clearing.contains(&key) {
            return Err(CoreError::CascadeCycleDetected {
                entity: spec.entity,
                id,
                attribute: spec.attribute.to_string(),
            });
        }
        if !cleared.insert(key) {
            return Ok(());
        }
        clearing.insert(key);

        store.write(spec.entity, &[id], &[(spec.attribute, Value::Null)])?;
        tracer.record(TraceEvent::Cleared { entity: spec.entity, id, attribute: spec.attribute });

        // The clear is itself a mutation of this attribute-field.
        for dependent in self.registry.dependents_of(spec.entity, spec.attribute) {
            self.clear(store, tracer, dependent, id, clearing, cleared)?;
        }

        for cascade in spec.cascades {
            let target = self.registry.spec(cascade.entity, cascade.attribute)?;
            match read_field(store, spec.entity, id, cascade.link_field)? {
                Value::Id(related) => {
                    self.clear(store, tracer, target, related, clearing, cleared)?;
                }
                // An unlinked record has nothing upstream to stale.
                Value::Null => {}
                other => {
                    return Err(CoreError::MissingField {
                        entity: spec.entity,
                        id,
                        field: format!("{} (expected a link, got {other:?})", cascade.link_field),
                    });
                }
            }
        }

        clearing.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::{CascadeTarget, Derivation};
    use crate::store::MemoryStore;
    use crate::trace::NoopSink;

    #[test]
    fn test_runtime_cascade_cycle_is_detected() {
        // A statically cyclic table never passes validation, so inject one
        // directly: chapter and module staling each other through links.
        static CYCLIC: &[ComputedSpec] = &[
            ComputedSpec {
                entity: EntityType::Chapter,
                attribute: "page_count",
                source_fields: &["pages_ids"],
                link_sources: &[],
                derive: Derivation::CollectionCount { collection: "pages_ids" },
                cascades: &[CascadeTarget {
                    link_field: "module_id",
                    entity: EntityType::Module,
                    attribute: "page_count",
                }],
            },
            ComputedSpec {
                entity: EntityType::Module,
                attribute: "page_count",
                source_fields: &["chapters_ids"],
                link_sources: &[],
                derive: Derivation::CollectionSum {
                    collection: "chapters_ids",
                    child: EntityType::Chapter,
                    child_attribute: "page_count",
                },
                cascades: &[CascadeTarget {
                    link_field: "lead_chapter_id",
                    entity: EntityType::Chapter,
                    attribute: "page_count",
                }],
            },
        ];

        let mut store = MemoryStore::new();
        let module = store.create(EntityType::Module, &[]).unwrap();
        let chapter = store
            .create(EntityType::Chapter, &[("module_id", Value::Id(module))])
            .unwrap();
        store
            .write(EntityType::Module, &[module], &[("lead_chapter_id", Value::Id(chapter))])
            .unwrap();

        let registry = SpecRegistry::unvalidated(CYCLIC);
        let engine = InvalidationEngine::new(&registry);
        let err = engine
            .on_mutate(&mut store, &mut NoopSink, EntityType::Chapter, &[chapter], &["pages_ids"])
            .unwrap_err();

        assert_eq!(
            err,
            CoreError::CascadeCycleDetected {
                entity: EntityType::Chapter,
                id: chapter,
                attribute: "page_count".to_string(),
            }
        );
    }

    #[test]
    fn test_mutation_of_untracked_field_clears_nothing() {
        let mut store = MemoryStore::new();
        let chapter = store.create(EntityType::Chapter, &[]).unwrap();
        store
            .write(EntityType::Chapter, &[chapter], &[("page_count", Value::Integer(5))])
            .unwrap();

        let registry = SpecRegistry::course().unwrap();
        let engine = InvalidationEngine::new(&registry);
        engine
            .on_mutate(&mut store, &mut NoopSink, EntityType::Chapter, &[chapter], &["title"])
            .unwrap();

        let cached = crate::store::read_field(&store, EntityType::Chapter, chapter, "page_count");
        assert_eq!(cached.unwrap(), Value::Integer(5));
    }
}
