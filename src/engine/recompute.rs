//! recompute.rs
//! Lazy materialization of cleared computed attributes.
//!
//! `get` is the single read path: a non-null cache slot is returned as-is,
//! anything else is derived from current state, written back, and returned.
//! Derivation is pure, so a concurrent double-compute converges on the same
//! value (last write wins).

use crate::error::CoreError;
use crate::model::{EntityId, EntityType, Value};
use crate::rules;
use crate::specs::{ComputedSpec, Derivation, SpecRegistry};
use crate::store::{read_field, Storage};
use crate::trace::{TraceEvent, TraceSink};

pub struct Recomputer<'a> {
    registry: &'a SpecRegistry,
}

impl<'a> Recomputer<'a> {
    pub fn new(registry: &'a SpecRegistry) -> Self {
        Self { registry }
    }

    /// Returns the current value of a stored computed attribute,
    /// re-deriving and materializing it if the cache slot is cleared.
    pub fn get(
        &self,
        store: &mut dyn Storage,
        tracer: &mut dyn TraceSink,
        entity: EntityType,
        id: EntityId,
        attribute: &str,
    ) -> Result<Value, CoreError> {
        let spec = self.registry.spec(entity, attribute)?;

        let cached = read_field(store, entity, id, spec.attribute)?;
        if !cached.is_null() {
            tracer.record(TraceEvent::CacheHit { entity, id, attribute: spec.attribute });
            return Ok(cached);
        }

        let value = self.derive(store, tracer, spec, id)?;
        store.write(entity, &[id], &[(spec.attribute, value.clone())])?;
        tracer.record(TraceEvent::Recomputed { entity, id, attribute: spec.attribute });
        Ok(value)
    }

    fn derive(
        &self,
        store: &mut dyn Storage,
        tracer: &mut dyn TraceSink,
        spec: &ComputedSpec,
        id: EntityId,
    ) -> Result<Value, CoreError> {
        match spec.derive {
            Derivation::CollectionCount { collection } => {
                let children = self.collection_ids(store, spec, id, collection)?;
                Ok(Value::Integer(children.len() as i64))
            }
            Derivation::CollectionSum { collection, child, child_attribute } => {
                let children = self.collection_ids(store, spec, id, collection)?;
                let mut total = 0i64;
                for child_id in children {
                    let value = self.get(store, tracer, child, child_id, child_attribute)?;
                    total += value.as_integer().ok_or_else(|| CoreError::MissingField {
                        entity: child,
                        id: child_id,
                        field: child_attribute.to_string(),
                    })?;
                }
                Ok(Value::Integer(total))
            }
            Derivation::RuleDomain { rule_field } => {
                let set = store.read(spec.entity, &[id], &["identifier", rule_field])?;
                let record = set
                    .get(&id)
                    .ok_or(CoreError::UnknownEntity { entity: spec.entity, id })?;

                let identifier = record
                    .get("identifier")
                    .and_then(Value::as_integer)
                    .ok_or_else(|| CoreError::MissingField {
                        entity: spec.entity,
                        id,
                        field: "identifier".to_string(),
                    })?;
                let rule = record
                    .get(rule_field)
                    .and_then(Value::as_text)
                    .ok_or_else(|| CoreError::MissingField {
                        entity: spec.entity,
                        id,
                        field: rule_field.to_string(),
                    })?;

                let domain = rules::compile(identifier, rule)?;
                Ok(Value::Text(domain.render()))
            }
        }
    }

    fn collection_ids(
        &self,
        store: &mut dyn Storage,
        spec: &ComputedSpec,
        id: EntityId,
        collection: &str,
    ) -> Result<Vec<EntityId>, CoreError> {
        match read_field(store, spec.entity, id, collection)? {
            Value::Ids(ids) => Ok(ids),
            Value::Null => Ok(Vec::new()),
            _ => Err(CoreError::MissingField {
                entity: spec.entity,
                id,
                field: collection.to_string(),
            }),
        }
    }
}
