//! The storage collaborator contract.
//!
//! The core reads and writes entity attributes exclusively through this
//! trait; persistence, transactions and retry policy live behind it.
//! Collaborator failures propagate unchanged (the core never retries).

pub mod memory;

pub use memory::MemoryStore;

use crate::error::CoreError;
use crate::model::{EntityId, EntityType, Value};
use std::collections::HashMap;

/// The result of a batched read: id → (field → value).
pub type ReadSet = HashMap<EntityId, HashMap<String, Value>>;

pub trait Storage {
    /// Reads the named fields for each id. Every requested id must resolve
    /// to a record; a field with no materialized value comes back as
    /// [`Value::Null`].
    fn read(
        &self,
        entity: EntityType,
        ids: &[EntityId],
        fields: &[&str],
    ) -> Result<ReadSet, CoreError>;

    /// Sets fields on each id. Writing [`Value::Null`] into a computed
    /// attribute's slot clears its cache; writing a concrete value
    /// materializes it.
    fn write(
        &mut self,
        entity: EntityType,
        ids: &[EntityId],
        values: &[(&str, Value)],
    ) -> Result<(), CoreError>;
}

/// Convenience wrapper reading a single field of a single record.
pub fn read_field(
    store: &dyn Storage,
    entity: EntityType,
    id: EntityId,
    field: &str,
) -> Result<Value, CoreError> {
    let set = store.read(entity, &[id], &[field])?;
    let record = set
        .get(&id)
        .ok_or(CoreError::UnknownEntity { entity, id })?;
    Ok(record.get(field).cloned().unwrap_or(Value::Null))
}
