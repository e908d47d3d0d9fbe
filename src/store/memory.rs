//! memory.rs
//! Schema-aware in-memory storage collaborator.
//!
//! This is the reference implementation of [`Storage`]: it applies field
//! defaults on create, keeps parent links and child collections in sync,
//! enforces selection lists on write, and cascade-deletes owned subtrees.
//! Snapshots serialize to JSON for persistence across sessions.

use super::{ReadSet, Storage};
use crate::error::CoreError;
use crate::model::{schema, EntityId, EntityType, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

type Record = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    records: BTreeMap<EntityType, BTreeMap<EntityId, Record>>,
    next_id: u32,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Creates a record, applying schema defaults for any field the caller
    /// leaves out. If a parent link is supplied, the new id is appended to
    /// the parent's matching collection.
    pub fn create(
        &mut self,
        entity: EntityType,
        values: &[(&str, Value)],
    ) -> Result<EntityId, CoreError> {
        let id = EntityId(self.next_id);
        self.next_id += 1;

        let mut record = Record::new();
        for (field, value) in schema::defaults(entity) {
            record.insert(field.to_string(), value);
        }
        for &(field, ref value) in values {
            validate_selection(entity, field, value)?;
            record.insert(field.to_string(), value.clone());
        }

        // Keep the owner's collection in sync with the link.
        if let Some(link) = schema::parent_link(entity) {
            if let Some(parent_id) = record.get(link.field).and_then(Value::as_id) {
                self.attach(link.entity, parent_id, entity, id)?;
            }
        }

        self.records.entry(entity).or_default().insert(id, record);
        Ok(id)
    }

    /// Deletes a record and, transitively, every child it owns.
    pub fn delete(&mut self, entity: EntityType, id: EntityId) -> Result<(), CoreError> {
        let record = self
            .records
            .get_mut(&entity)
            .and_then(|table| table.remove(&id))
            .ok_or(CoreError::UnknownEntity { entity, id })?;

        for col in schema::schema(entity).collections {
            if let Some(Value::Ids(children)) = record.get(col.field) {
                for &child in children {
                    self.delete(col.child, child)?;
                }
            }
        }

        // Detach from the owner's collection, if still linked.
        if let Some(link) = schema::parent_link(entity) {
            if let Some(parent_id) = record.get(link.field).and_then(Value::as_id) {
                self.detach(link.entity, parent_id, entity, id);
            }
        }

        Ok(())
    }

    pub fn count(&self, entity: EntityType) -> usize {
        self.records.get(&entity).map_or(0, BTreeMap::len)
    }

    pub fn contains(&self, entity: EntityType, id: EntityId) -> bool {
        self.records
            .get(&entity)
            .is_some_and(|table| table.contains_key(&id))
    }

    /// Serializes the full store state to JSON.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Storage(e.to_string()))
    }

    /// Restores a store from a [`to_json`](Self::to_json) snapshot.
    pub fn from_json(snapshot: &str) -> Result<Self, CoreError> {
        serde_json::from_str(snapshot).map_err(|e| CoreError::Storage(e.to_string()))
    }

    fn attach(
        &mut self,
        parent_entity: EntityType,
        parent_id: EntityId,
        child_entity: EntityType,
        child_id: EntityId,
    ) -> Result<(), CoreError> {
        let parent = self
            .records
            .get_mut(&parent_entity)
            .and_then(|table| table.get_mut(&parent_id))
            .ok_or(CoreError::UnknownEntity { entity: parent_entity, id: parent_id })?;

        for col in schema::schema(parent_entity).collections {
            if col.child != child_entity {
                continue;
            }
            match parent.get_mut(col.field) {
                Some(Value::Ids(ids)) => ids.push(child_id),
                _ => {
                    parent.insert(col.field.to_string(), Value::Ids(vec![child_id]));
                }
            }
        }
        Ok(())
    }

    // A missing former owner is tolerated: it may already be deleted.
    fn detach(
        &mut self,
        parent_entity: EntityType,
        parent_id: EntityId,
        child_entity: EntityType,
        child_id: EntityId,
    ) {
        let Some(parent) = self
            .records
            .get_mut(&parent_entity)
            .and_then(|table| table.get_mut(&parent_id))
        else {
            return;
        };
        for col in schema::schema(parent_entity).collections {
            if col.child != child_entity {
                continue;
            }
            if let Some(Value::Ids(ids)) = parent.get_mut(col.field) {
                ids.retain(|&child| child != child_id);
            }
        }
    }
}

/// Rejects a write of a constrained string field whose value is not listed.
/// `Null` is always writable (it is the cleared cache state).
fn validate_selection(entity: EntityType, field: &str, value: &Value) -> Result<(), CoreError> {
    let Some(list) = schema::selection(entity, field) else {
        return Ok(());
    };
    match value {
        Value::Null => Ok(()),
        Value::Text(text) if list.options.contains(&text.as_str()) => Ok(()),
        other => Err(CoreError::InvalidSelection {
            entity,
            field: field.to_string(),
            value: match other {
                Value::Text(t) => t.clone(),
                v => format!("{v:?}"),
            },
        }),
    }
}

impl Storage for MemoryStore {
    fn read(
        &self,
        entity: EntityType,
        ids: &[EntityId],
        fields: &[&str],
    ) -> Result<ReadSet, CoreError> {
        let table = self.records.get(&entity);
        let mut out = ReadSet::with_capacity(ids.len());

        for &id in ids {
            let record = table
                .and_then(|t| t.get(&id))
                .ok_or(CoreError::UnknownEntity { entity, id })?;
            let mut row = HashMap::with_capacity(fields.len());
            for &field in fields {
                let value = match record.get(field) {
                    Some(v) => v.clone(),
                    // An untouched collection reads as empty, anything else as unset.
                    None if schema::collection(entity, field).is_some() => Value::Ids(Vec::new()),
                    None => Value::Null,
                };
                row.insert(field.to_string(), value);
            }
            out.insert(id, row);
        }
        Ok(out)
    }

    fn write(
        &mut self,
        entity: EntityType,
        ids: &[EntityId],
        values: &[(&str, Value)],
    ) -> Result<(), CoreError> {
        for &(field, ref value) in values {
            validate_selection(entity, field, value)?;
        }

        // Rewriting a parent link moves the record between the owners'
        // collections, so capture the old owner before the field changes.
        let mut moves: Vec<(EntityId, Option<EntityId>, Option<EntityId>)> = Vec::new();
        if let Some(link) = schema::parent_link(entity) {
            for &(field, ref value) in values {
                if field != link.field {
                    continue;
                }
                for &id in ids {
                    let old = self
                        .records
                        .get(&entity)
                        .and_then(|t| t.get(&id))
                        .ok_or(CoreError::UnknownEntity { entity, id })?
                        .get(field)
                        .and_then(Value::as_id);
                    moves.push((id, old, value.as_id()));
                }
            }
        }

        let table = self
            .records
            .get_mut(&entity)
            .ok_or(CoreError::UnknownEntity { entity, id: ids.first().copied().unwrap_or_default() })?;

        for &id in ids {
            let record = table
                .get_mut(&id)
                .ok_or(CoreError::UnknownEntity { entity, id })?;
            for &(field, ref value) in values {
                record.insert(field.to_string(), value.clone());
            }
        }

        if let Some(link) = schema::parent_link(entity) {
            for (id, old, new) in moves {
                if old == new {
                    continue;
                }
                if let Some(former) = old {
                    self.detach(link.entity, former, entity, id);
                }
                if let Some(owner) = new {
                    self.attach(link.entity, owner, entity, id)?;
                }
            }
        }
        Ok(())
    }
}
