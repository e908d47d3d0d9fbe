//! Defines the error types shared across the core.
use crate::model::{EntityId, EntityType};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// The rule string does not decompose into exactly three tokens after
    /// `$identifier` substitution. Configuration error: the affected
    /// attribute must not silently degrade to "always visible".
    #[error("invalid rule format: '{rule}'")]
    InvalidRuleFormat { rule: String },

    /// The invalidation walk revisited the same (type, id, attribute)
    /// triple within one mutation. Fatal for that pass.
    #[error("cascade cycle detected at {entity}[{id}].{attribute}")]
    CascadeCycleDetected { entity: EntityType, id: EntityId, attribute: String },

    /// A read or cascade names a computed attribute with no registered spec.
    #[error("no computed attribute '{attribute}' registered on {entity}")]
    UnknownComputedAttribute { entity: EntityType, attribute: String },

    /// A storage operation addressed a record that does not exist.
    #[error("unknown {entity} id {id}")]
    UnknownEntity { entity: EntityType, id: EntityId },

    /// The storage collaborator returned no value for a declared source field.
    #[error("missing field '{field}' on {entity}[{id}]")]
    MissingField { entity: EntityType, id: EntityId, field: String },

    /// A write violated the field's declared selection list.
    #[error("value '{value}' is not a listed selection for {entity}.{field}")]
    InvalidSelection { entity: EntityType, field: String, value: String },

    /// Failure reported by the storage collaborator, propagated unchanged.
    #[error("storage error: {0}")]
    Storage(String),
}
