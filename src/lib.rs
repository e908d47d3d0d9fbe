//! Computed-attribute cache with cascading invalidation for a course
//! content tree (Pack → Module → Chapter → Page → Section/Leaf → Group →
//! Widget), plus the rule compiler that turns constrained visibility rules
//! into client-consumable domains.
//!
//! The core is storage-agnostic: all entity state lives behind the
//! [`store::Storage`] collaborator, and which attributes exist, what they
//! read and what they stale is data in [`specs::COURSE_SPECS`]. The
//! [`engine::AttributeEngine`] walks those declarations generically.

pub mod engine;
pub mod error;
pub mod model;
pub mod rules;
pub mod specs;
pub mod store;
pub mod trace;

// Re-export key types for convenient access
pub use engine::{AttributeEngine, InvalidationEngine, Recomputer};
pub use error::CoreError;
pub use model::{EntityId, EntityType, Value};
pub use rules::{compile, Domain, RuleValue};
pub use specs::{ComputedSpec, Derivation, SpecRegistry};
pub use store::{MemoryStore, Storage};
