//! Defines the core data structures of the content tree.
pub mod schema;
pub mod types;

// Re-export key types for convenient access
pub use types::{EntityId, EntityType, Value};
