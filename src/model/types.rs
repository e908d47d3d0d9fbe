use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique, stable identifier for an entity record within its entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed set of node types in the content tree.
///
/// Parent/child relations between these are declared in [`crate::model::schema`];
/// the tree is strict (every non-Pack entity has exactly one owning parent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Pack,
    Module,
    Chapter,
    Page,
    Section,
    Leaf,
    Group,
    Widget,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Pack => "pack",
            EntityType::Module => "module",
            EntityType::Chapter => "chapter",
            EntityType::Page => "page",
            EntityType::Section => "section",
            EntityType::Leaf => "leaf",
            EntityType::Group => "group",
            EntityType::Widget => "widget",
        };
        write!(f, "{name}")
    }
}

/// The atomic unit of data exchanged with the storage collaborator.
///
/// `Null` doubles as the cleared state of a stored computed attribute:
/// writing `Null` into a cache slot invalidates it, and a read returning
/// `Null` (or no slot at all) means "derive me".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Boolean(bool),
    Text(String),
    /// A many2one link to the owning parent, e.g. `module_id` on a chapter.
    Id(EntityId),
    /// An ordered child collection (one2many), e.g. `pages_ids` on a chapter.
    Ids(Vec<EntityId>),
}

impl Value {
    /// True when this slot holds no materialized value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<EntityId> {
        match self {
            Value::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_ids(&self) -> Option<&[EntityId]> {
        match self {
            Value::Ids(ids) => Some(ids),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Integer(v) }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Boolean(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Text(v.to_string()) }
}

impl From<EntityId> for Value {
    fn from(v: EntityId) -> Self { Value::Id(v) }
}

impl From<Vec<EntityId>> for Value {
    fn from(v: Vec<EntityId>) -> Self { Value::Ids(v) }
}
