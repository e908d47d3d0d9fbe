//! schema.rs
//! Static declaration of the content tree: parent links, child collections,
//! field defaults and rule selection lists per entity type.
//!
//! The hierarchy is Pack → Module → Chapter → Page → Section/Leaf → Group →
//! Widget. Every relation is one-to-many with cascade-delete: a child is
//! exclusively owned by its immediate parent and is removed with it.

use super::types::{EntityType, Value};
use crate::rules::ALWAYS_VISIBLE;

/// The many2one field linking an entity to its owning parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub field: &'static str,
    pub entity: EntityType,
}

/// A one2many child collection field, ordered by the children's `order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub field: &'static str,
    pub child: EntityType,
    /// The many2one field on the child pointing back at the owner.
    pub foreign_field: &'static str,
}

/// A constrained string field whose writable values come from a fixed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionList {
    pub field: &'static str,
    pub options: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    pub entity: EntityType,
    pub parent: Option<ParentLink>,
    pub collections: &'static [Collection],
    pub selections: &'static [SelectionList],
}

/// Rules accepted by `visibility_rule` on leaves.
pub const LEAF_VISIBILITY_RULES: &[&str] = &[
    ALWAYS_VISIBLE,
    "$page.selection = $identifier",
    "$page.submitted = true",
    "$page.submitted = false",
];

/// Rules accepted by `visibility_rule` on groups and `next_active_rule` on
/// pages. Operators are open: whatever the list enumerates is compilable.
pub const PAGE_RULES: &[&str] = &[
    ALWAYS_VISIBLE,
    "$page.submitted = true",
    "$page.selection > 0",
    "$page.actions_counter > 0",
    "$page.actions_counter > 1",
    "$page.actions_counter > 2",
    "$page.actions_counter > 3",
    "$page.actions_counter > 4",
    "$page.actions_counter > 5",
    "$page.actions_counter > 6",
];

static SCHEMAS: &[EntitySchema] = &[
    EntitySchema {
        entity: EntityType::Pack,
        parent: None,
        collections: &[Collection { field: "modules_ids", child: EntityType::Module, foreign_field: "pack_id" }],
        selections: &[],
    },
    EntitySchema {
        entity: EntityType::Module,
        parent: Some(ParentLink { field: "pack_id", entity: EntityType::Pack }),
        collections: &[Collection { field: "chapters_ids", child: EntityType::Chapter, foreign_field: "module_id" }],
        selections: &[],
    },
    EntitySchema {
        entity: EntityType::Chapter,
        parent: Some(ParentLink { field: "module_id", entity: EntityType::Module }),
        collections: &[Collection { field: "pages_ids", child: EntityType::Page, foreign_field: "chapter_id" }],
        selections: &[],
    },
    EntitySchema {
        entity: EntityType::Page,
        parent: Some(ParentLink { field: "chapter_id", entity: EntityType::Chapter }),
        collections: &[
            Collection { field: "leaves_ids", child: EntityType::Leaf, foreign_field: "page_id" },
            Collection { field: "sections_ids", child: EntityType::Section, foreign_field: "page_id" },
        ],
        selections: &[SelectionList { field: "next_active_rule", options: PAGE_RULES }],
    },
    EntitySchema {
        entity: EntityType::Section,
        parent: Some(ParentLink { field: "page_id", entity: EntityType::Page }),
        collections: &[],
        selections: &[],
    },
    EntitySchema {
        entity: EntityType::Leaf,
        parent: Some(ParentLink { field: "page_id", entity: EntityType::Page }),
        collections: &[Collection { field: "groups_ids", child: EntityType::Group, foreign_field: "leaf_id" }],
        selections: &[SelectionList { field: "visibility_rule", options: LEAF_VISIBILITY_RULES }],
    },
    EntitySchema {
        entity: EntityType::Group,
        parent: Some(ParentLink { field: "leaf_id", entity: EntityType::Leaf }),
        collections: &[Collection { field: "widgets_ids", child: EntityType::Widget, foreign_field: "group_id" }],
        selections: &[SelectionList { field: "visibility_rule", options: PAGE_RULES }],
    },
    EntitySchema {
        entity: EntityType::Widget,
        parent: Some(ParentLink { field: "group_id", entity: EntityType::Group }),
        collections: &[],
        selections: &[],
    },
];

/// Returns the schema declaration for an entity type.
pub fn schema(entity: EntityType) -> &'static EntitySchema {
    SCHEMAS
        .iter()
        .find(|s| s.entity == entity)
        .expect("every EntityType variant has a schema entry")
}

/// The many2one link to the owning parent, if the entity is not a root.
pub fn parent_link(entity: EntityType) -> Option<&'static ParentLink> {
    schema(entity).parent.as_ref()
}

/// Looks up a child collection declaration by field name.
pub fn collection(entity: EntityType, field: &str) -> Option<&'static Collection> {
    schema(entity).collections.iter().find(|c| c.field == field)
}

/// The selection list constraining `field`, if any.
pub fn selection(entity: EntityType, field: &str) -> Option<&'static SelectionList> {
    schema(entity).selections.iter().find(|s| s.field == field)
}

/// Field defaults applied when a record is created without an explicit value.
///
/// Mirrors the column defaults of the source schema: every entity starts at
/// sibling position 1, identifiers default to 1, rule fields to the
/// always-visible shortcut.
pub fn defaults(entity: EntityType) -> Vec<(&'static str, Value)> {
    let mut out = vec![("order", Value::Integer(1))];
    match entity {
        EntityType::Chapter | EntityType::Page | EntityType::Leaf | EntityType::Group => {
            out.push(("identifier", Value::Integer(1)));
        }
        _ => {}
    }
    match entity {
        EntityType::Leaf | EntityType::Group => {
            out.push(("visibility_rule", Value::Text(ALWAYS_VISIBLE.to_string())));
        }
        EntityType::Page => {
            out.push(("next_active_rule", Value::Text(ALWAYS_VISIBLE.to_string())));
        }
        _ => {}
    }
    out
}
