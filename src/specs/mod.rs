//! The declarative table of stored computed attributes.
//!
//! Each [`ComputedSpec`] names the fields an attribute reads, how its value
//! is derived, and the attributes (possibly on a related entity type) that
//! go stale with it. The invalidation engine and the recomputer never know
//! about any concrete attribute: everything they do is driven by this table.
//!
//! Historically each entity hand-coded refresh calls into its neighbors
//! (a chapter poking its module's count); declaring the edges here turns
//! that implicit call graph into data and lets one generic walker serve
//! every attribute.

use crate::error::CoreError;
use crate::model::{EntityId, EntityType};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use smallvec::SmallVec;
use std::collections::HashMap;

/// An invalidation edge: when the owning attribute is cleared, follow
/// `link_field` on the owning entity and clear `attribute` on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeTarget {
    pub link_field: &'static str,
    pub entity: EntityType,
    pub attribute: &'static str,
}

/// A membership edge: the owning attribute also goes stale when `field`
/// (a parent link on the related `entity`) is mutated, because the child
/// joins or leaves the owner's collection. The affected owner is resolved
/// by reading the link on the mutated child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSource {
    pub entity: EntityType,
    pub field: &'static str,
}

/// How a computed attribute's value is produced from current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// The size of an own child collection (chapter.page_count).
    CollectionCount { collection: &'static str },
    /// The sum of a computed integer attribute over an own child
    /// collection (module.page_count over its chapters). Children are
    /// materialized on demand, so the sum recurses through the recomputer.
    CollectionSum {
        collection: &'static str,
        child: EntityType,
        child_attribute: &'static str,
    },
    /// A rule compiled against the entity's own `identifier`
    /// (leaf/group.visible, page.next_active).
    RuleDomain { rule_field: &'static str },
}

/// The static declaration of one stored computed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputedSpec {
    pub entity: EntityType,
    pub attribute: &'static str,
    /// Own fields whose mutation stales this attribute.
    pub source_fields: &'static [&'static str],
    /// Link fields on related entities whose mutation (reparenting) stales
    /// this attribute on the owner the link points at.
    pub link_sources: &'static [LinkSource],
    pub derive: Derivation,
    pub cascades: &'static [CascadeTarget],
}

/// The computed attributes of the course content tree.
pub static COURSE_SPECS: &[ComputedSpec] = &[
    ComputedSpec {
        entity: EntityType::Chapter,
        attribute: "page_count",
        source_fields: &["pages_ids"],
        // A page moving between chapters changes both owners' collections.
        link_sources: &[LinkSource { entity: EntityType::Page, field: "chapter_id" }],
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
        link_sources: &[LinkSource { entity: EntityType::Chapter, field: "module_id" }],
        derive: Derivation::CollectionSum {
            collection: "chapters_ids",
            child: EntityType::Chapter,
            child_attribute: "page_count",
        },
        cascades: &[],
    },
    ComputedSpec {
        entity: EntityType::Leaf,
        attribute: "visible",
        source_fields: &["identifier", "visibility_rule"],
        link_sources: &[],
        derive: Derivation::RuleDomain { rule_field: "visibility_rule" },
        cascades: &[],
    },
    ComputedSpec {
        entity: EntityType::Group,
        attribute: "visible",
        source_fields: &["identifier", "visibility_rule"],
        link_sources: &[],
        derive: Derivation::RuleDomain { rule_field: "visibility_rule" },
        cascades: &[],
    },
    ComputedSpec {
        entity: EntityType::Page,
        attribute: "next_active",
        source_fields: &["identifier", "next_active_rule"],
        link_sources: &[],
        derive: Derivation::RuleDomain { rule_field: "next_active_rule" },
        cascades: &[],
    },
];

/// Resolved lookup table over a set of [`ComputedSpec`]s.
///
/// Construction validates the declarations: every cascade target must name
/// a registered spec, and the static dependency graph (source-field edges,
/// cascade edges, and sum-derivation edges) must be acyclic. The runtime walk re-checks per-id
/// cycles, but a statically cyclic table is rejected up front.
#[derive(Debug, Clone)]
pub struct SpecRegistry {
    specs: &'static [ComputedSpec],
}

impl SpecRegistry {
    /// The standard registry for the course content tree.
    pub fn course() -> Result<Self, CoreError> {
        Self::from_specs(COURSE_SPECS)
    }

    pub fn from_specs(specs: &'static [ComputedSpec]) -> Result<Self, CoreError> {
        let registry = Self { specs };
        registry.validate()?;
        Ok(registry)
    }

    /// Skips validation so the runtime cycle guard can be exercised.
    #[cfg(test)]
    pub(crate) fn unvalidated(specs: &'static [ComputedSpec]) -> Self {
        Self { specs }
    }

    /// Looks up the spec for a computed attribute. A miss is a programming
    /// error on the caller's side and fails fast.
    pub fn spec(&self, entity: EntityType, attribute: &str) -> Result<&ComputedSpec, CoreError> {
        self.specs
            .iter()
            .find(|s| s.entity == entity && s.attribute == attribute)
            .ok_or_else(|| CoreError::UnknownComputedAttribute {
                entity,
                attribute: attribute.to_string(),
            })
    }

    /// All specs on `entity` that read `field`, i.e. the attributes staled
    /// by a mutation of that field.
    pub fn dependents_of(&self, entity: EntityType, field: &str) -> SmallVec<[&ComputedSpec; 4]> {
        self.specs
            .iter()
            .filter(|s| s.entity == entity && s.source_fields.contains(&field))
            .collect()
    }

    /// All specs staled by a mutation of a parent link `field` on `entity`,
    /// i.e. attributes of owners the mutated records join or leave.
    pub fn link_dependents_of(&self, entity: EntityType, field: &str) -> SmallVec<[&ComputedSpec; 4]> {
        self.specs
            .iter()
            .filter(|s| s.link_sources.iter().any(|l| l.entity == entity && l.field == field))
            .collect()
    }

    fn validate(&self) -> Result<(), CoreError> {
        let mut graph = DiGraph::<(EntityType, &'static str), ()>::new();
        let mut nodes = HashMap::new();
        for spec in self.specs {
            let key = (spec.entity, spec.attribute);
            nodes.insert(key, graph.add_node(key));
        }

        for spec in self.specs {
            let from = nodes[&(spec.entity, spec.attribute)];

            // Cascade edges must land on a registered spec.
            for cascade in spec.cascades {
                let to = nodes
                    .get(&(cascade.entity, cascade.attribute))
                    .copied()
                    .ok_or_else(|| CoreError::UnknownComputedAttribute {
                        entity: cascade.entity,
                        attribute: cascade.attribute.to_string(),
                    })?;
                graph.add_edge(from, to, ());
            }

            // A spec sourcing another computed attribute on the same entity
            // is staled by its clear.
            for other in self.specs {
                if other.entity == spec.entity && spec.source_fields.contains(&other.attribute) {
                    graph.add_edge(nodes[&(other.entity, other.attribute)], from, ());
                }
            }

            // A sum derivation reads a computed attribute on its children,
            // so it must also be registered and acyclic.
            if let Derivation::CollectionSum { child, child_attribute, .. } = spec.derive {
                let source = nodes
                    .get(&(child, child_attribute))
                    .copied()
                    .ok_or_else(|| CoreError::UnknownComputedAttribute {
                        entity: child,
                        attribute: child_attribute.to_string(),
                    })?;
                graph.add_edge(source, from, ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let (entity, attribute) = graph[cycle.node_id()];
            return Err(CoreError::CascadeCycleDetected {
                entity,
                id: EntityId(0), // static check, no record involved
                attribute: attribute.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_registry_is_valid() {
        let registry = SpecRegistry::course().unwrap();
        assert!(registry.spec(EntityType::Chapter, "page_count").is_ok());
        assert!(registry.spec(EntityType::Module, "page_count").is_ok());
        assert!(registry.spec(EntityType::Leaf, "visible").is_ok());
    }

    #[test]
    fn test_unknown_attribute_fails_fast() {
        let registry = SpecRegistry::course().unwrap();
        let err = registry.spec(EntityType::Pack, "page_count").unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownComputedAttribute {
                entity: EntityType::Pack,
                attribute: "page_count".to_string()
            }
        );
    }

    #[test]
    fn test_dependents_reverse_index() {
        let registry = SpecRegistry::course().unwrap();

        let deps = registry.dependents_of(EntityType::Chapter, "pages_ids");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].attribute, "page_count");

        // Both identifier and the rule field stale leaf visibility.
        assert_eq!(registry.dependents_of(EntityType::Leaf, "identifier").len(), 1);
        assert_eq!(registry.dependents_of(EntityType::Leaf, "visibility_rule").len(), 1);
        assert!(registry.dependents_of(EntityType::Widget, "order").is_empty());
    }

    #[test]
    fn test_cascade_to_unregistered_attribute_is_rejected() {
        static BROKEN: &[ComputedSpec] = &[ComputedSpec {
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
        }];
        let err = SpecRegistry::from_specs(BROKEN).unwrap_err();
        assert!(matches!(err, CoreError::UnknownComputedAttribute { .. }));
    }

    #[test]
    fn test_cyclic_spec_table_is_rejected() {
        // Two attributes invalidating each other through their link fields.
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
                    link_field: "self_id",
                    entity: EntityType::Chapter,
                    attribute: "page_count",
                }],
            },
        ];
        let err = SpecRegistry::from_specs(CYCLIC).unwrap_err();
        assert!(matches!(err, CoreError::CascadeCycleDetected { .. }));
    }

    #[test]
    fn test_mutually_summing_attributes_are_rejected() {
        // No cascades at all: the cycle lives entirely in the derive edges,
        // where each attribute sums the other.
        static SUM_CYCLIC: &[ComputedSpec] = &[
            ComputedSpec {
                entity: EntityType::Chapter,
                attribute: "page_count",
                source_fields: &["pages_ids"],
                link_sources: &[],
                derive: Derivation::CollectionSum {
                    collection: "pages_ids",
                    child: EntityType::Module,
                    child_attribute: "page_count",
                },
                cascades: &[],
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
                cascades: &[],
            },
        ];
        let err = SpecRegistry::from_specs(SUM_CYCLIC).unwrap_err();
        assert!(matches!(err, CoreError::CascadeCycleDetected { .. }));
    }

    #[test]
    fn test_sum_over_unregistered_child_attribute_is_rejected() {
        static DANGLING_SUM: &[ComputedSpec] = &[ComputedSpec {
            entity: EntityType::Module,
            attribute: "page_count",
            source_fields: &["chapters_ids"],
            link_sources: &[],
            derive: Derivation::CollectionSum {
                collection: "chapters_ids",
                child: EntityType::Chapter,
                child_attribute: "page_count",
            },
            cascades: &[],
        }];
        let err = SpecRegistry::from_specs(DANGLING_SUM).unwrap_err();
        assert!(matches!(err, CoreError::UnknownComputedAttribute { .. }));
    }

    #[test]
    fn test_link_dependents_reverse_index() {
        let registry = SpecRegistry::course().unwrap();

        let deps = registry.link_dependents_of(EntityType::Page, "chapter_id");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].entity, EntityType::Chapter);

        let deps = registry.link_dependents_of(EntityType::Chapter, "module_id");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].entity, EntityType::Module);

        assert!(registry.link_dependents_of(EntityType::Page, "order").is_empty());
    }
}
