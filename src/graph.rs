//! Type Dependency Graph
//!
//! Declarations may refer to each other in cycles, and most cycles are fine:
//! a struct can hold an optional or array field of its own type. A cycle made
//! only of references every value must contain (alias targets, named array
//! elements, versioned payloads and required non-array fields) describes a
//! type with no finite value, and is rejected at build time.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use crate::types::{ResolvedType, TypeId, TypeRef};

// =============================================================================
// Edge Kind
// =============================================================================

/// How one declaration refers to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Alias to its target
    Alias,
    /// Named array to its element type
    Element,
    /// Versioned type to one entry's payload type
    Version,
    /// Required, non-array struct field
    RequiredField,
    /// Optional struct field
    OptionalField,
    /// Array struct field
    ArrayField,
}

impl EdgeKind {
    /// Whether every value of the source contains a value of the target
    pub fn is_strong(self) -> bool {
        !matches!(self, EdgeKind::OptionalField | EdgeKind::ArrayField)
    }
}

// =============================================================================
// Type Graph
// =============================================================================

/// References between the declarations of a schema
#[derive(Debug)]
pub struct TypeGraph {
    graph: DiGraph<TypeId, EdgeKind>,
    nodes: Vec<NodeIndex>,
}

impl TypeGraph {
    pub fn build(schema: &Schema) -> Self {
        let count = schema.types().len();
        let mut graph = DiGraph::with_capacity(count, count * 2);
        let nodes: Vec<NodeIndex> = (0..count).map(|id| graph.add_node(id)).collect();

        for (id, t) in schema.types().iter().enumerate() {
            let from = nodes[id];
            let mut link = |to: TypeRef, kind: EdgeKind| {
                if let TypeRef::Declared(to) = to {
                    graph.add_edge(from, nodes[to], kind);
                }
            };
            match t {
                ResolvedType::Primitive(_) | ResolvedType::Enum(_) | ResolvedType::External(_) => {}
                ResolvedType::Alias(a) => link(a.target, EdgeKind::Alias),
                ResolvedType::Array(a) => link(a.element, EdgeKind::Element),
                ResolvedType::Versioned(v) => {
                    for entry in &v.versions {
                        link(entry.target, EdgeKind::Version);
                    }
                }
                ResolvedType::Struct(s) => {
                    for field in &s.fields {
                        let kind = if field.array {
                            EdgeKind::ArrayField
                        } else if field.required {
                            EdgeKind::RequiredField
                        } else {
                            EdgeKind::OptionalField
                        };
                        link(field.target, kind);
                    }
                }
            }
        }
        Self { graph, nodes }
    }

    /// Declarations `id` refers to directly
    pub fn dependencies(&self, id: TypeId) -> Vec<TypeId> {
        let mut deps: Vec<TypeId> = self
            .graph
            .neighbors(self.nodes[id])
            .map(|n| self.graph[n])
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }

    /// Groups of declarations that require each other through strong edges,
    /// each sorted by declaration order
    pub fn infinite_cycles(&self) -> Vec<Vec<TypeId>> {
        let strong = self
            .graph
            .filter_map(|_, id| Some(*id), |_, kind| kind.is_strong().then_some(*kind));
        let mut cycles: Vec<Vec<TypeId>> = kosaraju_scc(&strong)
            .into_iter()
            .filter(|scc| scc.len() > 1 || strong.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut ids: Vec<TypeId> = scc.into_iter().map(|n| strong[n]).collect();
                ids.sort_unstable();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }
}

/// Fails when some declaration has no finite value.
pub fn check_finite(schema: &Schema) -> Result<()> {
    let graph = TypeGraph::build(schema);
    match graph.infinite_cycles().into_iter().next() {
        Some(cycle) => Err(SchemaError::InfiniteType {
            members: cycle
                .into_iter()
                .map(|id| schema.types()[id].fqn().to_string())
                .collect(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{FieldDescription, TypeDescription};
    use crate::Hyperschema;

    fn build(types: Vec<TypeDescription>) -> Result<Schema> {
        let mut schema = Hyperschema::new();
        let mut ns = schema.namespace("ns")?;
        for t in types {
            ns.register(t)?;
        }
        schema.build()
    }

    #[test]
    fn test_optional_self_reference_is_finite() {
        let schema = build(vec![TypeDescription::structure(
            "node",
            vec![
                FieldDescription::new("value", "uint").required(),
                FieldDescription::new("next", "@ns/node"),
                FieldDescription::new("children", "@ns/node").array().required(),
            ],
        )])
        .unwrap();
        let graph = TypeGraph::build(&schema);
        assert!(graph.infinite_cycles().is_empty());
        assert_eq!(graph.dependencies(0), vec![0]);
    }

    #[test]
    fn test_required_self_reference() {
        let err = build(vec![TypeDescription::structure(
            "node",
            vec![FieldDescription::new("next", "@ns/node").required()],
        )])
        .unwrap_err();
        assert!(matches!(err, SchemaError::InfiniteType { members } if members == vec!["@ns/node"]));
    }

    #[test]
    fn test_alias_cycle() {
        let err = build(vec![
            TypeDescription::alias("a", "@ns/b"),
            TypeDescription::alias("b", "@ns/a"),
        ])
        .unwrap_err();
        match err {
            SchemaError::InfiniteType { members } => assert_eq!(members, vec!["@ns/a", "@ns/b"]),
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_cycle_broken_by_optional_field() {
        let schema = build(vec![
            TypeDescription::structure("a", vec![FieldDescription::new("b", "@ns/b").required()]),
            TypeDescription::structure("b", vec![FieldDescription::new("a", "@ns/a")]),
        ]);
        assert!(schema.is_ok());
    }
}
