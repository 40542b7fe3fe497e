//! Service reference graph built on `petgraph`.
//!
//! Nodes are service identifiers; every reference occurrence becomes one
//! edge from the referencing service to the service it resolves to after
//! following aliases. References nested inside inline definitions are
//! attributed to the top-level service that embeds them.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::NodeIndex;

use wireup_common::error::{Result, WireupError};
use wireup_common::types::{ReferencePolicy, ServiceId};

use crate::definition::Definition;
use crate::store::DefinitionStore;
use crate::value::Value;

/// Where a reference sits inside its definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Constructor argument.
    Argument,
    /// Injected property.
    Property,
    /// Method-call argument.
    MethodCall,
}

/// One reference occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEdge {
    /// Position of the reference.
    pub kind: EdgeKind,
    /// Invalid-reference policy it carries.
    pub policy: ReferencePolicy,
    /// Alias the reference went through, if it named one.
    pub via_alias: Option<ServiceId>,
}

/// A directed graph of references between services.
#[derive(Debug, Default)]
pub struct ServiceReferenceGraph {
    graph: petgraph::Graph<ServiceId, ReferenceEdge>,
    nodes: HashMap<ServiceId, NodeIndex>,
}

impl ServiceReferenceGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph for every concrete definition in `store`.
    ///
    /// Abstract definitions are never built, so their references are not
    /// edges.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference goes through a circular alias chain.
    pub fn build(store: &DefinitionStore) -> Result<Self> {
        let mut graph = Self::new();
        for (id, definition) in store.all() {
            let _ = graph.add_service(id.clone());
            if definition.is_abstract() {
                continue;
            }
            graph.add_definition_edges(store, id, definition)?;
        }
        Ok(graph)
    }

    fn add_definition_edges(
        &mut self,
        store: &DefinitionStore,
        source: &ServiceId,
        definition: &Definition,
    ) -> Result<()> {
        for value in definition.arguments() {
            self.add_value_edges(store, source, value, EdgeKind::Argument)?;
        }
        for value in definition.properties().values() {
            self.add_value_edges(store, source, value, EdgeKind::Property)?;
        }
        for call in definition.calls() {
            for value in &call.arguments {
                self.add_value_edges(store, source, value, EdgeKind::MethodCall)?;
            }
        }
        Ok(())
    }

    fn add_value_edges(
        &mut self,
        store: &DefinitionStore,
        source: &ServiceId,
        value: &Value,
        kind: EdgeKind,
    ) -> Result<()> {
        match value {
            Value::Reference(reference) => {
                let target = store.resolve_alias(reference.id.as_str())?;
                let via_alias = (target != reference.id).then(|| reference.id.clone());
                self.add_reference(
                    source.clone(),
                    target,
                    ReferenceEdge {
                        kind,
                        policy: reference.policy,
                        via_alias,
                    },
                );
            }
            Value::List(items) => {
                for item in items {
                    self.add_value_edges(store, source, item, kind)?;
                }
            }
            Value::Map(entries) => {
                for item in entries.values() {
                    self.add_value_edges(store, source, item, kind)?;
                }
            }
            Value::Inline(inner) => self.add_definition_edges(store, source, inner)?,
            Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Native(_) => {}
        }
        Ok(())
    }

    /// Adds a service node, returning the existing one if present.
    pub fn add_service(&mut self, id: ServiceId) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        let _ = self.nodes.insert(id, idx);
        idx
    }

    /// Adds a reference edge from `source` to `target`.
    pub fn add_reference(&mut self, source: ServiceId, target: ServiceId, edge: ReferenceEdge) {
        let from = self.add_service(source);
        let to = self.add_service(target);
        let _ = self.graph.add_edge(from, to, edge);
    }

    /// Returns whether `id` is a node.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns every reference pointing at `id`, with its source.
    #[must_use]
    pub fn incoming(&self, id: &str) -> Vec<(&ServiceId, &ReferenceEdge)> {
        self.edges(id, Direction::Incoming)
    }

    /// Returns every reference made by `id`, with its target.
    #[must_use]
    pub fn outgoing(&self, id: &str) -> Vec<(&ServiceId, &ReferenceEdge)> {
        self.edges(id, Direction::Outgoing)
    }

    fn edges(&self, id: &str, direction: Direction) -> Vec<(&ServiceId, &ReferenceEdge)> {
        let Some(&idx) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut walker = self.graph.neighbors_directed(idx, direction).detach();
        let mut found = Vec::new();
        while let Some((edge, other)) = walker.next(&self.graph) {
            if let (Some(other_id), Some(weight)) =
                (self.graph.node_weight(other), self.graph.edge_weight(edge))
            {
                found.push((other_id, weight));
            }
        }
        found.reverse();
        found
    }

    /// Returns a construction order: every service appears after the
    /// services it references.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::CircularReference`] with the offending chain
    /// if the graph contains a cycle.
    pub fn resolve_order(&self) -> Result<Vec<ServiceId>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .rev()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => Err(WireupError::CircularReference {
                chain: self.cycle_through(cycle.node_id()),
            }),
        }
    }

    /// Finds a path that starts and ends at `start`.
    fn cycle_through(&self, start: NodeIndex) -> Vec<String> {
        let mut path = vec![start];
        let mut visited = vec![start];
        if self.find_path_back(start, start, &mut path, &mut visited) {
            path.iter()
                .filter_map(|&idx| self.graph.node_weight(idx))
                .map(ToString::to_string)
                .collect()
        } else {
            self.graph
                .node_weight(start)
                .map(ToString::to_string)
                .into_iter()
                .collect()
        }
    }

    fn find_path_back(
        &self,
        current: NodeIndex,
        start: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut Vec<NodeIndex>,
    ) -> bool {
        let mut next: Vec<NodeIndex> = self.graph.neighbors(current).collect();
        next.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        next.dedup();
        for neighbor in next {
            if neighbor == start {
                path.push(start);
                return true;
            }
            if visited.contains(&neighbor) {
                continue;
            }
            visited.push(neighbor);
            path.push(neighbor);
            if self.find_path_back(neighbor, start, path, visited) {
                return true;
            }
            let _ = path.pop();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge() -> ReferenceEdge {
        ReferenceEdge {
            kind: EdgeKind::Argument,
            policy: ReferencePolicy::Exception,
            via_alias: None,
        }
    }

    #[test]
    fn empty_graph_resolves_to_empty() {
        let graph = ServiceReferenceGraph::new();
        let order = graph.resolve_order().expect("should resolve");
        assert!(order.is_empty());
    }

    #[test]
    fn linear_dependency_chain() {
        let mut graph = ServiceReferenceGraph::new();
        graph.add_reference("api".into(), "db".into(), edge());

        let order = graph.resolve_order().expect("should resolve");
        let pos = |name: &str| order.iter().position(|n| n.as_str() == name).expect(name);
        assert!(pos("db") < pos("api"), "db should come before api: {order:?}");
    }

    #[test]
    fn diamond_dependency() {
        let mut graph = ServiceReferenceGraph::new();
        graph.add_reference("a".into(), "b".into(), edge());
        graph.add_reference("a".into(), "c".into(), edge());
        graph.add_reference("b".into(), "d".into(), edge());
        graph.add_reference("c".into(), "d".into(), edge());

        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order.len(), 4);
        let pos = |name: &str| order.iter().position(|n| n.as_str() == name).expect(name);
        assert!(pos("d") < pos("b"));
        assert!(pos("d") < pos("c"));
        assert!(pos("b") < pos("a"));
        assert!(pos("c") < pos("a"));
    }

    #[test]
    fn cycle_detection_reports_chain() {
        let mut graph = ServiceReferenceGraph::new();
        graph.add_reference("a".into(), "b".into(), edge());
        graph.add_reference("b".into(), "c".into(), edge());
        graph.add_reference("c".into(), "a".into(), edge());

        let err = graph.resolve_order().unwrap_err();
        let WireupError::CircularReference { chain } = err else {
            panic!("expected circular reference, got {err}");
        };
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.first(), chain.last());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut graph = ServiceReferenceGraph::new();
        graph.add_reference("a".into(), "a".into(), edge());
        let err = graph.resolve_order().unwrap_err();
        assert!(err.to_string().contains("a -> a"), "got: {err}");
    }

    #[test]
    fn build_follows_aliases_and_nesting() {
        let mut store = DefinitionStore::new();
        store.register("logger", Definition::new("Logger"));
        store.set_alias("log", "logger").expect("alias");
        store.register(
            "mailer",
            Definition::new("Mailer")
                .with_argument(Value::service("log"))
                .with_argument(Value::from(
                    Definition::new("Transport").with_call("setLogger", vec![Value::service("logger")]),
                )),
        );

        let graph = ServiceReferenceGraph::build(&store).expect("build");
        let incoming = graph.incoming("logger");
        assert_eq!(incoming.len(), 2);
        assert!(incoming.iter().all(|(source, _)| source.as_str() == "mailer"));
        assert_eq!(
            incoming[0].1.via_alias.as_ref().map(ServiceId::as_str),
            Some("log")
        );
        assert_eq!(incoming[1].1.kind, EdgeKind::MethodCall);
    }

    #[test]
    fn abstract_definitions_contribute_no_edges() {
        let mut store = DefinitionStore::new();
        store.register(
            "template",
            Definition::new("Base")
                .with_abstract(true)
                .with_argument(Value::service("dep")),
        );
        let graph = ServiceReferenceGraph::build(&store).expect("build");
        assert!(graph.incoming("dep").is_empty());
        assert!(graph.contains("template"));
    }
}
