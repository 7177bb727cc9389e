use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

/// A peer link between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            id: format!("{}-{}", from, to),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Renderable node/edge set built from one topology report.
///
/// Both collections keep insertion order for stable layouts but have set
/// semantics: inserting an existing node or `(from, to)` pair is a no-op and
/// does not move it.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    nodes: IndexSet<String>,
    edges: IndexMap<(String, String), Edge>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the node was already present.
    pub fn insert_node(&mut self, id: impl Into<String>) -> bool {
        self.nodes.insert(id.into())
    }

    /// Returns `false` when an edge for the same ordered pair was already present.
    pub fn insert_edge(&mut self, from: &str, to: &str) -> bool {
        match self.edges.entry((from.to_string(), to.to_string())) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Edge::new(from, to));
                true
            }
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        self.edges.contains_key(&(from.to_string(), to.to_string()))
    }

    /// Edge endpoints that never appeared as a reporting node.
    pub fn dangling_endpoints(&self) -> Vec<&str> {
        let mut seen = IndexSet::new();
        for edge in self.edges.values() {
            for endpoint in [edge.from.as_str(), edge.to.as_str()] {
                if !self.nodes.contains(endpoint) {
                    seen.insert(endpoint);
                }
            }
        }
        seen.into_iter().collect()
    }

    /// Order-insensitive comparison of node and edge sets.
    pub fn same_elements(&self, other: &GraphModel) -> bool {
        // IndexSet/IndexMap equality ignores insertion order
        self.nodes == other.nodes && self.edges == other.edges
    }

    /// Directed petgraph view weighted by node and edge ids. Dangling
    /// endpoints become implicit nodes.
    pub fn to_petgraph(&self) -> DiGraph<String, String> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.edges.len());
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

        for id in &self.nodes {
            indices.insert(id.as_str(), graph.add_node(id.clone()));
        }

        for edge in self.edges.values() {
            let from = *indices
                .entry(edge.from.as_str())
                .or_insert_with(|| graph.add_node(edge.from.clone()));
            let to = *indices
                .entry(edge.to.as_str())
                .or_insert_with(|| graph.add_node(edge.to.clone()));
            graph.add_edge(from, to, edge.id.clone());
        }

        graph
    }
}

impl Serialize for GraphModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct NodeElement<'a> {
            id: &'a str,
        }

        #[derive(Serialize)]
        struct Elements<'a> {
            nodes: Vec<NodeElement<'a>>,
            edges: Vec<&'a Edge>,
        }

        Elements {
            nodes: self.nodes().map(|id| NodeElement { id }).collect(),
            edges: self.edges().collect(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_insertion_is_idempotent_and_keeps_position() {
        let mut model = GraphModel::new();
        assert!(model.insert_node("a:1"));
        assert!(model.insert_node("b:1"));
        assert!(!model.insert_node("a:1"));

        let nodes: Vec<&str> = model.nodes().collect();
        assert_eq!(nodes, vec!["a:1", "b:1"]);
    }

    #[test]
    fn test_edge_insertion_dedups_ordered_pair() {
        let mut model = GraphModel::new();
        assert!(model.insert_edge("a:1", "b:1"));
        assert!(!model.insert_edge("a:1", "b:1"));
        assert!(model.insert_edge("b:1", "a:1"));
        assert_eq!(model.edge_count(), 2);

        let first = model.edges().next().unwrap();
        assert_eq!(first.id, "a:1-b:1");
        assert_eq!(first.from, "a:1");
        assert_eq!(first.to, "b:1");
    }

    #[test]
    fn test_dangling_endpoints() {
        let mut model = GraphModel::new();
        model.insert_node("a:1");
        model.insert_edge("a:1", "b:1");
        model.insert_edge("a:1", "c:1");
        model.insert_edge("a:1", "b:1");
        assert_eq!(model.dangling_endpoints(), vec!["b:1", "c:1"]);
    }

    #[test]
    fn test_same_elements_ignores_order() {
        let mut left = GraphModel::new();
        left.insert_node("a:1");
        left.insert_node("b:1");
        left.insert_edge("a:1", "b:1");

        let mut right = GraphModel::new();
        right.insert_node("b:1");
        right.insert_node("a:1");
        right.insert_edge("a:1", "b:1");

        assert!(left.same_elements(&right));

        right.insert_edge("b:1", "a:1");
        assert!(!left.same_elements(&right));
    }

    #[test]
    fn test_to_petgraph_adds_implicit_nodes() {
        let mut model = GraphModel::new();
        model.insert_node("a:1");
        model.insert_edge("a:1", "b:1");

        let graph = model.to_petgraph();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_serializes_renderer_elements() {
        let mut model = GraphModel::new();
        model.insert_node("a:1");
        model.insert_node("b:1");
        model.insert_edge("a:1", "b:1");

        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "nodes": [{"id": "a:1"}, {"id": "b:1"}],
                "edges": [{"id": "a:1-b:1", "from": "a:1", "to": "b:1"}]
            })
        );
    }
}
