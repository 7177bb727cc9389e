// Health checks over a parsed topology

use crate::graph::GraphModel;
use indexmap::IndexMap;
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Minimum number of distinct peers every node is expected to keep.
pub const PEER_MIN_PEERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowPeerNode {
    pub id: String,
    pub peers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub min_peers: usize,
    pub clusters: Vec<Vec<String>>,
    pub low_peers: Vec<LowPeerNode>,
    pub dangling: Vec<String>,
}

impl TopologySummary {
    pub fn from_model(model: &GraphModel, min_peers: usize) -> Self {
        Self {
            node_count: model.node_count(),
            edge_count: model.edge_count(),
            min_peers,
            clusters: find_clusters(model),
            low_peers: find_low_peers(model, min_peers),
            dangling: model
                .dangling_endpoints()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// More than one cluster means some nodes cannot reach each other.
    pub fn is_partitioned(&self) -> bool {
        self.clusters.len() > 1
    }
}

/// Connected components of the undirected view, largest first.
///
/// Members keep node insertion order; implicit (dangling) endpoints are
/// included in the cluster they are linked to.
pub fn find_clusters(model: &GraphModel) -> Vec<Vec<String>> {
    let graph = model.to_petgraph();
    let mut sets: UnionFind<usize> = UnionFind::new(graph.node_count());

    for edge in graph.edge_references() {
        sets.union(edge.source().index(), edge.target().index());
    }

    let mut grouped: IndexMap<usize, Vec<String>> = IndexMap::new();
    for index in graph.node_indices() {
        grouped
            .entry(sets.find(index.index()))
            .or_default()
            .push(graph[index].clone());
    }

    let mut clusters: Vec<Vec<String>> = grouped.into_values().collect();
    // stable: equally sized clusters stay in first-seen order
    clusters.sort_by(|a, b| b.len().cmp(&a.len()));
    clusters
}

/// Reported nodes with fewer than `min_peers` distinct neighbours.
pub fn find_low_peers(model: &GraphModel, min_peers: usize) -> Vec<LowPeerNode> {
    let mut neighbours: HashMap<&str, HashSet<&str>> = HashMap::new();

    for edge in model.edges() {
        if edge.from == edge.to {
            continue;
        }
        neighbours
            .entry(edge.from.as_str())
            .or_default()
            .insert(edge.to.as_str());
        neighbours
            .entry(edge.to.as_str())
            .or_default()
            .insert(edge.from.as_str());
    }

    model
        .nodes()
        .filter_map(|id| {
            let peers = neighbours.get(id).map_or(0, HashSet::len);
            (peers < min_peers).then(|| LowPeerNode {
                id: id.to_string(),
                peers,
            })
        })
        .collect()
}
