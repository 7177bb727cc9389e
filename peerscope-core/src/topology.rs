use crate::address::{Address, encode};
use crate::error::{AddressError, Result, TopologyError};
use crate::graph::GraphModel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One `/peers` snapshot as returned by the control node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyReport {
    pub nodes: Option<Vec<NodeRecord>>,
}

/// A node's self-reported view of its peers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(alias = "addr", alias = "config")]
    pub address: Option<RawAddress>,
    pub peers: Option<Vec<Option<RawAddress>>>,
}

/// Address as it appears on the wire. Fields are kept untyped so missing or
/// mistyped ones can be reported with their position instead of a bare
/// decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAddress {
    #[serde(alias = "ip")]
    pub host: Option<Value>,
    pub port: Option<Value>,
}

impl From<&Address> for RawAddress {
    fn from(address: &Address) -> Self {
        Self {
            host: Some(Value::from(address.host.as_str())),
            port: Some(Value::from(address.port)),
        }
    }
}

impl NodeRecord {
    pub fn new(address: &Address, peers: &[Address]) -> Self {
        Self {
            address: Some(address.into()),
            peers: Some(peers.iter().map(|p| Some(p.into())).collect()),
        }
    }
}

impl TopologyReport {
    pub fn new(nodes: Vec<NodeRecord>) -> Self {
        Self { nodes: Some(nodes) }
    }
}

/// How peer links observed from both ends are collapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgePolicy {
    /// A peer link is dropped when the peer's own record was processed
    /// earlier in the report. Result depends on record order.
    #[default]
    AsReported,
    /// A peer link is dropped when the reverse link already exists, so each
    /// unordered pair yields one edge regardless of record order.
    Undirected,
}

#[derive(Debug, Clone, Default)]
pub struct TopologyBuilder {
    edge_policy: EdgePolicy,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edge_policy(mut self, edge_policy: EdgePolicy) -> Self {
        self.edge_policy = edge_policy;
        self
    }

    pub fn edge_policy(&self) -> EdgePolicy {
        self.edge_policy
    }

    /// Build a fresh graph model from one report.
    ///
    /// Nodes are added for every record's own address; peers only produce
    /// edges. Any malformed record aborts the whole report.
    pub fn parse(&self, report: &TopologyReport) -> Result<GraphModel> {
        let mut model = GraphModel::new();

        let Some(records) = report.nodes.as_deref() else {
            return Ok(model);
        };

        let mut analyzed: HashSet<String> = HashSet::new();

        for (index, record) in records.iter().enumerate() {
            let raw = record
                .address
                .as_ref()
                .ok_or_else(|| malformed(index, None, "missing address"))?;
            let self_key = resolve(raw, index, None)?;

            model.insert_node(self_key.clone());

            if let Some(peers) = &record.peers {
                for (peer_index, peer) in peers.iter().enumerate() {
                    let raw = peer
                        .as_ref()
                        .ok_or_else(|| malformed(index, Some(peer_index), "null peer entry"))?;
                    let peer_key = resolve(raw, index, Some(peer_index))?;

                    let admitted = match self.edge_policy {
                        EdgePolicy::AsReported => !analyzed.contains(&peer_key),
                        EdgePolicy::Undirected => !model.contains_edge(&peer_key, &self_key),
                    };

                    if admitted {
                        model.insert_edge(&self_key, &peer_key);
                    }
                }
            }

            analyzed.insert(self_key);
        }

        Ok(model)
    }

    pub fn parse_json(&self, json: &str) -> Result<GraphModel> {
        let report: TopologyReport = serde_json::from_str(json)?;
        self.parse(&report)
    }

    pub fn parse_slice(&self, bytes: &[u8]) -> Result<GraphModel> {
        let report: TopologyReport = serde_json::from_slice(bytes)?;
        self.parse(&report)
    }
}

fn resolve(raw: &RawAddress, node: usize, peer: Option<usize>) -> Result<String> {
    let host = match &raw.host {
        None | Some(Value::Null) => return Err(malformed(node, peer, "missing host")),
        Some(Value::String(host)) => host.as_str(),
        Some(_) => return Err(malformed(node, peer, "host is not a string")),
    };

    let port = match &raw.port {
        None | Some(Value::Null) => return Err(malformed(node, peer, "missing port")),
        // Floats and integers beyond i64 are numbers but never valid ports
        Some(Value::Number(number)) => number.as_i64().ok_or_else(|| {
            invalid(node, peer, AddressError::InvalidPort(number.to_string()))
        })?,
        Some(_) => return Err(malformed(node, peer, "port is not a number")),
    };

    let address = Address::new(host, port).map_err(|source| invalid(node, peer, source))?;
    Ok(encode(&address))
}

fn invalid(node: usize, peer: Option<usize>, source: AddressError) -> TopologyError {
    TopologyError::InvalidAddress { node, peer, source }
}

fn malformed(node: usize, peer: Option<usize>, reason: &str) -> TopologyError {
    TopologyError::MalformedReport {
        node,
        peer,
        reason: reason.to_string(),
    }
}
