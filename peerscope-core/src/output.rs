// Renderer adapters for a parsed topology

use crate::analysis::{LowPeerNode, TopologySummary};
use crate::graph::GraphModel;
use petgraph::dot::{Config, Dot};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Dot,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "dot" | "graphviz" => Some(OutputFormat::Dot),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Dot => "dot",
        }
    }
}

pub fn render(
    format: OutputFormat,
    model: &GraphModel,
    summary: &TopologySummary,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(generate_text_report(model, summary)),
        OutputFormat::Json => generate_json_output(model, summary),
        OutputFormat::Dot => Ok(generate_dot(model)),
    }
}

pub fn generate_text_report(model: &GraphModel, summary: &TopologySummary) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                          PEERSCOPE TOPOLOGY REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Nodes:        {}\n", summary.node_count));
    report.push_str(&format!("Edges:        {}\n", summary.edge_count));
    report.push_str(&format!(
        "Clusters:     {}{}\n",
        summary.clusters.len(),
        if summary.is_partitioned() { "  (partitioned)" } else { "" }
    ));
    report.push_str(&format!("Min peers:    {}\n", summary.min_peers));
    report.push('\n');

    if model.is_empty() {
        report.push_str("No nodes reported.\n\n");
        report.push_str(RULE);
        return report;
    }

    report.push_str(RULE);
    report.push_str("NODES\n");
    report.push_str(RULE);
    report.push('\n');
    for id in model.nodes() {
        report.push_str(&format!("  {}\n", id));
    }
    report.push('\n');

    report.push_str(RULE);
    report.push_str("EDGES\n");
    report.push_str(RULE);
    report.push('\n');
    if model.edge_count() == 0 {
        report.push_str("  (none)\n");
    }
    for edge in model.edges() {
        report.push_str(&format!("  {} -> {}\n", edge.from, edge.to));
    }
    report.push('\n');

    if !summary.low_peers.is_empty() {
        report.push_str(RULE);
        report.push_str("LOW PEER NODES\n");
        report.push_str(RULE);
        report.push('\n');
        for node in &summary.low_peers {
            report.push_str(&format!(
                "  [LOW] {}  ({}/{} peers)\n",
                node.id, node.peers, summary.min_peers
            ));
        }
        report.push('\n');
    }

    if summary.is_partitioned() {
        report.push_str(RULE);
        report.push_str("CLUSTERS\n");
        report.push_str(RULE);
        report.push('\n');
        for (idx, cluster) in summary.clusters.iter().enumerate() {
            report.push_str(&format!("[{}] {} nodes\n", idx + 1, cluster.len()));
            for id in cluster {
                report.push_str(&format!("  {}\n", id));
            }
        }
        report.push('\n');
    }

    if !summary.dangling.is_empty() {
        report.push_str(RULE);
        report.push_str("UNREPORTED PEERS\n");
        report.push_str(RULE);
        report.push('\n');
        for id in &summary.dangling {
            report.push_str(&format!("  {}\n", id));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: JsonMetadata,
    summary: JsonSummary<'a>,
    #[serde(flatten)]
    elements: &'a GraphModel,
}

#[derive(Serialize)]
struct JsonMetadata {
    generator: &'static str,
    version: &'static str,
    generated_at: String,
    format: &'static str,
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    node_count: usize,
    edge_count: usize,
    min_peers: usize,
    cluster_count: usize,
    clusters: &'a [Vec<String>],
    low_peers: &'a [LowPeerNode],
    dangling: &'a [String],
}

/// Pretty JSON with `metadata` and `summary` ahead of the `nodes`/`edges` arrays.
pub fn generate_json_output(
    model: &GraphModel,
    summary: &TopologySummary,
) -> Result<String, serde_json::Error> {
    let report = JsonReport {
        metadata: JsonMetadata {
            generator: "Peerscope",
            version: env!("CARGO_PKG_VERSION"),
            generated_at: chrono::Utc::now().to_rfc3339(),
            format: "json",
        },
        summary: JsonSummary {
            node_count: summary.node_count,
            edge_count: summary.edge_count,
            min_peers: summary.min_peers,
            cluster_count: summary.clusters.len(),
            clusters: &summary.clusters,
            low_peers: &summary.low_peers,
            dangling: &summary.dangling,
        },
        elements: model,
    };

    serde_json::to_string_pretty(&report)
}

/// Graphviz rendering; edges are left unlabelled.
pub fn generate_dot(model: &GraphModel) -> String {
    let graph = model.to_petgraph();
    format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}

pub fn save_output(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
