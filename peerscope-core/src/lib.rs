pub mod address;
pub mod analysis;
pub mod config;
pub mod error;
pub mod graph;
pub mod output;
pub mod topology;

pub use address::{Address, encode};
pub use analysis::{LowPeerNode, PEER_MIN_PEERS, TopologySummary, find_clusters, find_low_peers};
pub use config::ViewerConfig;
pub use error::{AddressError, TopologyError};
pub use graph::{Edge, GraphModel};
pub use output::OutputFormat;
pub use topology::{EdgePolicy, NodeRecord, RawAddress, TopologyBuilder, TopologyReport};
