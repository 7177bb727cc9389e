use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("host is empty")]
    EmptyHost,

    #[error("port {0} is outside 0..=65535")]
    PortOutOfRange(i64),

    #[error("missing ':port' in '{0}'")]
    MissingPort(String),

    #[error("invalid port '{0}'")]
    InvalidPort(String),
}

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Malformed report at {}: {reason}", location(*node, *peer))]
    MalformedReport {
        node: usize,
        peer: Option<usize>,
        reason: String,
    },

    #[error("Invalid address at {}: {source}", location(*node, *peer))]
    InvalidAddress {
        node: usize,
        peer: Option<usize>,
        source: AddressError,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

fn location(node: usize, peer: Option<usize>) -> String {
    match peer {
        Some(peer) => format!("nodes[{}].peers[{}]", node, peer),
        None => format!("nodes[{}]", node),
    }
}

pub type Result<T> = std::result::Result<T, TopologyError>;
