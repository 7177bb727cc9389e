use crate::analysis::PEER_MIN_PEERS;
use crate::topology::EdgePolicy;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONTROL_URL: &str = "http://127.0.0.1:7080";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Runtime settings for talking to a control node and interpreting its reports.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub control_url: Url,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub min_peers: usize,
    pub edge_policy: EdgePolicy,
}

impl ViewerConfig {
    pub fn new(control_url: Url) -> Self {
        Self {
            control_url,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            min_peers: PEER_MIN_PEERS,
            edge_policy: EdgePolicy::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_min_peers(mut self, min_peers: usize) -> Self {
        self.min_peers = min_peers;
        self
    }

    pub fn with_edge_policy(mut self, edge_policy: EdgePolicy) -> Self {
        self.edge_policy = edge_policy;
        self
    }

    /// `{control_url}/peers`, keeping any path prefix on the base URL.
    pub fn peers_url(&self) -> Result<Url, url::ParseError> {
        let mut base = self.control_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join("peers")
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_CONTROL_URL).expect("Invalid default control URL"))
    }
}
