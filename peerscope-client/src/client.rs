use crate::error::{ClientError, Result};
use peerscope_core::{Address, GraphModel, TopologyBuilder, TopologyError, TopologyReport, ViewerConfig};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

/// HTTP client for a gossip control node's `/peers` endpoint.
#[derive(Debug, Clone)]
pub struct ControlClient {
    client: Client,
    peers_url: Url,
    builder: TopologyBuilder,
}

impl ControlClient {
    pub fn new(config: &ViewerConfig) -> Result<Self> {
        let peers_url = config
            .peers_url()
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", config.control_url, e)))?;

        let client = Client::builder()
            .user_agent(concat!("Peerscope/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout / 2)
            .build()?;

        Ok(Self {
            client,
            peers_url,
            builder: TopologyBuilder::new().with_edge_policy(config.edge_policy),
        })
    }

    pub fn peers_url(&self) -> &Url {
        &self.peers_url
    }

    /// `GET /peers`, decoded but not yet validated.
    pub async fn fetch_report(&self) -> Result<TopologyReport> {
        debug!("Fetching {}", self.peers_url);

        let response = self.client.get(self.peers_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("GET {} returned {}", self.peers_url, status);
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let report: TopologyReport = serde_json::from_slice(&body).map_err(TopologyError::from)?;
        Ok(report)
    }

    /// Fetch one report and build a fresh graph model from it.
    pub async fn fetch_graph(&self) -> Result<GraphModel> {
        let report = self.fetch_report().await?;
        let model = self.builder.parse(&report)?;
        info!(
            "Topology from {}: {} nodes, {} edges",
            self.peers_url,
            model.node_count(),
            model.edge_count()
        );
        Ok(model)
    }

    /// `POST /peers` asking the controller to adopt a new node.
    pub async fn register_peer(&self, peer: &Address) -> Result<()> {
        if peer.port == 0 {
            return Err(ClientError::InvalidPeer(format!("{} has no port", peer)));
        }

        debug!("Registering {} with {}", peer, self.peers_url);

        let body = serde_json::json!({ "ip": peer.host, "port": peer.port });
        let response = self
            .client
            .post(self.peers_url.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("POST {} returned {}", self.peers_url, status);
            return Err(ClientError::Status(status.as_u16()));
        }

        info!("Registered {} with control node", peer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerscope_core::EdgePolicy;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    const MUTUAL: &str = r#"{"nodes":[
        {"addr":{"ip":"10.0.0.1","port":9000},"peers":[{"ip":"10.0.0.2","port":9000}]},
        {"addr":{"ip":"10.0.0.2","port":9000},"peers":[{"ip":"10.0.0.1","port":9000}]}
    ]}"#;

    fn client_for(server: &MockServer) -> ControlClient {
        let config = ViewerConfig::new(Url::parse(&server.uri()).unwrap())
            .with_request_timeout(Duration::from_secs(2));
        ControlClient::new(&config).unwrap()
    }

    async fn mount_peers(server: &MockServer, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path("/peers"))
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("content-type", "application/json")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_report() {
        let server = MockServer::start().await;
        mount_peers(&server, 200, MUTUAL).await;

        let report = client_for(&server).fetch_report().await.unwrap();

        assert_eq!(report.nodes.map(|n| n.len()), Some(2));
    }

    #[tokio::test]
    async fn test_fetch_graph() {
        let server = MockServer::start().await;
        mount_peers(&server, 200, MUTUAL).await;

        let model = client_for(&server).fetch_graph().await.unwrap();

        assert_eq!(model.node_count(), 2);
        assert_eq!(model.edge_count(), 1);
        assert!(model.contains_edge("10.0.0.1:9000", "10.0.0.2:9000"));
    }

    #[tokio::test]
    async fn test_fetch_graph_uses_configured_policy() {
        let server = MockServer::start().await;
        mount_peers(
            &server,
            200,
            r#"{"nodes":[
                {"addr":{"ip":"a","port":1},"peers":[]},
                {"addr":{"ip":"b","port":1},"peers":[{"ip":"a","port":1}]}
            ]}"#,
        )
        .await;

        let config = ViewerConfig::new(Url::parse(&server.uri()).unwrap())
            .with_edge_policy(EdgePolicy::Undirected);
        let client = ControlClient::new(&config).unwrap();

        let model = client.fetch_graph().await.unwrap();

        assert!(model.contains_edge("b:1", "a:1"));
    }

    #[tokio::test]
    async fn test_fetch_empty_topology() {
        let server = MockServer::start().await;
        mount_peers(&server, 200, r#"{"nodes":null}"#).await;

        let model = client_for(&server).fetch_graph().await.unwrap();

        assert!(model.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let server = MockServer::start().await;
        mount_peers(&server, 500, r#"{"message":"boom"}"#).await;

        let err = client_for(&server).fetch_graph().await.unwrap_err();

        assert!(matches!(err, ClientError::Status(500)));
    }

    #[tokio::test]
    async fn test_fetch_undecodable_body() {
        let server = MockServer::start().await;
        mount_peers(&server, 200, "<html>not json</html>").await;

        let err = client_for(&server).fetch_graph().await.unwrap_err();

        assert!(matches!(err, ClientError::Topology(TopologyError::Decode(_))));
    }

    #[tokio::test]
    async fn test_fetch_malformed_record() {
        let server = MockServer::start().await;
        mount_peers(&server, 200, r#"{"nodes":[{"peers":[]}]}"#).await;

        let err = client_for(&server).fetch_graph().await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Topology(TopologyError::MalformedReport { node: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_register_peer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/peers"))
            .and(body_json(serde_json::json!({"ip": "10.0.0.7", "port": 8080})))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"message":"Peer address received"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let peer = Address::new("10.0.0.7", 8080).unwrap();
        client_for(&server).register_peer(&peer).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_peer_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/peers"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let peer = Address::new("10.0.0.7", 8080).unwrap();
        let err = client_for(&server).register_peer(&peer).await.unwrap_err();

        assert!(matches!(err, ClientError::Status(400)));
    }

    #[tokio::test]
    async fn test_register_peer_port_zero() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let peer = Address::new("10.0.0.7", 0).unwrap();
        let err = client_for(&server).register_peer(&peer).await.unwrap_err();

        assert!(matches!(err, ClientError::InvalidPeer(_)));
    }

    #[test]
    fn test_peers_url_from_config() {
        let config = ViewerConfig::new(Url::parse("http://ctrl:7080/api").unwrap());
        let client = ControlClient::new(&config).unwrap();
        assert_eq!(client.peers_url().as_str(), "http://ctrl:7080/api/peers");
    }
}
