use crate::client::ControlClient;
use crate::error::Result;
use chrono::{DateTime, Local};
use peerscope_core::GraphModel;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Orders concurrent fetches so an older response never replaces a newer one.
#[derive(Debug, Default)]
pub struct SnapshotSequencer {
    issued: AtomicU64,
    committed: AtomicU64,
}

impl SnapshotSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tickets start at 1 and increase with every call.
    pub fn next_ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Accepts `ticket` only if it is newer than every ticket committed so far.
    pub fn try_commit(&self, ticket: u64) -> bool {
        self.committed.fetch_max(ticket, Ordering::SeqCst) < ticket
    }

    pub fn last_committed(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
    }

    pub fn is_stale(&self, ticket: u64) -> bool {
        ticket <= self.last_committed()
    }
}

/// Message sent from the poller to whatever renders the topology.
#[derive(Debug, Clone)]
pub enum TopologyUpdate {
    Snapshot {
        sequence: u64,
        model: GraphModel,
        fetched_at: DateTime<Local>,
    },
    FetchFailed {
        sequence: u64,
        error: String,
    },
}

impl TopologyUpdate {
    pub fn sequence(&self) -> u64 {
        match self {
            TopologyUpdate::Snapshot { sequence, .. } => *sequence,
            TopologyUpdate::FetchFailed { sequence, .. } => *sequence,
        }
    }
}

/// Cloneable handle that asks the poller for an immediate fetch.
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl RefreshTrigger {
    /// Returns `false` once the poller has stopped.
    pub fn refresh(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

pub struct PollerHandle {
    trigger: RefreshTrigger,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    sequencer: Arc<SnapshotSequencer>,
}

impl PollerHandle {
    pub fn refresh(&self) -> bool {
        self.trigger.refresh()
    }

    pub fn trigger(&self) -> RefreshTrigger {
        self.trigger.clone()
    }

    pub fn sequencer(&self) -> Arc<SnapshotSequencer> {
        self.sequencer.clone()
    }

    /// Stops scheduling new fetches. Fetches already in flight may still
    /// deliver their result.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        self.task.await?;
        Ok(())
    }
}

pub struct Poller;

impl Poller {
    /// Fetch immediately, then on every `interval` tick and every manual
    /// refresh. Each fetch runs in its own task; results older than the
    /// newest committed snapshot are dropped.
    pub fn spawn(
        client: ControlClient,
        interval: Duration,
    ) -> (PollerHandle, mpsc::UnboundedReceiver<TopologyUpdate>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel::<()>();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let sequencer = Arc::new(SnapshotSequencer::new());
        let task_sequencer = sequencer.clone();

        let task = tokio::spawn(async move {
            info!(
                "Polling {} every {}s",
                client.peers_url(),
                interval.as_secs()
            );
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    Some(()) = refresh_rx.recv() => {
                        debug!("Manual refresh requested");
                        ticker.reset();
                    }
                    _ = ticker.tick() => {}
                }

                let ticket = task_sequencer.next_ticket();
                let client = client.clone();
                let tx = update_tx.clone();
                let sequencer = task_sequencer.clone();

                tokio::spawn(async move {
                    let update = match client.fetch_graph().await {
                        Ok(model) => {
                            if !sequencer.try_commit(ticket) {
                                debug!("Discarding stale snapshot #{}", ticket);
                                return;
                            }
                            TopologyUpdate::Snapshot {
                                sequence: ticket,
                                model,
                                fetched_at: Local::now(),
                            }
                        }
                        Err(e) => {
                            if sequencer.is_stale(ticket) {
                                debug!("Discarding stale failure #{}: {}", ticket, e);
                                return;
                            }
                            warn!("Fetch #{} failed: {}", ticket, e);
                            TopologyUpdate::FetchFailed {
                                sequence: ticket,
                                error: e.to_string(),
                            }
                        }
                    };

                    // receiver gone means the viewer exited
                    let _ = tx.send(update);
                });
            }

            debug!("Poller stopped");
        });

        let handle = PollerHandle {
            trigger: RefreshTrigger { tx: refresh_tx },
            shutdown_tx,
            task,
            sequencer,
        };

        (handle, update_rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerscope_core::ViewerConfig;
    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const LONG: Duration = Duration::from_secs(3600);

    fn report(host: &str) -> String {
        format!(
            r#"{{"nodes":[{{"address":{{"host":"{}","port":7000}},"peers":[]}}]}}"#,
            host
        )
    }

    fn client_for(server: &MockServer) -> ControlClient {
        let config = ViewerConfig::new(Url::parse(&server.uri()).unwrap());
        ControlClient::new(&config).unwrap()
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<TopologyUpdate>) -> TopologyUpdate {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("poller channel closed")
    }

    #[test]
    fn test_sequencer_tickets_increase() {
        let sequencer = SnapshotSequencer::new();
        assert_eq!(sequencer.next_ticket(), 1);
        assert_eq!(sequencer.next_ticket(), 2);
        assert_eq!(sequencer.next_ticket(), 3);
    }

    #[test]
    fn test_sequencer_rejects_stale_commit() {
        let sequencer = SnapshotSequencer::new();
        let first = sequencer.next_ticket();
        let second = sequencer.next_ticket();

        assert!(sequencer.try_commit(second));
        assert!(!sequencer.try_commit(first));
        assert!(!sequencer.try_commit(second));
        assert_eq!(sequencer.last_committed(), second);
        assert!(sequencer.is_stale(first));
    }

    #[test]
    fn test_sequencer_in_order_commits() {
        let sequencer = SnapshotSequencer::new();
        let first = sequencer.next_ticket();
        let second = sequencer.next_ticket();

        assert!(sequencer.try_commit(first));
        assert!(sequencer.try_commit(second));
        assert!(!sequencer.is_stale(sequencer.next_ticket()));
    }

    #[tokio::test]
    async fn test_initial_fetch_and_manual_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/peers"))
            .respond_with(ResponseTemplate::new(200).set_body_string(report("a")))
            .mount(&server)
            .await;

        let (handle, mut rx) = Poller::spawn(client_for(&server), LONG);

        let first = recv(&mut rx).await;
        assert_eq!(first.sequence(), 1);
        match first {
            TopologyUpdate::Snapshot { model, .. } => assert!(model.contains_node("a:7000")),
            other => panic!("unexpected update: {:?}", other),
        }

        assert!(handle.refresh());
        let second = recv(&mut rx).await;
        assert_eq!(second.sequence(), 2);
        assert!(matches!(second, TopologyUpdate::Snapshot { .. }));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_fetch_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/peers"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (handle, mut rx) = Poller::spawn(client_for(&server), LONG);

        match recv(&mut rx).await {
            TopologyUpdate::FetchFailed { sequence, error } => {
                assert_eq!(sequence, 1);
                assert!(error.contains("503"));
            }
            other => panic!("unexpected update: {:?}", other),
        }

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_older_fetch_is_discarded() {
        let server = MockServer::start().await;

        // first request is slow, later ones are fast
        Mock::given(method("GET"))
            .and(path("/peers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(report("old"))
                    .set_delay(Duration::from_millis(500)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/peers"))
            .respond_with(ResponseTemplate::new(200).set_body_string(report("new")))
            .mount(&server)
            .await;

        let (handle, mut rx) = Poller::spawn(client_for(&server), LONG);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.refresh());

        match recv(&mut rx).await {
            TopologyUpdate::Snapshot { sequence, model, .. } => {
                assert_eq!(sequence, 2);
                assert!(model.contains_node("new:7000"));
            }
            other => panic!("unexpected update: {:?}", other),
        }

        // the slow first response completes but never reaches the channel
        let late = tokio::time::timeout(Duration::from_millis(900), rx.recv()).await;
        assert!(late.is_err(), "stale snapshot was delivered: {:?}", late);
        assert_eq!(handle.sequencer().last_committed(), 2);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_interval_triggers_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/peers"))
            .respond_with(ResponseTemplate::new(200).set_body_string(report("a")))
            .mount(&server)
            .await;

        let (handle, mut rx) = Poller::spawn(client_for(&server), Duration::from_millis(50));

        let first = recv(&mut rx).await;
        let second = recv(&mut rx).await;
        assert!(second.sequence() > first.sequence());

        handle.shutdown().await.unwrap();
    }
}
