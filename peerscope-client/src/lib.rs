pub mod client;
pub mod error;
pub mod poller;

pub use client::ControlClient;
pub use error::ClientError;
pub use poller::{PollerHandle, Poller, RefreshTrigger, SnapshotSequencer, TopologyUpdate};
