pub mod topology_monitor;

pub use topology_monitor::{LogLevel, TopologyMonitor, run_monitor};
