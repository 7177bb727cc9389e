// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    expand_path, load_report_file, parse_output_format, parse_peer_address, render_topology,
    write_report,
};
