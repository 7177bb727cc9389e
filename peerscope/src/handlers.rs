use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use peerscope_client::{ControlClient, Poller};
use peerscope_core::{
    Address, EdgePolicy, GraphModel, OutputFormat, TopologyBuilder, TopologySummary, ViewerConfig,
    output,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub fn print_banner() {
    println!(
        "{}",
        r#"
   ___
  / _ \___ ___ _______ _______  ___  ___
 / ___/ -_) -_) __(_-</ __/ _ \/ _ \/ -_)
/_/   \__/\__/_/ /___/\__/\___/ .__/\__/
                             /_/         "#
            .bright_cyan()
            .bold()
    );
    println!(
        "  {} {}\n",
        "gossip topology viewer".bright_white(),
        concat!("v", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn spinner(quiet: bool, msg: impl Into<String>) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(msg.into());
    spinner
}

/// Client logs go to stderr so piped json/dot output stays clean.
fn init_tracing(matches: &ArgMatches) {
    let level = if matches.get_flag("verbose") {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "✗".red().bold(), msg);
    std::process::exit(1);
}

/// Build the runtime configuration from the global flags, which clap copies
/// into every subcommand's matches
pub fn viewer_config_from_args(matches: &ArgMatches) -> ViewerConfig {
    let control = matches
        .get_one::<Url>("control")
        .cloned()
        .unwrap_or_else(|| ViewerConfig::default().control_url);

    let mut config = ViewerConfig::new(control);
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config = config.with_request_timeout(Duration::from_secs(*timeout));
    }
    if let Some(min_peers) = matches.get_one::<usize>("min-peers") {
        config = config.with_min_peers(*min_peers);
    }
    if matches.get_flag("undirected") {
        config = config.with_edge_policy(EdgePolicy::Undirected);
    }
    config
}

/// Parse a `HOST:PORT` argument into a peer address
pub fn parse_peer_address(value: &str) -> Result<Address, String> {
    value
        .parse::<Address>()
        .map_err(|e| format!("Invalid peer address '{}': {}", value, e))
}

/// True when stdout will carry a JSON or DOT report that any decoration
/// would corrupt
pub fn stdout_is_report(format: Option<&str>, destination: Option<&str>) -> bool {
    destination.is_none()
        && format
            .and_then(OutputFormat::from_str)
            .is_some_and(|format| format != OutputFormat::Text)
}

pub fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    OutputFormat::from_str(value).ok_or_else(|| format!("Unknown report format '{}'", value))
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// Read a saved `/peers` response and build its graph
pub fn load_report_file(path: &Path, builder: &TopologyBuilder) -> Result<GraphModel, String> {
    let content = fs::read(path)
        .map_err(|e| format!("Failed to read report {}: {}", path.display(), e))?;

    builder
        .parse_slice(&content)
        .map_err(|e| format!("{}: {}", path.display(), e))
}

pub fn render_topology(
    model: &GraphModel,
    format: OutputFormat,
    min_peers: usize,
) -> Result<String, String> {
    let summary = TopologySummary::from_model(model, min_peers);
    output::render(format, model, &summary)
        .map_err(|e| format!("Failed to render {} report: {}", format.extension(), e))
}

/// Save to `destination` when given, otherwise print to stdout. Returns the path written.
pub fn write_report(content: &str, destination: Option<&str>) -> Result<Option<PathBuf>, String> {
    let Some(destination) = destination else {
        print!("{}", content);
        return Ok(None);
    };

    let path = expand_path(destination);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    output::save_output(content, &path)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    Ok(Some(path))
}

fn print_headline(model: &GraphModel, min_peers: usize, source: &str) {
    let summary = TopologySummary::from_model(model, min_peers);
    println!(
        "{} {} nodes, {} edges from {}",
        "✓".green().bold(),
        summary.node_count.to_string().bright_white(),
        summary.edge_count.to_string().bright_white(),
        source.cyan()
    );
    if summary.is_partitioned() {
        println!(
            "{} Network is split into {} clusters",
            "⚠".yellow().bold(),
            summary.clusters.len().to_string().yellow()
        );
    }
    if !summary.low_peers.is_empty() {
        println!(
            "{} {} node(s) below {} peers",
            "⚠".yellow().bold(),
            summary.low_peers.len().to_string().yellow(),
            min_peers
        );
    }
    println!();
}

fn emit(model: &GraphModel, args: &ArgMatches, min_peers: usize, source: &str, quiet: bool) {
    let format = args
        .get_one::<String>("format")
        .map(|f| parse_output_format(f))
        .transpose()
        .unwrap_or_else(|e| fail(e))
        .unwrap_or(OutputFormat::Text);
    let destination = args.get_one::<String>("output").map(String::as_str);

    // Only decorate human-readable output on screen
    if !quiet && (format == OutputFormat::Text || destination.is_some()) {
        print_headline(model, min_peers, source);
    }

    let content = render_topology(model, format, min_peers).unwrap_or_else(|e| fail(e));
    match write_report(&content, destination) {
        Ok(Some(path)) => println!(
            "{} Saved {} report to {}",
            "✓".green().bold(),
            format.extension(),
            path.display().to_string().bright_white()
        ),
        Ok(None) => {}
        Err(e) => fail(e),
    }
}

pub async fn handle_fetch(args: &ArgMatches) {
    init_tracing(args);

    let quiet = args.get_flag("quiet");
    let config = viewer_config_from_args(args);
    let client = ControlClient::new(&config).unwrap_or_else(|e| fail(e));

    let progress = spinner(quiet, format!("Fetching {}", client.peers_url()));
    let result = client.fetch_graph().await;
    progress.finish_and_clear();

    let model = result.unwrap_or_else(|e| fail(format!("Fetch failed: {}", e)));
    emit(
        &model,
        args,
        config.min_peers,
        client.peers_url().as_str(),
        quiet,
    );
}

pub fn handle_parse(args: &ArgMatches) {
    let quiet = args.get_flag("quiet");
    let config = viewer_config_from_args(args);
    let file = args
        .get_one::<String>("FILE")
        .unwrap_or_else(|| fail("A report file is required"));
    let path = expand_path(file);

    let builder = TopologyBuilder::new().with_edge_policy(config.edge_policy);
    let model = load_report_file(&path, &builder).unwrap_or_else(|e| fail(e));

    emit(
        &model,
        args,
        config.min_peers,
        &path.display().to_string(),
        quiet,
    );
}

pub async fn handle_watch(args: &ArgMatches) {
    let mut config = viewer_config_from_args(args);
    if let Some(interval) = args.get_one::<u64>("interval") {
        config = config.with_poll_interval(Duration::from_secs(*interval));
    }

    let client = ControlClient::new(&config).unwrap_or_else(|e| fail(e));
    let control = client.peers_url().to_string();
    let min_peers = config.min_peers;

    let (handle, rx) = Poller::spawn(client, config.poll_interval);
    let trigger = handle.trigger();

    // The monitor owns the terminal and blocks, keep it off the runtime threads
    let result = tokio::task::spawn_blocking(move || {
        peerscope_tui::run_monitor(rx, trigger, control, min_peers)
    })
    .await;

    if let Err(e) = handle.shutdown().await {
        eprintln!("{} Poller did not stop cleanly: {}", "⚠".yellow().bold(), e);
    }

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => fail(format!("Error running TUI: {}", e)),
        Err(e) => fail(format!("TUI thread panicked: {}", e)),
    }
}

pub async fn handle_register(args: &ArgMatches) {
    init_tracing(args);

    let quiet = args.get_flag("quiet");
    let config = viewer_config_from_args(args);
    let peer = args
        .get_one::<Address>("ADDRESS")
        .cloned()
        .unwrap_or_else(|| fail("A peer address is required"));
    let client = ControlClient::new(&config).unwrap_or_else(|e| fail(e));

    let progress = spinner(quiet, format!("Registering {}", peer));
    let result = client.register_peer(&peer).await;
    progress.finish_and_clear();

    if let Err(e) = result {
        fail(format!("Registration failed: {}", e));
    }

    if !quiet {
        print_divider();
    }
    println!(
        "{} Registered {} with {}",
        "✓".green().bold(),
        peer.to_string().bright_white(),
        client.peers_url().as_str().cyan()
    );
    if !quiet {
        print_divider();
    }
}
