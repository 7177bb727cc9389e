use clap::ArgMatches;
use commands::command_argument_builder;
use peerscope::handlers::{
    handle_fetch, handle_parse, handle_register, handle_watch, print_banner, stdout_is_report,
};

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();

    if show_banner(&chosen_command) {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    match chosen_command.subcommand() {
        Some(("fetch", primary_command)) => handle_fetch(primary_command).await,
        Some(("parse", primary_command)) => handle_parse(primary_command),
        Some(("watch", primary_command)) => handle_watch(primary_command).await,
        Some(("register", primary_command)) => handle_register(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

/// The banner is skipped under `--quiet`, in the live view, and whenever
/// stdout carries a JSON or DOT report.
fn show_banner(matches: &ArgMatches) -> bool {
    match matches.subcommand() {
        Some((_, sub)) if sub.get_flag("quiet") => false,
        Some(("watch", _)) => false,
        Some(("fetch" | "parse", sub)) => !stdout_is_report(
            sub.get_one::<String>("format").map(String::as_str),
            sub.get_one::<String>("output").map(String::as_str),
        ),
        _ => !matches.get_flag("quiet"),
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
