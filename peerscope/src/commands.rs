use crate::CLAP_STYLING;
use clap::{arg, command};
use peerscope::handlers::parse_peer_address;
use peerscope_core::config::DEFAULT_CONTROL_URL;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("peerscope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("peerscope")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Show client logs on stderr")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-c --"control" <URL>)
                .required(false)
                .help("Base URL of the gossip control node")
                .env("PEERSCOPE_CONTROL")
                .value_parser(clap::value_parser!(Url))
                .default_value(DEFAULT_CONTROL_URL)
                .global(true),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Request timeout in seconds")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("10")
                .global(true),
        )
        .arg(
            arg!(--"min-peers" <COUNT>)
                .required(false)
                .help("Flag nodes with fewer distinct peers than this")
                .value_parser(clap::value_parser!(usize))
                .default_value("3")
                .global(true),
        )
        .arg(
            arg!(--"undirected")
                .required(false)
                .help("Skip an edge when its reverse was already recorded")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("fetch")
                .about("Fetch the current topology from the control node and print it")
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, dot")
                        .value_parser(["text", "json", "dot"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                ),
        )
        .subcommand(
            command!("parse")
                .about("Build the topology from a saved /peers response")
                .arg(
                    arg!(<FILE>)
                        .required(true)
                        .help("Path to a JSON topology report"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, dot")
                        .value_parser(["text", "json", "dot"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                ),
        )
        .subcommand(
            command!("watch")
                .about("Live view of the topology, refreshed on an interval")
                .arg(
                    arg!(-i --"interval" <SECONDS>)
                        .required(false)
                        .help("Seconds between automatic refreshes")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("60"),
                ),
        )
        .subcommand(
            command!("register")
                .about("Ask the control node to adopt a new peer")
                .arg(
                    arg!(<ADDRESS>)
                        .required(true)
                        .help("Peer address as HOST:PORT")
                        .value_parser(parse_peer_address),
                ),
        )
}
