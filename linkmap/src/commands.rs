use crate::CLAP_STYLING;
use clap::{Arg, arg, command};
use url::Url;

/// Flags shared by every subcommand that ends in a graph analysis
fn analysis_args() -> Vec<Arg> {
    vec![
        arg!(--"top" <N>)
            .required(false)
            .help("Number of most important pages to list")
            .value_parser(clap::value_parser!(usize))
            .default_value("10"),
        arg!(--"max-iterations" <N>)
            .required(false)
            .help("Iteration cap for the importance ranking (default: from config)")
            .value_parser(clap::value_parser!(usize)),
        arg!(--"time-limit" <MS>)
            .required(false)
            .help("Stop ranking and cycle detection after MS milliseconds")
            .value_parser(clap::value_parser!(u64)),
        arg!(--"cycles")
            .required(false)
            .help("Report link cycles")
            .action(clap::ArgAction::SetTrue),
        arg!(--"max-cycle-length" <N>)
            .required(false)
            .help("Longest cycle to report, in pages (default: from config)")
            .value_parser(clap::value_parser!(usize)),
        arg!(--"path" <URL>)
            .required(false)
            .help("Shortest link path between two pages: --path FROM TO")
            .num_args(2)
            .value_names(["FROM", "TO"]),
        arg!(--"stats")
            .required(false)
            .help("Report structural statistics of the link graph")
            .action(clap::ArgAction::SetTrue),
        arg!(--"export" <FORMAT>)
            .required(false)
            .help("Export the graph: json, dot, csv or adjacency")
            .value_parser(["json", "dot", "csv", "adjacency"]),
        arg!(--"min-importance" <SCORE>)
            .required(false)
            .help("Leave pages ranked below SCORE out of the export")
            .value_parser(clap::value_parser!(f64)),
        arg!(--"include-metadata")
            .required(false)
            .help("Include anchor text, link context and page metadata in the output")
            .action(clap::ArgAction::SetTrue),
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Write the export to a file (default: print to screen)")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
        arg!(-c --"config" <PATH>)
            .required(false)
            .help("JSON file with engine settings")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
    ]
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("linkmap")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("linkmap")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a host or collection of hosts and analyze the link graph they form.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The URL to crawl")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs to crawl")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of async worker 'threads' in the worker pool.")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Maximum link depth to crawl from each seed")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"max-pages" <N>)
                        .required(false)
                        .help("Stop fetching after N pages per seed")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"auto-follow")
                        .required(false)
                        .help("Fetch cross-domain pages too (default: record but do not fetch them)")
                        .action(clap::ArgAction::SetTrue),
                )
                .args(analysis_args()),
        )
        .subcommand(
            command!("analyze")
                .about("Analyze a link graph loaded from an edge list file.")
                .arg(
                    arg!(-e --"edges" <PATH>)
                        .required(true)
                        .help(
                            "File with one link per line: source<TAB or comma>target[<sep>anchor]",
                        )
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .args(analysis_args()),
        )
}
