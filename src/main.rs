mod cli;
mod error;
mod flake;
mod github;
mod registry;
mod runner;
mod workflow;

use clap::Parser;
use cli::Cli;
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = Cli::parse();

    // RUST_LOG overrides; --verbose turns on debug logging of every
    // subprocess and HTTP request. Logs go to stderr so annotation lines on
    // stdout stay machine-readable.
    let default_filter = if cli.verbose { "repin=debug" } else { "repin=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (mode, rest) = workflow::resolve_command(cli.command);
    let result = workflow::execute(mode, &cli.dir, &cli.attrs, rest);

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
