//! Zangetsu Data CLI - one interface to Postgres, BigQuery, DuckDB and Google Sheets

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod context;

use cli::Cli;
use commands::{exec, info, query, render, run, schema, tables, transaction};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match &cli.command {
        cli::Commands::Render(args) => render::execute(args, &cli.global),
        cli::Commands::Query(args) => query::execute(args, &cli.global),
        cli::Commands::Exec(args) => exec::execute(args, &cli.global),
        cli::Commands::Run(args) => run::execute(args, &cli.global),
        cli::Commands::Tables => tables::execute(&cli.global),
        cli::Commands::Schema(args) => schema::execute(args, &cli.global),
        cli::Commands::Transaction(args) => transaction::execute(args, &cli.global),
        cli::Commands::Info => info::execute(&cli.global),
    }
}

/// Log to stderr. `RUST_LOG` overrides the level; `log` records from the
/// library crates are forwarded through the subscriber's log bridge.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
