//! Voyage CLI - Command line tool for the voyage travel data layer.
//!
//! Commands:
//! - `voyage config` - Manage configuration
//! - `voyage fetch` - Run one data binding and print its result
//! - `voyage search` - Replay keystrokes through the search orchestrator

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use voyage_observability::{init_logging, LogLevel};

use commands::{ConfigArgs, FetchArgs, SearchArgs};

/// Voyage CLI - Query the travel data layer through its cache
#[derive(Parser)]
#[command(name = "voyage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigArgs),

    /// Fetch a resource through the cache
    Fetch(FetchArgs),

    /// Replay keystrokes through the search orchestrator
    Search(SearchArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Fetch(_) => "fetch",
            Self::Search(_) => "search",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);

    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    let mut logging = ctx.config.logging.clone();
    if cli.verbose && logging.level > LogLevel::Debug {
        logging.level = LogLevel::Debug;
    }
    if let Err(e) = init_logging(&logging) {
        ctx.output.warn(&e.to_string());
    }

    tracing::debug!(command = cli.command.name(), json = cli.json, "dispatching command");
    let result = match cli.command {
        Commands::Config(args) => commands::config::run(args, &ctx).await,
        Commands::Fetch(args) => commands::fetch::run(args, &ctx).await,
        Commands::Search(args) => commands::search::run(args, &ctx).await,
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "command failed");
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
