//! Prism CLI - feed upload events into the image variant pipeline.
//!
//! The binary runs the pipeline against a local bucket directory: every file
//! under `<store.root>/<bucket>/` can be turned into an upload event, and the
//! variants, cache records and error log land next to it.
//!
//! # Usage
//!
//! ```bash
//! # Process every original under products/
//! prism process products/ --bucket shop
//!
//! # Replay a trigger payload
//! prism event upload.json
//!
//! # Build a srcset from a cache record
//! prism cache srcset 9f2c4b1a7d3e8f60 --format webp
//!
//! # View configuration
//! prism config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Prism - upload-triggered image variant pipeline.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "PRISM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Process originals from a local bucket directory
    Process(cli::process::ProcessArgs),

    /// Handle a single upload event read from a file or stdin
    Event(cli::event::EventArgs),

    /// Inspect cache records and resolve variant URLs
    Cache(cli::cache::CacheArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An explicit --config must load; the default location falls back.
    // Logging isn't initialized yet, so use eprintln for the warning.
    let config = match &cli.config {
        Some(path) => cli::load_config(path)?,
        None => match prism_core::Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `prism config path`."
                );
                prism_core::Config::default()
            }
        },
    };
    logging::init_from_config(&config.logging, cli.verbose, cli.json_logs);

    tracing::debug!("Prism v{}", prism_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Event(args) => cli::event::execute(args, config).await,
        Commands::Cache(args) => cli::cache::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, cli.config).await,
    }
}
