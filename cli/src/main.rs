//! # narrow CLI
//!
//! Command-line host for narrow - asynchronous incremental filtering for a
//! fuzzy finder.
//!
//! ## Usage
//!
//! - `narrow serve` - Drive finder sessions over stdio (JSON lines)
//! - `narrow run <query>` - Run one query and print the results
//! - `narrow args <query>` - Show the worker command a query would run
//!
//! stdout is reserved for results; logs go to stderr or to `--log`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod options;
mod output;

use commands::{args_command, run_command, serve_command};
use config::{expand_path, CliConfigLoader};
use options::SessionArgs;

/// narrow - Asynchronous incremental filtering for fuzzy finders
#[derive(Parser)]
#[command(name = "narrow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Asynchronous incremental filtering for fuzzy finders")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Matching worker executable override
    #[arg(long, global = true, env = "NARROW_WORKER")]
    worker: Option<String>,

    /// Typing debounce window override, in milliseconds
    #[arg(long, global = true)]
    debounce_ms: Option<u64>,

    /// Ask the worker to run in parallel
    #[arg(long, global = true)]
    par_run: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve sessions over stdin/stdout
    Serve,

    /// Run a single query and print the results
    Run {
        /// The query to filter with
        query: String,

        #[command(flatten)]
        session: SessionArgs,

        /// Print the final batch as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the worker command line for a query
    Args {
        /// The query to filter with
        query: String,

        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new().with_par_run(cli.par_run);

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    if let Some(worker) = &cli.worker {
        loader = loader.with_worker_override(worker.clone());
    }

    if let Some(debounce_ms) = cli.debounce_ms {
        loader = loader.with_debounce_override(debounce_ms);
    }

    loader
}

/// Initialize tracing on stderr, or on the log file if given
fn init_tracing(verbose: bool, log: Option<&PathBuf>) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    match log {
        Some(path) => {
            let path = expand_path(path);
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log.as_ref())?;

    // Build configuration loader
    let config_loader = build_config_loader(&cli);

    match cli.command {
        Commands::Serve => serve_command(config_loader).await,
        Commands::Run {
            query,
            session,
            json,
        } => run_command(query, session, json, config_loader).await,
        Commands::Args { query, session } => args_command(query, session, config_loader).await,
    }
}
