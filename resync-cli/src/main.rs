//! # resync
//!
//! CLI tool for exercising resync coordinators against a simulated
//! operation.
//!
//! ## Commands
//!
//! - `burst`: Fire invalidations at an invalidator and report the runs
//! - `values`: Submit a sequence of values and report which were processed
//!
//! ## Example
//!
//! ```bash
//! # Five invalidations while a 50ms run is in flight collapse into two runs
//! resync burst --invalidations 5 --run-ms 50
//!
//! # Values 1..=5: the operation sees 1 and 5
//! resync values --count 5 --run-ms 50 --json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resync_client::ResyncConfig;
use std::path::PathBuf;

mod commands;

use commands::{burst, values, Report};

/// CLI tool for exercising resync coordinators.
#[derive(Parser, Debug)]
#[command(name = "resync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML file with coordinator settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fire a burst of invalidations and report how many runs executed
    Burst {
        /// Number of invalidations to fire
        #[arg(long, short = 'n', default_value = "5")]
        invalidations: u32,

        /// Duration of each simulated run in milliseconds
        #[arg(long, default_value = "50")]
        run_ms: u64,

        /// Wait on every invalidation instead of only on the queue
        #[arg(long = "await")]
        wait: bool,
    },

    /// Submit values 1..=count and report which ones were processed
    Values {
        /// Number of values to submit
        #[arg(long, short = 'n', default_value = "5")]
        count: u64,

        /// Duration of each simulated run in milliseconds
        #[arg(long, default_value = "50")]
        run_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => ResyncConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ResyncConfig::default(),
    };
    tracing::debug!("Using config: {:?}", config);

    let report = match cli.command {
        Commands::Burst {
            invalidations,
            run_ms,
            wait,
        } => burst::run(&config, invalidations, run_ms, wait).await?,
        Commands::Values { count, run_ms } => values::run(&config, count, run_ms).await?,
    };

    print_report(&report, cli.json)
}

/// Log to stderr; `RUST_LOG` overrides the default level.
fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report).context("Failed to encode report")?;
        println!("{}", out);
        return Ok(());
    }

    println!("=== resync {} ===", report.command);
    println!("coordinator: {}", report.name);
    println!("requests: {}", report.stats.requests);
    println!("runs: {}", report.stats.runs_started);
    println!("coalesced: {}", report.stats.coalesced);
    if report.stats.runs_failed > 0 {
        println!("failed: {}", report.stats.runs_failed);
    }
    if let Some(processed) = &report.processed {
        println!("processed: {:?}", processed);
    }
    Ok(())
}
