//! `authority`: drive, replay and verify authority-kernel runs.

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::CliResult;
use crate::output::OutputFormat;

/// Deterministic authority kernel
#[derive(Parser)]
#[command(name = "authority")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a claim feed through the kernel, one line per step
    Run {
        /// Kernel configuration (JSON or YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// JSONL feed, one `{"bundles": [...]}` object per step
        #[arg(short, long)]
        feed: PathBuf,

        /// Audit log; an existing log is resumed
        #[arg(short, long)]
        log: PathBuf,

        /// Effect destination (defaults to `<log>.effects.jsonl`)
        #[arg(short, long)]
        destination: Option<PathBuf>,
    },

    /// Replay a log against its frozen configuration
    Replay {
        /// Audit log
        #[arg(short, long)]
        log: PathBuf,

        /// JSON array of hex state hashes to compare against
        #[arg(short, long)]
        expected: Option<PathBuf>,
    },

    /// Verify the audit chain
    Verify {
        /// Audit log
        #[arg(short, long)]
        log: PathBuf,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run {
            config,
            feed,
            log,
            destination,
        } => commands::run::execute(&config, &feed, &log, destination.as_deref(), cli.output),
        Commands::Replay { log, expected } => {
            commands::replay::execute(&log, expected.as_deref(), cli.output)
        }
        Commands::Verify { log } => commands::verify::execute(&log, cli.output),
    }
}
