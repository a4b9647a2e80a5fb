//! Trace replay binary for SemLog.
//!
//! Feeds a recorded JSON-lines simulation trace (entities, poses, overlap
//! signals, frame ticks) through a [`SemanticLogger`] and writes the episode
//! logs the configured backend produces. Useful for regenerating logs from
//! a capture and for exercising the logger without a physics engine.
//!
//! # Startup Sequence
//!
//! 1. Parse command-line arguments
//! 2. Load configuration from the YAML file
//! 3. Initialize structured logging (tracing)
//! 4. Load the trace
//! 5. Replay until the trace ends or Ctrl-C arrives
//! 6. Log the finish summary
//!
//! [`SemanticLogger`]: semlog_core::SemanticLogger

mod replay;
mod scene;
mod trace;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use semlog_core::{LoggerConfig, LoggingConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::replay::Pacing;

/// Replay a recorded simulation trace through the semantic logger.
#[derive(Parser, Debug)]
#[command(name = "semlog-replay", version)]
struct Args {
    /// Logger configuration (YAML).
    #[arg(long, default_value = "semlog-config.yaml")]
    config: PathBuf,

    /// JSON-lines trace to replay.
    #[arg(long)]
    trace: PathBuf,

    /// Sleep between records so the replay runs at trace speed.
    #[arg(long)]
    realtime: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = LoggerConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    init_tracing(&config.logging);
    info!(
        config = %args.config.display(),
        trace = %args.trace.display(),
        backend = %config.writer.backend,
        "semlog-replay starting"
    );

    let records = trace::load(&args.trace)?;
    info!(records = records.len(), "trace loaded");

    let pacing = if args.realtime {
        Pacing::RealTime
    } else {
        Pacing::AsFastAsPossible
    };
    let summary = replay::run(config, records, pacing, tokio::signal::ctrl_c()).await?;

    info!(
        contacts = summary.contacts_published,
        supported_by = summary.supported_by_published,
        snapshots = summary.snapshots_written,
        skipped_cycles = summary.skipped_cycles,
        forced = summary.forced,
        "replay finished"
    );
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
