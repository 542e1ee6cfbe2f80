//! ISS position tracker binary.
//!
//! Polls the ISS position API into the document store, replicates the stored samples into
//! the relational store and benchmarks queries against both.

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use iss_config::shared::IssConfig;
use iss_telemetry::tracing::init_tracing;
use tracing::{error, info, warn};

use crate::benchmark::report::{render_index_impact, render_stats, render_summary};
use crate::benchmark::run_benchmark;
use crate::config::{apply_poll_overrides, load_replicator_config};
use crate::core::{run_combined, run_migrate, run_poll};
use crate::error::{ReplicatorError, ReplicatorResult};

mod benchmark;
mod config;
mod core;
mod error;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the current position repeatedly and store every sample in the document store
    Poll(PollArgs),
    /// Copy the stored samples missing from the relational store
    Migrate,
    /// Poll, then migrate
    Run(PollArgs),
    /// Time the same queries against both stores
    Benchmark,
}

#[derive(Args, Debug)]
struct PollArgs {
    /// Number of iterations, overrides the configured value
    #[arg(long)]
    iterations: Option<u32>,
    /// Pause between iterations in milliseconds, overrides the configured value
    #[arg(long)]
    interval_ms: Option<u64>,
}

/// Entry point of the binary.
///
/// Failures are logged, rendered to stderr and turned into a non-zero exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> ReplicatorResult<()> {
    let mut config = load_replicator_config()?;
    if let Command::Poll(args) | Command::Run(args) = &cli.command {
        apply_poll_overrides(&mut config.poll, args.iterations, args.interval_ms)?;
    }

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(ReplicatorError::config)?;

    // Every call is awaited in sequence, so a single thread is enough.
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli.command, config))
}

async fn async_main(command: Command, config: IssConfig) -> ReplicatorResult<()> {
    match command {
        Command::Poll(_) => {
            let report = run_poll(&config).await?;
            info!(
                succeeded = report.succeeded,
                failed = report.failed,
                "poll completed"
            );
        }
        Command::Migrate => {
            let report = run_migrate(&config).await?;
            log_replication_report(&report);
        }
        Command::Run(_) => {
            let (poll_report, replication_report) = run_combined(&config).await?;
            info!(
                succeeded = poll_report.succeeded,
                failed = poll_report.failed,
                "poll completed"
            );
            log_replication_report(&replication_report);
        }
        Command::Benchmark => {
            let results = run_benchmark(&config).await?;
            println!(
                "{}",
                render_stats(&results.document_stats, &results.relational_stats)
            );
            println!("{}", render_summary(&results.comparisons));
            println!("{}", render_index_impact(&results.index_impact));
        }
    }

    Ok(())
}

fn log_replication_report(report: &iss::types::ReplicationReport) {
    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        failed = report.failed.len(),
        total = report.total(),
        "migration completed"
    );

    if report.has_failures() {
        for failed in &report.failed {
            warn!(
                source_id = %failed.id,
                error_kind = ?failed.error.kind(),
                "reading was not migrated, the next run will retry it"
            );
        }
    }
}
