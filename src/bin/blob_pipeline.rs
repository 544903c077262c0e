//! Demo binary: drive the pipeline with the synthetic blob workload.
//!
//! Runs until the target blob count is reached (exit 0) or an operator
//! interrupt drains the run early (exit 1).

use blob_pipeline::workload::{process_blob, BlobProducer};
use blob_pipeline::{OverflowPolicy, PipelineConfig, PipelineDriver};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "blob-pipeline")]
#[command(about = "Bounded producer/consumer pipeline over a synthetic blob workload")]
struct Cli {
    /// Number of consumer threads
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Number of blobs to process (0 = endless, run until interrupted)
    #[arg(long, default_value_t = 0)]
    blobs: u64,

    /// Producer pacing interval in milliseconds
    #[arg(long, default_value_t = 100)]
    inms: u64,

    /// Per-blob processing budget in milliseconds
    #[arg(long, default_value_t = 100)]
    outms: u64,

    /// Enable deep logging
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Queue capacity (0 = unbounded)
    #[arg(long, default_value_t = 0)]
    capacity: usize,

    /// Queue warn threshold; defaults to 90% of capacity
    #[arg(long)]
    warn_threshold: Option<usize>,

    /// Overflow policy applied when a push hits capacity
    #[arg(long, value_enum, default_value_t = PolicyArg::Block)]
    policy: PolicyArg,

    /// Cap on concurrently executing blobs (unset = no limiter)
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Block,
    DropOldest,
    Reject,
}

impl From<PolicyArg> for OverflowPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Block => OverflowPolicy::Block,
            PolicyArg::DropOldest => OverflowPolicy::DropOldest,
            PolicyArg::Reject => OverflowPolicy::Reject,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = PipelineConfig {
        jobs: cli.jobs,
        target: cli.blobs,
        incoming_ms: cli.inms,
        outgoing_ms: cli.outms,
        capacity: cli.capacity,
        warn_threshold: cli.warn_threshold,
        policy: cli.policy.into(),
        limit: cli.limit,
        ..Default::default()
    };

    let driver = match PipelineDriver::new(config) {
        Ok(driver) => driver,
        Err(e) => {
            error!(%e, "invalid configuration");
            std::process::exit(2);
        }
    };

    let stop = driver.stats();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\ncaught termination signal, draining");
        stop.request_stop(1);
    }) {
        error!(%e, "failed to install signal handler");
        std::process::exit(2);
    }

    let mut producer = BlobProducer::new();
    match driver.run(move || producer.next_blob(), process_blob) {
        Ok(report) => {
            info!(
                produced = report.produced,
                consumed = report.consumed,
                failed = report.failed,
                max_backlog = report.max_backlog,
                elapsed_s = report.elapsed.as_secs(),
                "run stopped"
            );
            std::process::exit(report.exit_code);
        }
        Err(e) => {
            error!(%e, "run failed");
            std::process::exit(driver.stats().exit_code().max(1));
        }
    }
}
