//! A bounded producer/consumer pipeline: one producer thread feeds a
//! thread-safe FIFO work queue drained by N consumer workers, instrumented
//! with throughput statistics and guarded against queue overflow and
//! consumer starvation.
//!
//! # Features
//!
//! - Bounded FIFO queue with configurable overflow policy (block,
//!   drop-oldest, strict-reject) and a near-capacity warn threshold
//! - Counting-semaphore concurrency limiter with RAII permits, decoupling
//!   degree of parallelism from queue depth
//! - Driver parameterized by injected produce/process strategies, owning
//!   thread lifecycle, orderly draining and join
//! - Miss-counting consumer backoff that escalates a sustained starvation
//!   streak into a fatal, run-terminating error
//! - Alpha/omega statistics brackets comparing expected against observed
//!   throughput
//!
//! # Example
//!
//! ```no_run
//! use blob_pipeline::{PipelineConfig, PipelineDriver};
//!
//! let driver = PipelineDriver::new(PipelineConfig {
//!     jobs: 2,
//!     target: 10,
//!     incoming_ms: 5,
//!     outgoing_ms: 1,
//!     ..Default::default()
//! })?;
//!
//! let mut next_id = 0u64;
//! let report = driver.run(
//!     move || {
//!         next_id += 1;
//!         next_id
//!     },
//!     |_item, _enqueued_at, _budget_ms| Ok(0),
//! )?;
//! assert_eq!(report.consumed, 10);
//! # Ok::<(), blob_pipeline::PipelineError>(())
//! ```

pub mod driver;
pub mod error;
pub mod limiter;
pub mod queue;
pub mod stats;
pub mod workload;

// Re-exports for convenience
pub use driver::{PipelineConfig, PipelineDriver, RunReport, WorkItem};
pub use error::{PipelineError, Result};
pub use limiter::{ConcurrencyLimiter, Permit};
pub use queue::{BoundedQueue, OverflowPolicy};
pub use stats::RunStats;
