use crate::error::{PipelineError, Result};
use crate::limiter::ConcurrencyLimiter;
use crate::queue::{BoundedQueue, OverflowPolicy};
use crate::stats::RunStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Default periodic miss-count warning interval
pub const DEFAULT_MISS_WARN_EVERY: u64 = 5_000;
/// Default miss streak at which a consumer is declared starved
pub const DEFAULT_MISS_BEFORE_FATAL: u64 = 100_000;

/// Configuration surface for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of consumer threads
    pub jobs: usize,
    /// Target item count; 0 runs until interrupted
    pub target: u64,
    /// Producer pacing interval in milliseconds
    pub incoming_ms: u64,
    /// Per-item processing budget in milliseconds, passed through to the
    /// process collaborator
    pub outgoing_ms: u64,
    /// Queue capacity; 0 means unbounded
    pub capacity: usize,
    /// Queue warn threshold; defaults to 90% of capacity when unset
    pub warn_threshold: Option<usize>,
    /// Overflow policy applied when a push hits capacity
    pub policy: OverflowPolicy,
    /// Cap on concurrently executing work units; `None` disables the limiter
    pub limit: Option<usize>,
    /// Fixed sleep after each empty-queue observation
    pub miss_backoff: Duration,
    /// Surface a warning every this many consecutive misses
    pub miss_warn_every: u64,
    /// Declare the run starved after this many consecutive misses
    pub miss_before_fatal: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            target: 0,
            incoming_ms: 100,
            outgoing_ms: 100,
            capacity: 0,
            warn_threshold: None,
            policy: OverflowPolicy::Block,
            limit: None,
            miss_backoff: Duration::from_millis(1),
            miss_warn_every: DEFAULT_MISS_WARN_EVERY,
            miss_before_fatal: DEFAULT_MISS_BEFORE_FATAL,
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(PipelineError::Config("jobs must be at least 1".into()));
        }
        if self.incoming_ms == 0 || self.outgoing_ms == 0 {
            return Err(PipelineError::Config(
                "incoming_ms and outgoing_ms must be at least 1".into(),
            ));
        }
        if self.miss_before_fatal == 0 {
            return Err(PipelineError::Config(
                "miss_before_fatal must be at least 1".into(),
            ));
        }
        if self.limit == Some(0) {
            return Err(PipelineError::Config("limit must be at least 1".into()));
        }
        Ok(())
    }
}

/// One unit of payload plus its enqueue timestamp
#[derive(Debug)]
pub struct WorkItem<T> {
    pub payload: T,
    pub enqueued_at: Instant,
}

/// Final statistics of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub produced: u64,
    pub consumed: u64,
    pub failed: u64,
    pub max_backlog: usize,
    pub elapsed: Duration,
    /// 0 when the target was reached or the endless run drained cleanly,
    /// non-zero after an interrupt or fatal escalation
    pub exit_code: i32,
}

/// Drives one producer thread and a pool of consumer threads over a shared
/// bounded queue.
///
/// The driver is parameterized by two injected strategies rather than
/// subclassing: a produce strategy called once per pacing interval and a
/// process strategy invoked by whichever consumer wins the pop. Each call to
/// [`run`](Self::run) is a fresh run with fresh queue and limiter instances;
/// only the stats handle survives across runs so external interrupt wiring
/// stays valid.
pub struct PipelineDriver {
    config: PipelineConfig,
    stats: Arc<RunStats>,
}

impl PipelineDriver {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stats: Arc::new(RunStats::new()),
        })
    }

    /// Shared stats handle, also the stop handle for signal wiring:
    /// `stats.request_stop(code)` flips the running flag and lets the run
    /// drain to an orderly stop.
    pub fn stats(&self) -> Arc<RunStats> {
        Arc::clone(&self.stats)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run to completion.
    ///
    /// Blocks until every thread has joined. The omega statistics bracket is
    /// logged on every path out, fatal ones included. Returns the first
    /// error raised by any thread, or the final [`RunReport`].
    pub fn run<T, P, F>(&self, mut produce: P, process: F) -> Result<RunReport>
    where
        T: Send,
        P: FnMut() -> T + Send,
        F: Fn(T, Instant, u64) -> Result<i32> + Send + Sync,
    {
        if self.stats.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }

        let cfg = &self.config;
        let queue: BoundedQueue<WorkItem<T>> = match cfg.warn_threshold {
            Some(t) => BoundedQueue::with_warn_threshold("work", cfg.capacity, t, cfg.policy),
            None => BoundedQueue::new("work", cfg.capacity, cfg.policy),
        };
        let limiter = cfg.limit.map(ConcurrencyLimiter::new);

        let start = self
            .stats
            .alpha(cfg.jobs, cfg.target, cfg.incoming_ms, cfg.outgoing_ms);

        // consumers drain until the producer thread is done AND the queue is
        // empty, so an item pushed in the instant the stop flag flips is
        // never stranded
        let producer_active = AtomicBool::new(true);

        let mut failures: Vec<PipelineError> = Vec::new();
        let scope_result = crossbeam::thread::scope(|s| {
            let q = &queue;
            let lim = limiter.as_ref();
            let proc_ref = &process;
            let active = &producer_active;

            let producer = s.spawn(move |_| {
                let result = self.producer_loop(q, &mut produce);
                active.store(false, Ordering::SeqCst);
                result
            });
            let consumers: Vec<_> = (0..cfg.jobs)
                .map(|idx| s.spawn(move |_| self.consumer_loop(idx, q, active, lim, proc_ref)))
                .collect();

            match producer.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e),
                Err(_) => {
                    self.stats.request_stop(1);
                    failures.push(PipelineError::ThreadError("producer panicked".into()));
                }
            }
            // a panic unwinds past the store in the producer closure; clear
            // the flag here so consumers are not left polling out their full
            // miss budget against a dead producer
            producer_active.store(false, Ordering::SeqCst);
            for (idx, handle) in consumers.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => failures.push(e),
                    Err(_) => {
                        self.stats.request_stop(1);
                        failures.push(PipelineError::ThreadError(format!(
                            "consumer {idx} panicked"
                        )));
                    }
                }
            }
        });
        if scope_result.is_err() {
            failures.push(PipelineError::ThreadError("thread scope panicked".into()));
        }

        self.stats
            .omega(cfg.jobs, cfg.incoming_ms, cfg.outgoing_ms, start);
        self.stats.finish();

        if let Some(error) = failures.into_iter().next() {
            return Err(error);
        }
        Ok(RunReport {
            produced: self.stats.produced(),
            consumed: self.stats.consumed(),
            failed: self.stats.failed(),
            max_backlog: self.stats.max_backlog(),
            elapsed: start.elapsed(),
            exit_code: self.stats.exit_code(),
        })
    }

    fn producer_loop<T, P>(&self, queue: &BoundedQueue<WorkItem<T>>, produce: &mut P) -> Result<()>
    where
        T: Send,
        P: FnMut() -> T,
    {
        let cfg = &self.config;
        let stats = &self.stats;

        while stats.is_running() && (cfg.target == 0 || stats.produced() < cfg.target) {
            // pacing, not backpressure; chunked so an interrupt lands promptly
            self.paced_sleep(Duration::from_millis(cfg.incoming_ms));
            if !stats.is_running() {
                break;
            }

            let item = WorkItem {
                payload: produce(),
                enqueued_at: Instant::now(),
            };
            if queue.push(item).is_err() {
                // strict-reject overflow is fatal for the run: stop producing
                // and let the consumers drain what is already queued
                stats.request_stop(1);
                return Err(PipelineError::QueueFull(queue.label().to_string()));
            }
            let produced = stats.record_produced();
            trace!(produced, backlog = queue.len(), "produced item");
        }

        debug!(produced = stats.produced(), "producer loop done");
        Ok(())
    }

    fn consumer_loop<T, F>(
        &self,
        idx: usize,
        queue: &BoundedQueue<WorkItem<T>>,
        producer_active: &AtomicBool,
        limiter: Option<&ConcurrencyLimiter>,
        process: &F,
    ) -> Result<()>
    where
        T: Send,
        F: Fn(T, Instant, u64) -> Result<i32>,
    {
        let cfg = &self.config;
        let stats = &self.stats;
        let mut miss_streak: u64 = 0;
        let mut retired: u64 = 0;

        while (stats.is_running() || producer_active.load(Ordering::SeqCst) || !queue.is_empty())
            && (cfg.target == 0 || stats.consumed() < cfg.target)
        {
            let Some(item) = queue.try_pop() else {
                miss_streak += 1;
                if miss_streak % cfg.miss_warn_every == 0 {
                    warn!(consumer = idx, misses = miss_streak, "still no work");
                }
                if miss_streak >= cfg.miss_before_fatal {
                    // liveness guard: a consumer idle this long is wedged
                    // against a mis-wired or dead producer
                    stats.request_stop(1);
                    return Err(PipelineError::Starved {
                        consumer: idx,
                        misses: miss_streak,
                    });
                }
                thread::sleep(cfg.miss_backoff);
                continue;
            };

            miss_streak = 0;
            let outcome = {
                let _permit = limiter.map(ConcurrencyLimiter::acquire);
                process(item.payload, item.enqueued_at, cfg.outgoing_ms)
            };
            match outcome {
                Ok(code) => trace!(consumer = idx, code, "unit done"),
                Err(error) => {
                    // a failed unit is retired and counted, never fatal
                    stats.record_failed();
                    warn!(consumer = idx, %error, "unit failed");
                }
            }
            stats.record_consumed();
            retired += 1;
            stats.observe_backlog(queue.len());
        }

        debug!(consumer = idx, retired, "consumer loop done");
        Ok(())
    }

    /// Sleep `total` in short slices, returning early once the run stops
    fn paced_sleep(&self, total: Duration) {
        const SLICE: Duration = Duration::from_millis(50);
        let deadline = Instant::now() + total;
        while self.stats.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.jobs, 1);
        assert_eq!(cfg.target, 0);
        assert_eq!(cfg.incoming_ms, 100);
        assert_eq!(cfg.outgoing_ms, 100);
        assert_eq!(cfg.capacity, 0);
        assert_eq!(cfg.miss_warn_every, DEFAULT_MISS_WARN_EVERY);
        assert_eq!(cfg.miss_before_fatal, DEFAULT_MISS_BEFORE_FATAL);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let cfg = PipelineConfig {
            jobs: 0,
            ..Default::default()
        };
        assert!(matches!(
            PipelineDriver::new(cfg),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let cfg = PipelineConfig {
            incoming_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            PipelineDriver::new(cfg),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let cfg = PipelineConfig {
            limit: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            PipelineDriver::new(cfg),
            Err(PipelineError::Config(_))
        ));
    }
}
