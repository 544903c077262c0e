use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::info;

/// Shared per-run counters plus the cooperative shutdown flag.
///
/// One instance is shared by every thread of a pipeline run. Counters are
/// monotonic within a run and reset by the alpha bracket; `running` is the
/// only cancellation mechanism and is observed at the top of each loop
/// iteration, never preempting in-flight work.
#[derive(Debug, Default)]
pub struct RunStats {
    produced: AtomicU64,
    consumed: AtomicU64,
    failed: AtomicU64,
    max_backlog: AtomicUsize,
    running: AtomicBool,
    exit_code: AtomicI32,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&self) {
        self.produced.store(0, Ordering::SeqCst);
        self.consumed.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.max_backlog.store(0, Ordering::SeqCst);
        self.exit_code.store(0, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn record_produced(&self) -> u64 {
        self.produced.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_consumed(&self) -> u64 {
        self.consumed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Fold a backlog observation into the run maximum
    pub fn observe_backlog(&self, backlog: usize) {
        self.max_backlog.fetch_max(backlog, Ordering::SeqCst);
    }

    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn max_backlog(&self) -> usize {
        self.max_backlog.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// Request an orderly shutdown: the producer stops, consumers drain.
    ///
    /// The first non-zero exit code wins; later requests keep it.
    pub fn request_stop(&self, code: i32) {
        let _ = self
            .exit_code
            .compare_exchange(0, code, Ordering::SeqCst, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    pub(crate) fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Start-of-run bracket: reset counters, raise the running flag and log
    /// the expected throughput for later comparison against `omega`.
    ///
    /// Expected rates use the same integer arithmetic as the observed-rate
    /// computation: `1000 / incoming_ms` units/s on the producer side and
    /// `(1000 / outgoing_ms) * jobs` units/s across the consumers. Intervals
    /// are clamped to at least 1 ms for the rate math.
    pub fn alpha(&self, jobs: usize, target: u64, incoming_ms: u64, outgoing_ms: u64) -> Instant {
        self.reset();
        self.running.store(true, Ordering::SeqCst);

        let expected_in = 1000 / incoming_ms.max(1);
        let expected_out = (1000 / outgoing_ms.max(1)) * jobs as u64;
        if target > 0 {
            let floor_rate = expected_in.min(expected_out).max(1);
            info!(
                jobs,
                target,
                incoming_ms,
                outgoing_ms,
                expected_in_rate = expected_in,
                expected_out_rate = expected_out,
                expected_run_s = target / floor_rate,
                "alpha"
            );
        } else {
            info!(
                jobs,
                incoming_ms,
                outgoing_ms,
                expected_in_rate = expected_in,
                expected_out_rate = expected_out,
                "alpha: endless run"
            );
        }
        Instant::now()
    }

    /// End-of-run bracket: log elapsed time and actual vs expected counts.
    ///
    /// Purely observational; logged on every termination path, fatal ones
    /// included, so a failed run still leaves its throughput trace behind.
    pub fn omega(&self, jobs: usize, incoming_ms: u64, outgoing_ms: u64, start: Instant) {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let expected_in = elapsed_ms / incoming_ms.max(1);
        let expected_out = (elapsed_ms / outgoing_ms.max(1)) * jobs as u64;
        info!(
            elapsed_s = elapsed_ms / 1000,
            produced = self.produced(),
            expected_produced = expected_in,
            consumed = self.consumed(),
            expected_consumed = expected_out,
            failed = self.failed(),
            max_backlog = self.max_backlog(),
            exit_code = self.exit_code(),
            "omega"
        );
    }
}
