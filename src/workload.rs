//! Synthetic demo workload: blob payloads, a uniform-id producer and a
//! CPU-burning process collaborator.
//!
//! Nothing here is required by the pipeline core; these are the pluggable
//! collaborators the demo binary injects into the driver.

use crate::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::debug;

const BLOB_DATA_LEN: usize = 1024;
const BLOB_ID_MAX: i32 = 6666;

/// An opaque synthetic payload: an identifier plus two zero-filled buffers
/// that give the item realistic memory weight
#[derive(Debug)]
pub struct Blob {
    pub id: i32,
    data: Vec<i32>,
    aux: Vec<i32>,
}

impl Blob {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            data: vec![0; BLOB_DATA_LEN],
            aux: vec![0; BLOB_DATA_LEN * 2],
        }
    }

    /// Checksum over the payload buffers
    pub fn sum(&self) -> i64 {
        self.data
            .iter()
            .chain(self.aux.iter())
            .map(|&v| v as i64)
            .sum()
    }
}

/// Produce collaborator: one blob per call with a uniformly distributed id
#[derive(Debug)]
pub struct BlobProducer {
    rng: StdRng,
}

impl BlobProducer {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic producer for tests and benches
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_blob(&mut self) -> Blob {
        Blob::new(self.rng.gen_range(1..=BLOB_ID_MAX))
    }
}

impl Default for BlobProducer {
    fn default() -> Self {
        Self::new()
    }
}

/// Naive recursive Fibonacci, deliberately inefficient busy-work
pub fn fib(n: u64) -> u64 {
    if n < 2 {
        n
    } else {
        fib(n - 1) + fib(n - 2)
    }
}

/// Process collaborator: burn CPU on the blob until the outgoing budget
/// elapses, then report the checksum.
///
/// Logs item lifetime (enqueue to completion) and pure work time at debug
/// level for the throughput traces.
pub fn process_blob(blob: Blob, enqueued_at: Instant, budget_ms: u64) -> Result<i32> {
    let started = Instant::now();
    let mut sum: i64 = 0;
    let mut loops: u32 = 0;

    loop {
        sum = sum.wrapping_add(blob.sum().wrapping_add(fib((blob.id % 40) as u64) as i64));
        loops += 1;
        if started.elapsed().as_millis() as u64 >= budget_ms {
            break;
        }
    }

    debug!(
        id = blob.id,
        sum,
        loops,
        life_ms = enqueued_at.elapsed().as_millis() as u64,
        work_ms = started.elapsed().as_millis() as u64,
        "blob processed"
    );
    Ok((sum & i32::MAX as i64) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fib_small_values() {
        assert_eq!(fib(0), 0);
        assert_eq!(fib(1), 1);
        assert_eq!(fib(10), 55);
        assert_eq!(fib(20), 6765);
    }

    #[test]
    fn test_blob_checksum_of_zero_fill() {
        let blob = Blob::new(42);
        assert_eq!(blob.sum(), 0);
        assert_eq!(blob.id, 42);
    }

    #[test]
    fn test_seeded_producer_is_deterministic() {
        let mut a = BlobProducer::with_seed(7);
        let mut b = BlobProducer::with_seed(7);
        for _ in 0..100 {
            let (x, y) = (a.next_blob(), b.next_blob());
            assert_eq!(x.id, y.id);
            assert!((1..=BLOB_ID_MAX).contains(&x.id));
        }
    }

    #[test]
    fn test_process_blob_respects_budget() {
        // small id keeps a single fib iteration cheap, so the budget governs
        let blob = Blob::new(5);
        let start = Instant::now();
        let code = process_blob(blob, Instant::now(), 5).unwrap();
        assert!(start.elapsed().as_millis() >= 5);
        assert!(code >= 0);
    }
}
