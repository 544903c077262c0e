use parking_lot::{Condvar, Mutex};

/// A counting semaphore bounding how many work units execute in parallel.
///
/// The limiter is independent of both thread count and queue depth: the
/// driver may oversubscribe consumer threads while permits cap the true
/// degree of concurrent execution. Permits are handed out as RAII guards,
/// so release happens on every exit path including panics.
pub struct ConcurrencyLimiter {
    permits: Mutex<usize>,
    available: Condvar,
    max: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter with `n` permits
    pub fn new(n: usize) -> Self {
        Self {
            permits: Mutex::new(n),
            available: Condvar::new(),
            max: n,
        }
    }

    /// Block until a permit is free, then take it
    pub fn acquire(&self) -> Permit<'_> {
        let mut count = self.permits.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
        Permit { limiter: self }
    }

    /// Take a permit without blocking, or `None` if all are in use
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut count = self.permits.lock();
        if *count == 0 {
            return None;
        }
        *count -= 1;
        Some(Permit { limiter: self })
    }

    /// Permits not currently held (advisory snapshot)
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }

    /// Total permits this limiter was created with
    pub fn max_permits(&self) -> usize {
        self.max
    }

    fn release(&self) {
        let mut count = self.permits.lock();
        *count += 1;
        drop(count);
        self.available.notify_one();
    }
}

/// An acquired permit; returns itself to the limiter and wakes one waiter on drop
#[must_use = "dropping the permit immediately releases it"]
pub struct Permit<'a> {
    limiter: &'a ConcurrencyLimiter,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_acquire_release() {
        let limiter = ConcurrencyLimiter::new(2);
        let p1 = limiter.acquire();
        let p2 = limiter.acquire();
        assert_eq!(limiter.available(), 0);
        assert!(limiter.try_acquire().is_none());
        drop(p1);
        assert_eq!(limiter.available(), 1);
        drop(p2);
        assert_eq!(limiter.available(), 2);
    }

    #[test]
    fn test_concurrency_never_exceeds_permits() {
        const PERMITS: usize = 3;
        const THREADS: usize = 12;

        let limiter = Arc::new(ConcurrencyLimiter::new(PERMITS));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _permit = limiter.acquire();
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(200));
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= PERMITS);
        assert_eq!(limiter.available(), PERMITS);
    }

    #[test]
    fn test_permit_released_on_panic() {
        let limiter = ConcurrencyLimiter::new(1);
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _permit = limiter.acquire();
            panic!("work blew up");
        }));
        assert!(result.is_err());
        // the guard released on unwind, so the permit is usable again
        assert_eq!(limiter.available(), 1);
        let _permit = limiter.acquire();
    }
}
