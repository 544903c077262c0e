use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Determines how the queue should handle a push at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Suspend the pushing thread until space is available
    Block,
    /// Evict the current head to make space for the new tail
    DropOldest,
    /// Refuse the push and hand the item back to the caller
    Reject,
}

struct Shared<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    warn_threshold: usize,
    policy: OverflowPolicy,
    label: String,
    dropped: AtomicU64,
    rejected: AtomicU64,
}

/// A bounded FIFO work queue shared between one producer and N consumers.
///
/// All mutation happens inside a single critical section per queue instance,
/// so no thread ever observes a torn intermediate state. A `capacity` of 0
/// means unbounded; the overflow policy only engages when `capacity > 0`.
pub struct BoundedQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BoundedQueue<T> {
    /// Create a queue with the default warn threshold (90% of capacity)
    pub fn new(label: impl Into<String>, capacity: usize, policy: OverflowPolicy) -> Self {
        let warn_threshold = if capacity > 0 {
            (capacity * 9 / 10).max(1)
        } else {
            0
        };
        Self::with_warn_threshold(label, capacity, warn_threshold, policy)
    }

    /// Create a queue with an explicit warn threshold (0 disables the warning)
    pub fn with_warn_threshold(
        label: impl Into<String>,
        capacity: usize,
        warn_threshold: usize,
        policy: OverflowPolicy,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                items: Mutex::new(VecDeque::new()),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
                warn_threshold,
                policy,
                label: label.into(),
                dropped: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
            }),
        }
    }

    /// Insert an item at the tail.
    ///
    /// Always succeeds when the queue is unbounded or below capacity. At
    /// capacity the overflow policy decides: `Block` waits for space,
    /// `DropOldest` evicts the head, `Reject` returns the item back so the
    /// producer can retry or abort.
    pub fn push(&self, item: T) -> Result<(), T> {
        let s = &*self.shared;
        let mut items = s.items.lock();

        if s.warn_threshold > 0 && items.len() >= s.warn_threshold {
            warn!(
                queue = %s.label,
                backlog = items.len(),
                capacity = s.capacity,
                "queue nearing capacity"
            );
        }

        if s.capacity > 0 && items.len() >= s.capacity {
            match s.policy {
                OverflowPolicy::Reject => {
                    s.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(queue = %s.label, capacity = s.capacity, "push rejected, queue full");
                    return Err(item);
                }
                OverflowPolicy::DropOldest => {
                    items.pop_front();
                    s.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(queue = %s.label, capacity = s.capacity, "evicted oldest item");
                }
                OverflowPolicy::Block => {
                    while items.len() >= s.capacity {
                        s.not_full.wait(&mut items);
                    }
                }
            }
        }

        items.push_back(item);
        drop(items);
        s.not_empty.notify_one();
        Ok(())
    }

    /// Remove and return the head, or `None` immediately if the queue is empty.
    ///
    /// This is the polling variant used by miss-counting consumers; the
    /// caller decides how to back off after a miss.
    pub fn try_pop(&self) -> Option<T> {
        let mut items = self.shared.items.lock();
        let item = items.pop_front();
        drop(items);
        if item.is_some() {
            self.shared.not_full.notify_one();
        }
        item
    }

    /// Remove and return the head, suspending until an item is available.
    ///
    /// Wakes deterministically on the next push.
    pub fn pop_wait(&self) -> T {
        let mut items = self.shared.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                drop(items);
                self.shared.not_full.notify_one();
                return item;
            }
            self.shared.not_empty.wait(&mut items);
        }
    }

    /// Point-in-time snapshot of the queue depth (advisory only)
    pub fn len(&self) -> usize {
        self.shared.items.lock().len()
    }

    /// Point-in-time emptiness snapshot (advisory only)
    pub fn is_empty(&self) -> bool {
        self.shared.items.lock().is_empty()
    }

    /// Configured capacity, 0 meaning unbounded
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Overflow policy applied when a push hits capacity
    pub fn policy(&self) -> OverflowPolicy {
        self.shared.policy
    }

    /// Diagnostics label
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Number of items evicted under `DropOldest`
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Number of pushes refused under `Reject`
    pub fn rejected_count(&self) -> u64 {
        self.shared.rejected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_push_pop_fifo() {
        let queue = BoundedQueue::new("fifo", 0, OverflowPolicy::Block);
        for i in 0..10 {
            queue.push(i).unwrap();
        }
        for i in 0..10 {
            assert_eq!(queue.try_pop(), Some(i));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_unbounded_never_overflows() {
        let queue = BoundedQueue::new("unbounded", 0, OverflowPolicy::Reject);
        for i in 0..10_000 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.len(), 10_000);
    }

    #[test]
    fn test_drop_oldest_contents() {
        // capacity 3, push 1..=5 with no pops: head evictions leave [3, 4, 5]
        let queue = BoundedQueue::new("drop", 3, OverflowPolicy::DropOldest);
        for i in 1..=5 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped_count(), 2);
        assert_eq!(queue.try_pop(), Some(3));
        assert_eq!(queue.try_pop(), Some(4));
        assert_eq!(queue.try_pop(), Some(5));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_drop_oldest_capacity_invariant() {
        let queue = BoundedQueue::new("cap", 4, OverflowPolicy::DropOldest);
        for i in 0..100 {
            queue.push(i).unwrap();
            assert!(queue.len() <= 4);
        }
    }

    #[test]
    fn test_reject_hands_item_back() {
        let queue = BoundedQueue::new("strict", 3, OverflowPolicy::Reject);
        for i in 1..=3 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.push(4), Err(4));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.rejected_count(), 1);
        // state stays consistent: a pop makes room for the retry
        assert_eq!(queue.try_pop(), Some(1));
        assert!(queue.push(4).is_ok());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_construction_metadata() {
        let queue: BoundedQueue<i32> = BoundedQueue::new("meta", 42, OverflowPolicy::DropOldest);
        assert_eq!(queue.capacity(), 42);
        assert_eq!(queue.policy(), OverflowPolicy::DropOldest);
        assert_eq!(queue.label(), "meta");
        assert_eq!(queue.dropped_count(), 0);
        assert_eq!(queue.rejected_count(), 0);
    }

    #[test]
    fn test_pop_wait_wakes_on_push() {
        let queue = BoundedQueue::new("blocking", 0, OverflowPolicy::Block);
        let q = queue.clone();
        let handle = thread::spawn(move || q.pop_wait());
        thread::sleep(Duration::from_millis(20));
        queue.push(7usize).unwrap();
        assert_eq!(handle.join().unwrap(), 7);
    }

    #[test]
    fn test_block_policy_waits_for_space() {
        let queue = BoundedQueue::new("block", 2, OverflowPolicy::Block);
        queue.push(1).unwrap();
        queue.push(2).unwrap();

        let q = queue.clone();
        let handle = thread::spawn(move || q.push(3));
        thread::sleep(Duration::from_millis(20));
        // pusher is suspended until a pop frees a slot
        assert_eq!(queue.try_pop(), Some(1));
        handle.join().unwrap().unwrap();
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
    }

    #[test]
    fn test_concurrent_push_pop_conserves_items() {
        let queue = BoundedQueue::new("mpmc", 0, OverflowPolicy::Block);
        let producer = {
            let q = queue.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    q.push(i).unwrap();
                }
            })
        };
        let consumer = {
            let q = queue.clone();
            thread::spawn(move || {
                let mut seen = 0;
                while seen < 1000 {
                    if q.try_pop().is_some() {
                        seen += 1;
                    } else {
                        thread::sleep(Duration::from_micros(50));
                    }
                }
                seen
            })
        };
        producer.join().unwrap();
        assert_eq!(consumer.join().unwrap(), 1000);
        assert!(queue.is_empty());
    }
}
