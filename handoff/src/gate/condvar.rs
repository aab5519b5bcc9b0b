//! CondvarGate - mutex plus "not full" / "not empty" condition variables.
//!
//! Polling through [`Gate::with_exclusive_access`] works exactly like the spin
//! gate, except a contended lock parks the thread instead of spinning.
//! [`BlockingGate`] adds waits that suspend until the ring changes state, so
//! an actor facing a full or empty ring costs no CPU at all.

use super::{assert_consistent, poisoned, BlockingGate, Gate, GateStats};
use crate::error::Result;
use crate::ring::BoundedRingBuffer;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub struct CondvarGate<T> {
    ring: Mutex<BoundedRingBuffer<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    acquisitions: AtomicU64,
    contended: AtomicU64,
    poisoned: AtomicBool,
}

impl<T> CondvarGate<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self::with_ring(BoundedRingBuffer::new(capacity)?))
    }

    pub fn with_ring(ring: BoundedRingBuffer<T>) -> Self {
        Self {
            ring: Mutex::new(ring),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            acquisitions: AtomicU64::new(0),
            contended: AtomicU64::new(0),
            poisoned: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoundedRingBuffer<T>> {
        if self.poisoned.load(Ordering::Acquire) {
            poisoned();
        }
        let guard = match self.ring.try_lock() {
            Some(guard) => guard,
            None => {
                self.contended.fetch_add(1, Ordering::Relaxed);
                self.ring.lock()
            }
        };
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        guard
    }

    // One waiter per side (single producer, single consumer), so notify_one.
    fn signal(&self, before: usize, after: usize) {
        if after > before {
            self.not_empty.notify_one();
        } else if after < before {
            self.not_full.notify_one();
        }
    }

    pub fn into_inner(self) -> BoundedRingBuffer<T> {
        self.ring.into_inner()
    }
}

impl<T: Send> Gate<T> for CondvarGate<T> {
    fn with_exclusive_access<R>(&self, op: impl FnOnce(&mut BoundedRingBuffer<T>) -> R) -> R {
        let mut ring = self.lock();
        let before = ring.len();
        let result = op(&mut *ring);
        assert_consistent(&*ring);
        let after = ring.len();
        drop(ring);

        self.signal(before, after);
        result
    }

    fn stats(&self) -> GateStats {
        GateStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
        }
    }

    fn poison(&self) {
        self.poisoned.store(true, Ordering::Release);
        // Waiters check the flag under the lock before parking. Taking the
        // lock here means each one has either seen the flag or is parked.
        drop(self.ring.lock());
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }
}

impl<T: Send> BlockingGate<T> for CondvarGate<T> {
    fn enqueue_wait(&self, item: T, on_stored: impl FnOnce()) -> u64 {
        let mut ring = self.lock();
        let mut waits = 0;
        // Loop guards against spurious wakeups.
        while ring.is_full() {
            // Checked under the lock, so poison() cannot slip in between
            // this load and the wait below.
            if self.is_poisoned() {
                poisoned();
            }
            waits += 1;
            self.not_full.wait(&mut ring);
        }

        if ring.try_enqueue(item).is_err() {
            panic!("ring invariant violated ({ring:?}): full after not_full wakeup");
        }
        on_stored();
        assert_consistent(&*ring);
        drop(ring);

        self.not_empty.notify_one();
        waits
    }

    fn dequeue_wait(&self, on_taken: impl FnOnce(&T)) -> (T, u64) {
        let mut ring = self.lock();
        let mut waits = 0;
        while ring.is_empty() {
            if self.is_poisoned() {
                poisoned();
            }
            waits += 1;
            self.not_empty.wait(&mut ring);
        }

        let Some(item) = ring.try_dequeue() else {
            panic!("ring invariant violated ({ring:?}): empty after not_empty wakeup");
        };
        on_taken(&item);
        assert_consistent(&*ring);
        drop(ring);

        self.not_full.notify_one();
        (item, waits)
    }
}
