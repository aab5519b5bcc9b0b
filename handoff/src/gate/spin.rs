//! SpinGate - busy-wait mutual exclusion.
//!
//! A waiter never sleeps: it re-reads the lock word with `spin_loop()` until
//! the holder releases it. Correct, but every cycle spent waiting is CPU
//! burned. Pair with [`crate::WaitStrategy::Spin`] to reproduce a pure
//! polling handoff, or use [`super::CondvarGate`] to let waiters sleep.

use super::{assert_consistent, poisoned, Gate, GateStats};
use crate::error::Result;
use crate::ring::BoundedRingBuffer;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// Lock word on its own cache line so the spinning reader does not share a
// line with the ring bookkeeping the holder is writing.
#[repr(align(128))]
struct PaddedAtomicBool(AtomicBool);

pub struct SpinGate<T> {
    locked: PaddedAtomicBool,
    ring: UnsafeCell<BoundedRingBuffer<T>>,
    acquisitions: AtomicU64,
    contended: AtomicU64,
    poisoned: AtomicBool,
}

// The ring is only reachable through a SpinGuard, and at most one guard exists.
unsafe impl<T: Send> Send for SpinGate<T> {}
unsafe impl<T: Send> Sync for SpinGate<T> {}

impl<T> SpinGate<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self::with_ring(BoundedRingBuffer::new(capacity)?))
    }

    pub fn with_ring(ring: BoundedRingBuffer<T>) -> Self {
        Self {
            locked: PaddedAtomicBool(AtomicBool::new(false)),
            ring: UnsafeCell::new(ring),
            acquisitions: AtomicU64::new(0),
            contended: AtomicU64::new(0),
            poisoned: AtomicBool::new(false),
        }
    }

    /// Spin until the lock is ours.
    pub fn lock(&self) -> SpinGuard<'_, T> {
        let mut contended = false;
        loop {
            if self
                .locked
                .0
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
            contended = true;
            // Read-only wait keeps the line shared until the holder releases.
            while self.locked.0.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }

        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        if contended {
            self.contended.fetch_add(1, Ordering::Relaxed);
        }
        SpinGuard { gate: self }
    }

    /// Single attempt; `None` if another actor holds the gate.
    #[cfg(test)]
    fn try_lock(&self) -> Option<SpinGuard<'_, T>> {
        self.locked
            .0
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        Some(SpinGuard { gate: self })
    }

    #[cfg(test)]
    fn is_locked(&self) -> bool {
        self.locked.0.load(Ordering::Relaxed)
    }

    /// Tear down the gate and return the ring.
    pub fn into_inner(self) -> BoundedRingBuffer<T> {
        self.ring.into_inner()
    }
}

impl<T: Send> Gate<T> for SpinGate<T> {
    #[inline]
    fn with_exclusive_access<R>(&self, op: impl FnOnce(&mut BoundedRingBuffer<T>) -> R) -> R {
        if self.is_poisoned() {
            poisoned();
        }
        let mut guard = self.lock();
        let result = op(&mut *guard);
        assert_consistent(&*guard);
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
    }

    #[inline]
    fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }
}

/// Held lock. Released on drop, including during unwinding.
pub struct SpinGuard<'a, T> {
    gate: &'a SpinGate<T>,
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = BoundedRingBuffer<T>;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.gate.ring.get() }
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.gate.ring.get() }
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    fn drop(&mut self) {
        self.gate.locked.0.store(false, Ordering::Release);
    }
}
