//! Mutual exclusion gates guarding a [`BoundedRingBuffer`].
//!
//! - `SpinGate<T>` - test-and-set lock, waiters busy-poll (burns CPU)
//! - `CondvarGate<T>` - mutex + "not full"/"not empty" condvars, waiters can sleep
//!
//! Both serialize producer and consumer through the same region and give no
//! fairness guarantee. A failed attempt on a full or empty ring still takes
//! the lock, and a polling actor retries right after its back-off, so it can
//! keep winning acquisitions that change nothing. Starvation of the other
//! actor is possible and has no bound.
//!
//! On a single core, spin polling is pathological: the actor holding the
//! CPU spins through its whole time slice before the other side can run.
//! Use [`crate::WaitStrategy::Yield`] or blocking there.

mod condvar;
mod spin;

pub use condvar::CondvarGate;
pub use spin::SpinGate;

use crate::error::{HandoffError, Result};
use crate::ring::BoundedRingBuffer;
use std::str::FromStr;

/// Exclusive access to a ring buffer for the duration of one operation.
pub trait Gate<T>: Send + Sync {
    /// Run `op` while holding the gate. The lock is released when `op`
    /// returns or unwinds. Ring invariants are checked before release.
    fn with_exclusive_access<R>(&self, op: impl FnOnce(&mut BoundedRingBuffer<T>) -> R) -> R;

    fn stats(&self) -> GateStats;

    /// Mark the gate dead after an actor stopped early. Later entries, and
    /// callers parked in a blocking wait, panic with [`GATE_POISONED`].
    fn poison(&self);

    fn is_poisoned(&self) -> bool;
}

/// Panic payload raised by a poisoned gate.
pub const GATE_POISONED: &str = "gate poisoned: the other actor stopped";

#[cold]
pub(crate) fn poisoned() -> ! {
    std::panic::panic_any(GATE_POISONED)
}

/// True if a panic payload was raised by a poisoned gate.
pub fn is_poison_payload(payload: &(dyn std::any::Any + Send)) -> bool {
    payload
        .downcast_ref::<&'static str>()
        .is_some_and(|msg| *msg == GATE_POISONED)
}

/// A gate whose callers can suspend until the ring changes state.
pub trait BlockingGate<T>: Gate<T> {
    /// Wait for space, store `item`, run `on_stored` under the lock.
    /// Returns how many times the caller was suspended.
    fn enqueue_wait(&self, item: T, on_stored: impl FnOnce()) -> u64;

    /// Wait for an item, take it, run `on_taken` under the lock.
    /// Returns the item and how many times the caller was suspended.
    fn dequeue_wait(&self, on_taken: impl FnOnce(&T)) -> (T, u64);
}

/// Lifetime counters for one gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GateStats {
    /// Successful lock acquisitions.
    pub acquisitions: u64,
    /// Acquisitions that found the lock already held.
    pub contended: u64,
}

impl GateStats {
    pub fn contention_rate(&self) -> f64 {
        if self.acquisitions > 0 {
            (self.contended as f64) / (self.acquisitions as f64)
        } else {
            0.0
        }
    }
}

/// Which gate implementation guards the ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GateKind {
    #[default]
    Spin,
    Condvar,
}

impl FromStr for GateKind {
    type Err = HandoffError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "spin" => Ok(GateKind::Spin),
            "condvar" | "mutex" | "blocking" => Ok(GateKind::Condvar),
            other => Err(HandoffError::config(format!("unknown gate '{other}'"))),
        }
    }
}

/// Panic on broken bookkeeping. Called while the gate is still held.
#[inline]
pub(crate) fn assert_consistent<T>(ring: &BoundedRingBuffer<T>) {
    #[cfg(debug_assertions)]
    let checked = ring.verify();
    #[cfg(not(debug_assertions))]
    let checked = ring.verify_indices();

    if let Err(violation) = checked {
        panic!("ring invariant violated ({ring:?}): {violation}");
    }
}
