//! Producer and consumer actors.
//!
//! Each actor loops "attempt through the gate, check, retry or advance".
//! A failed attempt (full on enqueue, empty on dequeue) is not an error:
//! the actor backs off per [`WaitStrategy`] and tries again. In polling mode
//! that retry loop is active waiting, so every failed attempt is CPU spent
//! doing nothing; `failed_attempts` in [`ActorStats`] makes that cost visible.

use crate::config::{HandoffConfig, WaitStrategy, WorkPlacement};
use crate::gate::{BlockingGate, Gate};
use crate::handler::ItemHandler;
use crate::item::{Item, Role};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-actor loop state. Owned and mutated by its actor only.
#[derive(Debug)]
struct ActorState {
    target: u64,
    completed: u64,
    attempts: u64,
    failed_attempts: u64,
    finished: bool,
}

impl ActorState {
    fn new(target: u64) -> Self {
        Self {
            target,
            completed: 0,
            attempts: 0,
            failed_attempts: 0,
            finished: target == 0,
        }
    }

    /// Sequence number of the item this actor is working on.
    #[inline]
    fn next_sequence(&self) -> u64 {
        self.completed + 1
    }

    #[inline]
    fn record_attempt(&mut self, succeeded: bool) {
        self.attempts += 1;
        if !succeeded {
            self.failed_attempts += 1;
        }
    }

    // A suspended wait counts as one failed attempt per wakeup that found
    // the ring still unusable, plus the final successful one.
    #[inline]
    fn record_waits(&mut self, waits: u64) {
        self.attempts += waits + 1;
        self.failed_attempts += waits;
    }

    #[inline]
    fn complete_one(&mut self) {
        self.completed += 1;
        self.finished = self.completed == self.target;
    }

    fn finish(self, role: Role, elapsed: Duration) -> ActorStats {
        debug_assert!(self.finished && self.attempts >= self.completed);
        ActorStats {
            role,
            completed: self.completed,
            attempts: self.attempts,
            failed_attempts: self.failed_attempts,
            elapsed,
        }
    }
}

/// Outcome of one actor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ActorStats {
    pub role: Role,
    /// Items enqueued (producer) or dequeued (consumer).
    pub completed: u64,
    /// Gate entries, successful or not.
    pub attempts: u64,
    /// Entries that found the ring full (producer) or empty (consumer).
    pub failed_attempts: u64,
    pub elapsed: Duration,
}

impl ActorStats {
    /// Fraction of attempts that accomplished nothing.
    pub fn wasted_ratio(&self) -> f64 {
        if self.attempts > 0 {
            (self.failed_attempts as f64) / (self.attempts as f64)
        } else {
            0.0
        }
    }
}

#[inline]
fn back_off(wait: WaitStrategy) {
    match wait {
        WaitStrategy::Spin => std::hint::spin_loop(),
        // Block has nothing to sleep on through a plain Gate; see run_blocking.
        WaitStrategy::Yield | WaitStrategy::Block => std::thread::yield_now(),
    }
}

// ============================================================================
// Producer
// ============================================================================

/// Enqueues items 1..=N through the gate.
pub struct Producer<G, H> {
    gate: Arc<G>,
    handler: H,
    wait: WaitStrategy,
    placement: WorkPlacement,
    state: ActorState,
}

impl<G, H: ItemHandler> Producer<G, H> {
    pub fn new(gate: Arc<G>, handler: H, config: &HandoffConfig) -> Self {
        Self {
            gate,
            handler,
            wait: config.wait,
            placement: config.work_placement,
            state: ActorState::new(config.item_count),
        }
    }
}

impl<G: Gate<Item>, H: ItemHandler> Producer<G, H> {
    /// Polling loop: retry `try_enqueue` until it succeeds, for every item.
    pub fn run(mut self) -> ActorStats {
        let start = Instant::now();
        trace_info!(items = self.state.target, wait = ?self.wait, "producer started");

        let inside = self.placement == WorkPlacement::InsideGate;
        while !self.state.finished {
            let item = Item::new(self.state.next_sequence());
            loop {
                let handler = &mut self.handler;
                let stored = self.gate.with_exclusive_access(|ring| {
                    if ring.try_enqueue(item).is_err() {
                        return false;
                    }
                    if inside {
                        handler.on_item(Role::Producer, item);
                    }
                    true
                });
                self.state.record_attempt(stored);
                if stored {
                    break;
                }
                back_off(self.wait);
            }

            if !inside {
                self.handler.on_item(Role::Producer, item);
            }
            self.state.complete_one();
            trace_debug!(seq = item.sequence(), attempts = self.state.attempts, "enqueued");
        }

        let stats = self.state.finish(Role::Producer, start.elapsed());
        trace_info!(
            attempts = stats.attempts,
            failed = stats.failed_attempts,
            "producer finished"
        );
        stats
    }
}

impl<G: BlockingGate<Item>, H: ItemHandler> Producer<G, H> {
    /// Blocking loop: suspend while the ring is full instead of polling.
    pub fn run_blocking(mut self) -> ActorStats {
        let start = Instant::now();
        trace_info!(items = self.state.target, "producer started (blocking)");

        let inside = self.placement == WorkPlacement::InsideGate;
        while !self.state.finished {
            let item = Item::new(self.state.next_sequence());
            let handler = &mut self.handler;
            let waits = self.gate.enqueue_wait(item, || {
                if inside {
                    handler.on_item(Role::Producer, item);
                }
            });
            if !inside {
                handler.on_item(Role::Producer, item);
            }
            self.state.record_waits(waits);
            self.state.complete_one();
            trace_debug!(seq = item.sequence(), waits, "enqueued");
        }

        let stats = self.state.finish(Role::Producer, start.elapsed());
        trace_info!(waits = stats.failed_attempts, "producer finished");
        stats
    }
}

// ============================================================================
// Consumer
// ============================================================================

/// Dequeues N items through the gate.
pub struct Consumer<G, H> {
    gate: Arc<G>,
    handler: H,
    wait: WaitStrategy,
    placement: WorkPlacement,
    state: ActorState,
}

impl<G, H: ItemHandler> Consumer<G, H> {
    pub fn new(gate: Arc<G>, handler: H, config: &HandoffConfig) -> Self {
        Self {
            gate,
            handler,
            wait: config.wait,
            placement: config.work_placement,
            state: ActorState::new(config.item_count),
        }
    }
}

impl<G: Gate<Item>, H: ItemHandler> Consumer<G, H> {
    /// Polling loop: retry `try_dequeue` until it yields, N times.
    pub fn run(mut self) -> ActorStats {
        let start = Instant::now();
        trace_info!(items = self.state.target, wait = ?self.wait, "consumer started");

        let inside = self.placement == WorkPlacement::InsideGate;
        while !self.state.finished {
            let handler = &mut self.handler;
            let taken = self.gate.with_exclusive_access(|ring| {
                let item = ring.try_dequeue()?;
                if inside {
                    handler.on_item(Role::Consumer, item);
                }
                Some(item)
            });
            self.state.record_attempt(taken.is_some());

            let Some(item) = taken else {
                back_off(self.wait);
                continue;
            };
            if !inside {
                self.handler.on_item(Role::Consumer, item);
            }
            self.state.complete_one();
            trace_debug!(seq = item.sequence(), attempts = self.state.attempts, "dequeued");
        }

        let stats = self.state.finish(Role::Consumer, start.elapsed());
        trace_info!(
            attempts = stats.attempts,
            failed = stats.failed_attempts,
            "consumer finished"
        );
        stats
    }
}

impl<G: BlockingGate<Item>, H: ItemHandler> Consumer<G, H> {
    /// Blocking loop: suspend while the ring is empty instead of polling.
    pub fn run_blocking(mut self) -> ActorStats {
        let start = Instant::now();
        trace_info!(items = self.state.target, "consumer started (blocking)");

        let inside = self.placement == WorkPlacement::InsideGate;
        while !self.state.finished {
            let handler = &mut self.handler;
            let (item, waits) = self.gate.dequeue_wait(|item| {
                if inside {
                    handler.on_item(Role::Consumer, *item);
                }
            });
            if !inside {
                handler.on_item(Role::Consumer, item);
            }
            self.state.record_waits(waits);
            self.state.complete_one();
            trace_debug!(seq = item.sequence(), waits, "dequeued");
        }

        let stats = self.state.finish(Role::Consumer, start.elapsed());
        trace_info!(waits = stats.failed_attempts, "consumer finished");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{CondvarGate, SpinGate};
    use crate::handler::{Noop, Recorder};

    #[test]
    fn test_producer_alone_fills_ring() {
        // Producer can only finish alone when N <= capacity.
        let config = HandoffConfig::new(4, 4).unwrap();
        let gate = Arc::new(SpinGate::new(config.capacity).unwrap());
        let stats = Producer::new(gate.clone(), Noop, &config).run();

        assert_eq!(stats.completed, 4);
        assert_eq!(stats.attempts, 4);
        assert_eq!(stats.failed_attempts, 0);
        assert!(gate.with_exclusive_access(|ring| ring.is_full()));
    }

    #[test]
    fn test_consumer_drains_prefilled_ring() {
        let config = HandoffConfig::new(3, 3).unwrap();
        let gate = Arc::new(SpinGate::new(3).unwrap());
        for seq in 1..=3 {
            gate.with_exclusive_access(|ring| ring.try_enqueue(Item::new(seq)).unwrap());
        }

        let recorder = Recorder::new();
        let stats = Consumer::new(gate, recorder.clone(), &config).run();
        assert_eq!(stats.completed, 3);
        assert_eq!(recorder.sequences(), vec![1, 2, 3]);
    }

    #[test]
    fn test_work_outside_gate_sees_every_item() {
        let config = HandoffConfig::new(2, 2)
            .unwrap()
            .with_work_placement(WorkPlacement::OutsideGate);
        let gate = Arc::new(SpinGate::new(2).unwrap());
        let produced = Recorder::new();
        Producer::new(gate.clone(), produced.clone(), &config).run();
        assert_eq!(produced.sequences(), vec![1, 2]);
    }

    #[test]
    fn test_pair_over_threads_counts_failures() {
        let config = HandoffConfig::new(1, 200).unwrap();
        let gate = Arc::new(SpinGate::new(1).unwrap());
        let consumed = Recorder::new();

        let consumer = Consumer::new(gate.clone(), consumed.clone(), &config);
        let handle = std::thread::spawn(move || consumer.run());
        let produced = Producer::new(gate, Noop, &config).run();
        let drained = handle.join().unwrap();

        assert_eq!(produced.completed, 200);
        assert_eq!(drained.completed, 200);
        assert_eq!(drained.attempts, drained.completed + drained.failed_attempts);
        assert_eq!(consumed.sequences(), (1..=200).collect::<Vec<_>>());
    }

    #[test]
    fn test_blocking_pair() {
        let config = HandoffConfig::blocking(2, 100).unwrap();
        let gate = Arc::new(CondvarGate::new(2).unwrap());
        let consumed = Recorder::new();

        let consumer = Consumer::new(gate.clone(), consumed.clone(), &config);
        let handle = std::thread::spawn(move || consumer.run_blocking());
        let produced = Producer::new(gate, Noop, &config).run_blocking();
        let drained = handle.join().unwrap();

        assert_eq!(produced.completed, 100);
        assert_eq!(drained.completed, 100);
        assert_eq!(consumed.sequences(), (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_wasted_ratio() {
        let stats = ActorStats {
            role: Role::Producer,
            completed: 10,
            attempts: 40,
            failed_attempts: 30,
            elapsed: Duration::ZERO,
        };
        assert_eq!(stats.wasted_ratio(), 0.75);
    }
}
