//! Jitter injection: random delays and yields inside actor handlers.
//!
//! Stretching the critical section at random shifts how producer and
//! consumer interleave, so stress runs visit full/empty edges and lock
//! contention that a steady loop never reaches.

use handoff::{Item, ItemHandler, Role};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// What the monkey does for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChaosEvent {
    /// Sleep a random amount in range
    Delay { min_us: u64, max_us: u64 },
    /// Give up the time slice
    Yield,
    /// Pass through
    None,
}

/// Random jitter as an [`ItemHandler`].
///
/// # Example
///
/// ```
/// use handoff_test_support::chaos::JitterMonkey;
///
/// let monkey = JitterMonkey::seeded(7)
///     .with_delay_probability(0.05)
///     .with_yield_probability(0.2);
/// ```
pub struct JitterMonkey {
    delay_probability: f64,
    yield_probability: f64,
    delay_min_us: u64,
    delay_max_us: u64,
    rng: StdRng,
    events_triggered: usize,
}

impl Default for JitterMonkey {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterMonkey {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible event stream.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            delay_probability: 0.0,
            yield_probability: 0.0,
            delay_min_us: 10,
            delay_max_us: 500,
            rng,
            events_triggered: 0,
        }
    }

    /// Frequent short stalls for stress testing
    pub fn aggressive(seed: u64) -> Self {
        Self::seeded(seed)
            .with_delay_probability(0.05)
            .with_yield_probability(0.25)
            .with_delay_range(1, 200)
    }

    pub fn with_delay_probability(mut self, prob: f64) -> Self {
        self.delay_probability = prob.clamp(0.0, 1.0);
        self
    }

    pub fn with_yield_probability(mut self, prob: f64) -> Self {
        self.yield_probability = prob.clamp(0.0, 1.0);
        self
    }

    pub fn with_delay_range(mut self, min_us: u64, max_us: u64) -> Self {
        self.delay_min_us = min_us;
        self.delay_max_us = max_us.max(min_us);
        self
    }

    /// Decide what chaos event to apply (if any)
    pub fn decide(&mut self) -> ChaosEvent {
        let roll = self.rng.gen::<f64>();
        let mut threshold = self.delay_probability;
        if roll < threshold {
            self.events_triggered += 1;
            return ChaosEvent::Delay {
                min_us: self.delay_min_us,
                max_us: self.delay_max_us,
            };
        }

        threshold += self.yield_probability;
        if roll < threshold {
            self.events_triggered += 1;
            return ChaosEvent::Yield;
        }

        ChaosEvent::None
    }

    pub fn events_triggered(&self) -> usize {
        self.events_triggered
    }

    fn apply(&mut self, event: &ChaosEvent) {
        match *event {
            ChaosEvent::Delay { min_us, max_us } => {
                let delay = self.rng.gen_range(min_us..=max_us);
                std::thread::sleep(Duration::from_micros(delay));
            }
            ChaosEvent::Yield => std::thread::yield_now(),
            ChaosEvent::None => {}
        }
    }
}

impl ItemHandler for JitterMonkey {
    fn on_item(&mut self, _role: Role, _item: Item) {
        let event = self.decide();
        self.apply(&event);
    }
}
