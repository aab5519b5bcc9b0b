//! Run configuration, validated before any actor starts.

use crate::error::{HandoffError, Result};
use crate::gate::GateKind;
use std::str::FromStr;

/// Ring capacity of the classic demo run.
pub const DEFAULT_CAPACITY: usize = 5;

/// Items each actor handles in the classic demo run.
pub const DEFAULT_ITEM_COUNT: u64 = 20;

/// What an actor does after an attempt fails (ring full or empty).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum WaitStrategy {
    /// Retry immediately with a `spin_loop()` hint. Pure active polling.
    #[default]
    Spin,
    /// Retry after `thread::yield_now()`. Still polling, gives up the time slice.
    Yield,
    /// Suspend on a condition variable until the ring changes. Needs [`GateKind::Condvar`].
    Block,
}

impl FromStr for WaitStrategy {
    type Err = HandoffError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "spin" => Ok(WaitStrategy::Spin),
            "yield" => Ok(WaitStrategy::Yield),
            "block" => Ok(WaitStrategy::Block),
            other => Err(HandoffError::config(format!("unknown wait strategy '{other}'"))),
        }
    }
}

/// Where the per-item side effect (simulated work) runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum WorkPlacement {
    /// While still holding the gate. Serializes the work of both actors.
    #[default]
    InsideGate,
    /// After releasing the gate. Producer and consumer work overlap.
    OutsideGate,
}

impl FromStr for WorkPlacement {
    type Err = HandoffError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inside" | "inside-gate" => Ok(WorkPlacement::InsideGate),
            "outside" | "outside-gate" => Ok(WorkPlacement::OutsideGate),
            other => Err(HandoffError::config(format!("unknown work placement '{other}'"))),
        }
    }
}

/// CPU cores for the producer and consumer threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CorePair {
    pub producer: usize,
    pub consumer: usize,
}

/// Configuration for one producer/consumer run
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HandoffConfig {
    /// Ring capacity (any positive integer)
    pub capacity: usize,
    /// Items produced and consumed
    pub item_count: u64,
    pub gate: GateKind,
    pub wait: WaitStrategy,
    pub work_placement: WorkPlacement,
    pub affinity: Option<CorePair>,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            item_count: DEFAULT_ITEM_COUNT,
            gate: GateKind::default(),
            wait: WaitStrategy::default(),
            work_placement: WorkPlacement::default(),
            affinity: None,
        }
    }
}

impl HandoffConfig {
    /// Create a spin-polling configuration
    pub fn new(capacity: usize, item_count: u64) -> Result<Self> {
        let config = Self {
            capacity,
            item_count,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Condvar gate with blocking actors.
    pub fn blocking(capacity: usize, item_count: u64) -> Result<Self> {
        Self::new(capacity, item_count)?
            .with_gate(GateKind::Condvar)?
            .with_wait(WaitStrategy::Block)
    }

    pub fn with_gate(mut self, gate: GateKind) -> Result<Self> {
        self.gate = gate;
        self.validate()?;
        Ok(self)
    }

    /// Set the wait strategy. `Block` requires the condvar gate to be selected first.
    pub fn with_wait(mut self, wait: WaitStrategy) -> Result<Self> {
        self.wait = wait;
        self.validate()?;
        Ok(self)
    }

    pub fn with_work_placement(mut self, placement: WorkPlacement) -> Self {
        self.work_placement = placement;
        self
    }

    pub fn with_affinity(mut self, producer_core: usize, consumer_core: usize) -> Self {
        self.affinity = Some(CorePair {
            producer: producer_core,
            consumer: consumer_core,
        });
        self
    }

    /// Re-check every field. Fields are public, so the harness calls this again.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(HandoffError::config("Capacity must be greater than 0"));
        }
        if self.item_count == 0 {
            return Err(HandoffError::config("Item count must be greater than 0"));
        }
        if self.wait == WaitStrategy::Block && self.gate != GateKind::Condvar {
            return Err(HandoffError::config(
                "Blocking wait requires the condvar gate",
            ));
        }
        Ok(())
    }
}
