//! # handoff
//!
//! One producer and one consumer trading items through a fixed-capacity ring
//! buffer, with every ring operation serialized by a mutual-exclusion gate.
//!
//! ## Gates
//!
//! - **SpinGate**: test-and-test-and-set lock, waiters busy-poll
//! - **CondvarGate**: mutex + condvars, waiters park and can block on full/empty
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use handoff::{handlers::Recorder, run_with, HandoffConfig};
//!
//! let config = HandoffConfig::new(5, 20)?;
//! let consumed = Recorder::new();
//! let report = run_with(&config, handoff::handlers::Noop, consumed.clone())?;
//! assert_eq!(consumed.sequences(), (1..=20).collect::<Vec<_>>());
//! println!("{report}");
//! ```
//!
//! Full/empty rings are never errors: actors retry through the gate until the
//! operation succeeds, backing off per [`WaitStrategy`].

// Tracing macros - no-op when feature disabled
#[cfg(feature = "tracing")]
macro_rules! trace_debug { ($($arg:tt)*) => { tracing::debug!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug { ($($arg:tt)*) => {} }

#[cfg(feature = "tracing")]
macro_rules! trace_info { ($($arg:tt)*) => { tracing::info!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_info { ($($arg:tt)*) => {} }

#[cfg(feature = "tracing")]
macro_rules! trace_warn { ($($arg:tt)*) => { tracing::warn!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn { ($($arg:tt)*) => {} }

pub mod actor;
pub mod affinity;
pub mod config;
pub mod error;
pub mod gate;
pub mod handler;
pub mod harness;
mod item;
pub mod ring;

/// Ready-made [`ItemHandler`] implementations.
pub mod handlers {
    #[cfg(feature = "tracing")]
    pub use crate::handler::LogItems;
    pub use crate::handler::{Noop, Recorder, SimulatedWork};
}

pub use actor::{ActorStats, Consumer, Producer};
pub use config::{
    CorePair, HandoffConfig, WaitStrategy, WorkPlacement, DEFAULT_CAPACITY, DEFAULT_ITEM_COUNT,
};
pub use error::{HandoffError, InvariantViolation, Result};
pub use gate::{BlockingGate, CondvarGate, Gate, GateKind, GateStats, SpinGate};
pub use handler::ItemHandler;
pub use harness::{run, run_with, HandoffReport};
pub use item::{Item, Role};
pub use ring::BoundedRingBuffer;
