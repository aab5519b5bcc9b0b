//! Test helpers for handoff runs.
//!
//! - [`verify`]: FIFO / gap / duplicate detection over consumed sequences
//! - [`chaos`]: random delays injected as an [`handoff::ItemHandler`]

pub mod chaos;
pub mod verify;

pub use chaos::{ChaosEvent, JitterMonkey};
pub use verify::{CheckingHandler, SequenceChecker, SequenceStats, SequenceStatus};
