//! Error types for handoff.

use crate::item::Role;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HandoffError>;

/// Errors surfaced to callers. Full/empty buffers are not errors; actors retry them.
#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("config: {0}")]
    Config(String),

    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: Role,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to pin {role} thread to core {core}: {source}")]
    Affinity {
        role: Role,
        core: usize,
        #[source]
        source: std::io::Error,
    },
}

impl HandoffError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Broken ring bookkeeping. Only a gate that failed to exclude can cause this,
/// so gates panic with it instead of returning it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("occupancy {occupancy} exceeds capacity {capacity}")]
    Overfull { occupancy: usize, capacity: usize },

    #[error("tail {tail} != (head {head} + occupancy {occupancy}) mod {capacity}")]
    IndexMismatch {
        head: usize,
        tail: usize,
        occupancy: usize,
        capacity: usize,
    },

    #[error("slot {index} is {state} but should be {expected}")]
    SlotState {
        index: usize,
        state: &'static str,
        expected: &'static str,
    },

    #[error("dequeued {dequeued} items but only {enqueued} were enqueued")]
    CounterSkew { enqueued: u64, dequeued: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = HandoffError::config("capacity must be greater than 0");
        assert_eq!(err.to_string(), "config: capacity must be greater than 0");
    }

    #[test]
    fn test_spawn_error_names_role() {
        let err = HandoffError::Spawn {
            role: Role::Consumer,
            source: std::io::Error::other("no threads"),
        };
        assert_eq!(err.to_string(), "failed to spawn consumer thread: no threads");
    }

    #[test]
    fn test_invariant_violation_display() {
        let v = InvariantViolation::Overfull {
            occupancy: 6,
            capacity: 5,
        };
        assert_eq!(v.to_string(), "occupancy 6 exceeds capacity 5");
    }
}
