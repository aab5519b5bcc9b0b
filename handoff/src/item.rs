//! Items exchanged between the two actors.

use std::fmt;

/// Opaque token stamped with the producer's sequence number (1..=N).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Item(u64);

impl Item {
    #[inline]
    pub const fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    #[inline]
    pub const fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the handoff an actor plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
        }
    }

    /// Past-tense verb used in per-item log lines.
    pub const fn verb(self) -> &'static str {
        match self {
            Role::Producer => "Produced",
            Role::Consumer => "Consumed",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
