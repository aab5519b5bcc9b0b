//! Delivery verification for consumed items.

use handoff::{Item, ItemHandler, Role};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Checks that sequences arrive exactly once and in order, recording gaps.
pub struct SequenceChecker {
    /// Expected next sequence
    next_expected: AtomicU64,
    /// Gaps detected: (start, end)
    gaps: Mutex<Vec<(u64, u64)>>,
    total_seen: AtomicU64,
    /// Sequences at or below one already seen (late or duplicate)
    out_of_order: AtomicU64,
    highest_seen: AtomicU64,
}

impl Default for SequenceChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceChecker {
    /// Producer sequences start at 1.
    pub fn new() -> Self {
        Self {
            next_expected: AtomicU64::new(1),
            gaps: Mutex::new(Vec::new()),
            total_seen: AtomicU64::new(0),
            out_of_order: AtomicU64::new(0),
            highest_seen: AtomicU64::new(0),
        }
    }

    /// Check a sequence number
    pub fn check(&self, seq: u64) -> SequenceStatus {
        self.total_seen.fetch_add(1, Ordering::Relaxed);
        self.highest_seen.fetch_max(seq, Ordering::Relaxed);

        let expected = self.next_expected.load(Ordering::Relaxed);
        if seq == expected {
            self.next_expected.store(seq + 1, Ordering::Relaxed);
            SequenceStatus::InOrder
        } else if seq < expected {
            self.out_of_order.fetch_add(1, Ordering::Relaxed);
            SequenceStatus::OutOfOrder
        } else {
            let (start, end) = (expected, seq - 1);
            self.gaps.lock().unwrap().push((start, end));
            self.next_expected.store(seq + 1, Ordering::Relaxed);
            SequenceStatus::Gap { start, end }
        }
    }

    pub fn gaps(&self) -> Vec<(u64, u64)> {
        self.gaps.lock().unwrap().clone()
    }

    pub fn stats(&self) -> SequenceStats {
        let gaps = self.gaps.lock().unwrap();
        SequenceStats {
            total_seen: self.total_seen.load(Ordering::Relaxed),
            highest_seen: self.highest_seen.load(Ordering::Relaxed),
            gap_count: gaps.len() as u64,
            total_missing: gaps.iter().map(|(s, e)| e - s + 1).sum(),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
        }
    }

    /// Handler that feeds every consumed item into this checker.
    pub fn handler(self: &Arc<Self>) -> CheckingHandler {
        CheckingHandler(Arc::clone(self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceStatus {
    InOrder,
    OutOfOrder,
    Gap { start: u64, end: u64 },
}

#[derive(Debug, Clone)]
pub struct SequenceStats {
    pub total_seen: u64,
    pub highest_seen: u64,
    pub gap_count: u64,
    pub total_missing: u64,
    pub out_of_order: u64,
}

impl SequenceStats {
    pub fn is_perfect(&self) -> bool {
        self.gap_count == 0 && self.out_of_order == 0
    }

    /// Every item 1..=n seen exactly once, in order.
    pub fn is_exact_delivery(&self, n: u64) -> bool {
        self.is_perfect() && self.total_seen == n && self.highest_seen == n
    }
}

/// [`ItemHandler`] wrapper around a shared [`SequenceChecker`].
/// Only checks consumer-side items.
#[derive(Clone)]
pub struct CheckingHandler(Arc<SequenceChecker>);

impl ItemHandler for CheckingHandler {
    fn on_item(&mut self, role: Role, item: Item) {
        if role == Role::Consumer {
            self.0.check(item.sequence());
        }
    }
}
