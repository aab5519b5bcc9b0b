//! BoundedRingBuffer - fixed-capacity circular storage with no locking.
//!
//! All synchronization is the caller's job (see [`crate::gate`]); keeping the
//! buffer free of atomics lets its invariants be checked in plain unit tests.
//!
//! Unlike the power-of-two disruptor rings, capacity can be any positive
//! integer, so indices wrap with `%` instead of a mask.

use crate::error::{HandoffError, InvariantViolation, Result};

pub struct BoundedRingBuffer<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    occupancy: usize,
    enqueued: u64,
    dequeued: u64,
    high_watermark: usize,
}

impl<T> BoundedRingBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(HandoffError::config("Ring capacity must be greater than 0"));
        }

        let slots = (0..capacity)
            .map(|_| None)
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            slots,
            head: 0,
            tail: 0,
            occupancy: 0,
            enqueued: 0,
            dequeued: 0,
            high_watermark: 0,
        })
    }

    /// Store `item` at `tail` if there is room; hands the item back when full.
    #[inline]
    pub fn try_enqueue(&mut self, item: T) -> std::result::Result<(), T> {
        if self.occupancy == self.capacity() {
            return Err(item);
        }

        let slot = &mut self.slots[self.tail];
        debug_assert!(slot.is_none(), "try_enqueue: slot {} occupied", self.tail);
        *slot = Some(item);

        self.tail = self.advance(self.tail);
        self.occupancy += 1;
        self.enqueued += 1;
        self.high_watermark = self.high_watermark.max(self.occupancy);
        Ok(())
    }

    /// Take the item at `head`, or `None` when empty.
    #[inline]
    pub fn try_dequeue(&mut self) -> Option<T> {
        if self.occupancy == 0 {
            return None;
        }

        let item = self.slots[self.head].take();
        debug_assert!(item.is_some(), "try_dequeue: slot {} empty", self.head);

        self.head = self.advance(self.head);
        self.occupancy -= 1;
        self.dequeued += 1;
        item
    }

    #[inline]
    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Current occupancy.
    #[inline]
    pub fn len(&self) -> usize {
        self.occupancy
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupancy == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.occupancy == self.capacity()
    }

    /// Next read position.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Next write position.
    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued
    }

    pub fn dequeued(&self) -> u64 {
        self.dequeued
    }

    /// Highest occupancy ever observed.
    pub fn high_watermark(&self) -> usize {
        self.high_watermark
    }

    /// Occupancy bounds, index relation and counters. O(1).
    pub fn verify_indices(&self) -> std::result::Result<(), InvariantViolation> {
        let capacity = self.capacity();

        if self.occupancy > capacity {
            return Err(InvariantViolation::Overfull {
                occupancy: self.occupancy,
                capacity,
            });
        }

        if self.tail != (self.head + self.occupancy) % capacity {
            return Err(InvariantViolation::IndexMismatch {
                head: self.head,
                tail: self.tail,
                occupancy: self.occupancy,
                capacity,
            });
        }

        if self.dequeued > self.enqueued
            || self.enqueued - self.dequeued != self.occupancy as u64
        {
            return Err(InvariantViolation::CounterSkew {
                enqueued: self.enqueued,
                dequeued: self.dequeued,
            });
        }

        Ok(())
    }

    /// Check every invariant, including slot contents. O(capacity).
    pub fn verify(&self) -> std::result::Result<(), InvariantViolation> {
        self.verify_indices()?;
        let capacity = self.capacity();

        // Occupied window is [head, head + occupancy) modulo capacity.
        for offset in 0..capacity {
            let index = (self.head + offset) % capacity;
            let should_hold = offset < self.occupancy;
            match (should_hold, self.slots[index].is_some()) {
                (true, false) => {
                    return Err(InvariantViolation::SlotState {
                        index,
                        state: "empty",
                        expected: "occupied",
                    })
                }
                (false, true) => {
                    return Err(InvariantViolation::SlotState {
                        index,
                        state: "occupied",
                        expected: "empty",
                    })
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Simulate a lost update so gate tests can trip the invariant checks.
    #[cfg(test)]
    pub(crate) fn force_occupancy(&mut self, occupancy: usize) {
        self.occupancy = occupancy;
    }
}

impl<T> std::fmt::Debug for BoundedRingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedRingBuffer")
            .field("capacity", &self.capacity())
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("occupancy", &self.occupancy)
            .finish()
    }
}
