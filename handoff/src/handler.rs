//! Per-item side effects ("produce" / "consume" work).
//!
//! Handlers never influence the ring; they only observe each completed
//! handoff. Where they run relative to the gate is [`crate::WorkPlacement`].

use crate::item::{Item, Role};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub trait ItemHandler: Send {
    fn on_item(&mut self, role: Role, item: Item);
}

/// Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl ItemHandler for Noop {
    #[inline]
    fn on_item(&mut self, _role: Role, _item: Item) {}
}

/// Fixed sleep per item. The classic demo sleeps 100 ms per produced item
/// and 150 ms per consumed item.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedWork {
    delay: Duration,
}

impl SimulatedWork {
    pub const DEMO_PRODUCE: Duration = Duration::from_millis(100);
    pub const DEMO_CONSUME: Duration = Duration::from_millis(150);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl ItemHandler for SimulatedWork {
    fn on_item(&mut self, _role: Role, _item: Item) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

/// Collects items in handling order. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    items: Arc<Mutex<Vec<Item>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.items.lock().iter().map(|i| i.sequence()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl ItemHandler for Recorder {
    fn on_item(&mut self, _role: Role, item: Item) {
        self.items.lock().push(item);
    }
}

/// Emits "Produced: n" / "Consumed: n" at info level.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogItems;

#[cfg(feature = "tracing")]
impl ItemHandler for LogItems {
    fn on_item(&mut self, role: Role, item: Item) {
        tracing::info!(target: "handoff::items", "{}: {}", role.verb(), item);
    }
}

impl<A: ItemHandler, B: ItemHandler> ItemHandler for (A, B) {
    #[inline]
    fn on_item(&mut self, role: Role, item: Item) {
        self.0.on_item(role, item);
        self.1.on_item(role, item);
    }
}

impl<H: ItemHandler + ?Sized> ItemHandler for Box<H> {
    #[inline]
    fn on_item(&mut self, role: Role, item: Item) {
        (**self).on_item(role, item);
    }
}
