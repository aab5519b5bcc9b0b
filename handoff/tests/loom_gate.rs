//! Loom models of the gate protocols.
//!
//! - spin gate: CAS acquire / Release store unlock around the ring
//! - condvar gate: not_full / not_empty handoff without lost wakeups
//! - poisoning: a parked waiter always observes the poison flag
//!
//! Run with: RUSTFLAGS="--cfg loom" cargo test --test loom_gate --release

#[cfg(loom)]
mod loom_tests {
    use handoff::BoundedRingBuffer;
    use loom::cell::UnsafeCell;
    use loom::sync::atomic::{AtomicBool, Ordering};
    use loom::sync::{Arc, Condvar, Mutex};
    use loom::thread;

    /// Same lock word protocol as SpinGate, over loom primitives.
    struct ModelSpinGate {
        locked: AtomicBool,
        ring: UnsafeCell<BoundedRingBuffer<u64>>,
    }

    unsafe impl Sync for ModelSpinGate {}

    impl ModelSpinGate {
        fn new(capacity: usize) -> Self {
            Self {
                locked: AtomicBool::new(false),
                ring: UnsafeCell::new(BoundedRingBuffer::new(capacity).unwrap()),
            }
        }

        fn with_exclusive_access<R>(&self, op: impl FnOnce(&mut BoundedRingBuffer<u64>) -> R) -> R {
            while self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                while self.locked.load(Ordering::Relaxed) {
                    thread::yield_now();
                }
            }
            let result = self.ring.with_mut(|ring| {
                let ring = unsafe { &mut *ring };
                let result = op(ring);
                ring.verify().unwrap();
                result
            });
            self.locked.store(false, Ordering::Release);
            result
        }
    }

    /// Two items through a capacity-1 ring, both actors polling.
    #[test]
    fn test_spin_gate_handoff() {
        loom::model(|| {
            let gate = Arc::new(ModelSpinGate::new(1));

            let g = gate.clone();
            let producer = thread::spawn(move || {
                for seq in 1..=2u64 {
                    while !g.with_exclusive_access(|ring| ring.try_enqueue(seq).is_ok()) {
                        thread::yield_now();
                    }
                }
            });

            let g = gate.clone();
            let consumer = thread::spawn(move || {
                let mut taken = Vec::new();
                while taken.len() < 2 {
                    match g.with_exclusive_access(|ring| ring.try_dequeue()) {
                        Some(item) => taken.push(item),
                        None => thread::yield_now(),
                    }
                }
                taken
            });

            producer.join().unwrap();
            assert_eq!(consumer.join().unwrap(), vec![1, 2]);
            gate.with_exclusive_access(|ring| assert!(ring.is_empty()));
        });
    }

    /// Blocking handoff: both sides park on the opposite condition.
    #[test]
    fn test_condvar_handoff_no_lost_wakeup() {
        loom::model(|| {
            let shared = Arc::new((
                Mutex::new(BoundedRingBuffer::<u64>::new(1).unwrap()),
                Condvar::new(),
                Condvar::new(),
            ));

            let s = shared.clone();
            let producer = thread::spawn(move || {
                let (ring, not_full, not_empty) = &*s;
                for seq in 1..=2u64 {
                    let mut guard = ring.lock().unwrap();
                    while guard.is_full() {
                        guard = not_full.wait(guard).unwrap();
                    }
                    guard.try_enqueue(seq).unwrap();
                    drop(guard);
                    not_empty.notify_one();
                }
            });

            let (ring, not_full, not_empty) = &*shared;
            let mut taken = Vec::new();
            for _ in 0..2 {
                let mut guard = ring.lock().unwrap();
                while guard.is_empty() {
                    guard = not_empty.wait(guard).unwrap();
                }
                taken.push(guard.try_dequeue().unwrap());
                drop(guard);
                not_full.notify_one();
            }

            producer.join().unwrap();
            assert_eq!(taken, vec![1, 2]);
        });
    }

    /// Poison is set, the lock taken and released, then notify_all: a
    /// waiter that checks the flag after every wakeup cannot miss it.
    #[test]
    fn test_poison_reaches_parked_waiter() {
        loom::model(|| {
            let shared = Arc::new((
                Mutex::new(BoundedRingBuffer::<u64>::new(1).unwrap()),
                Condvar::new(),
                AtomicBool::new(false),
            ));

            let s = shared.clone();
            let waiter = thread::spawn(move || {
                let (ring, not_empty, poisoned) = &*s;
                let mut guard = ring.lock().unwrap();
                while guard.is_empty() {
                    if poisoned.load(Ordering::Acquire) {
                        return false;
                    }
                    guard = not_empty.wait(guard).unwrap();
                }
                true
            });

            let (ring, not_empty, poisoned) = &*shared;
            poisoned.store(true, Ordering::Release);
            drop(ring.lock().unwrap());
            not_empty.notify_all();

            assert!(!waiter.join().unwrap());
        });
    }
}
