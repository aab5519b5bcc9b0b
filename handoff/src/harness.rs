//! Two-thread harness: build the gate, start both actors, join, report.
//!
//! If either actor stops early (panic, pin failure) it poisons the gate so the
//! survivor does not poll or block forever. The run then surfaces the first
//! real failure: the stopping actor's error, or its panic re-raised here.

use crate::actor::{ActorStats, Consumer, Producer};
use crate::affinity;
use crate::config::{HandoffConfig, WaitStrategy};
use crate::error::{HandoffError, Result};
use crate::gate::{is_poison_payload, CondvarGate, Gate, GateKind, GateStats, SpinGate};
use crate::handler::{ItemHandler, Noop};
use crate::item::{Item, Role};
use std::fmt;
use std::panic;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Everything observable about a finished run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HandoffReport {
    pub config: HandoffConfig,
    /// Wall time from spawning the first actor to joining the last.
    pub elapsed: Duration,
    pub producer: ActorStats,
    pub consumer: ActorStats,
    pub gate: GateStats,
    /// Items left in the ring after both actors finished. Always 0.
    pub final_occupancy: usize,
    /// Highest occupancy the ring reached.
    pub high_watermark: usize,
    pub enqueued: u64,
    pub dequeued: u64,
}

impl HandoffReport {
    /// Failed attempts across both actors: the CPU spent polling for nothing.
    pub fn wasted_attempts(&self) -> u64 {
        self.producer.failed_attempts + self.consumer.failed_attempts
    }
}

impl fmt::Display for HandoffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "handoff: {} items through capacity {} ({:?} gate, {:?} wait, work {:?})",
            self.config.item_count,
            self.config.capacity,
            self.config.gate,
            self.config.wait,
            self.config.work_placement,
        )?;
        writeln!(f, "  elapsed:        {:?}", self.elapsed)?;
        for stats in [&self.producer, &self.consumer] {
            writeln!(
                f,
                "  {:<9} {:>6} done, {:>10} attempts, {:>10} failed ({:.1}% wasted)",
                format!("{}:", stats.role),
                stats.completed,
                stats.attempts,
                stats.failed_attempts,
                stats.wasted_ratio() * 100.0,
            )?;
        }
        writeln!(
            f,
            "  gate:           {} acquisitions, {} contended ({:.1}%)",
            self.gate.acquisitions,
            self.gate.contended,
            self.gate.contention_rate() * 100.0,
        )?;
        write!(
            f,
            "  ring:           high watermark {}/{}, {} left",
            self.high_watermark, self.config.capacity, self.final_occupancy,
        )
    }
}

/// Run the handoff with no per-item work.
pub fn run(config: &HandoffConfig) -> Result<HandoffReport> {
    run_with(config, Noop, Noop)
}

/// Run the handoff, calling `on_produce` for every stored item and
/// `on_consume` for every taken item.
///
/// Returns once both actors are done. A panic in either actor (including a
/// handler panic or a ring invariant violation) is re-raised on this thread.
pub fn run_with<P, C>(config: &HandoffConfig, on_produce: P, on_consume: C) -> Result<HandoffReport>
where
    P: ItemHandler + 'static,
    C: ItemHandler + 'static,
{
    config.validate()?;
    trace_info!(
        capacity = config.capacity,
        items = config.item_count,
        gate = ?config.gate,
        wait = ?config.wait,
        work = ?config.work_placement,
        "starting handoff"
    );

    match (config.gate, config.wait) {
        (GateKind::Spin, _) => {
            let gate = Arc::new(SpinGate::new(config.capacity)?);
            let producer = Producer::new(Arc::clone(&gate), on_produce, config);
            let consumer = Consumer::new(Arc::clone(&gate), on_consume, config);
            drive(gate, config, move || producer.run(), move || consumer.run())
        }
        (GateKind::Condvar, WaitStrategy::Block) => {
            let gate = Arc::new(CondvarGate::new(config.capacity)?);
            let producer = Producer::new(Arc::clone(&gate), on_produce, config);
            let consumer = Consumer::new(Arc::clone(&gate), on_consume, config);
            drive(
                gate,
                config,
                move || producer.run_blocking(),
                move || consumer.run_blocking(),
            )
        }
        (GateKind::Condvar, _) => {
            let gate = Arc::new(CondvarGate::new(config.capacity)?);
            let producer = Producer::new(Arc::clone(&gate), on_produce, config);
            let consumer = Consumer::new(Arc::clone(&gate), on_consume, config);
            drive(gate, config, move || producer.run(), move || consumer.run())
        }
    }
}

type Joined = thread::Result<Result<ActorStats>>;

fn drive<G, PF, CF>(gate: Arc<G>, config: &HandoffConfig, produce: PF, consume: CF) -> Result<HandoffReport>
where
    G: Gate<Item> + 'static,
    PF: FnOnce() -> ActorStats + Send + 'static,
    CF: FnOnce() -> ActorStats + Send + 'static,
{
    let cores = config.affinity;
    let start = Instant::now();

    let consumer = spawn_actor(&gate, Role::Consumer, cores.map(|c| c.consumer), consume)?;
    let producer = match spawn_actor(&gate, Role::Producer, cores.map(|c| c.producer), produce) {
        Ok(handle) => handle,
        Err(err) => {
            gate.poison();
            // The consumer can only stop by hitting the poisoned gate.
            let _ = consumer.join();
            return Err(err);
        }
    };

    let produced = producer.join();
    let consumed = consumer.join();
    let elapsed = start.elapsed();
    let (producer, consumer) = settle(produced, consumed)?;

    let stats = gate.stats();
    let (final_occupancy, high_watermark, enqueued, dequeued) = gate
        .with_exclusive_access(|ring| (ring.len(), ring.high_watermark(), ring.enqueued(), ring.dequeued()));

    trace_info!(
        elapsed_us = elapsed.as_micros() as u64,
        wasted = producer.failed_attempts + consumer.failed_attempts,
        contended = stats.contended,
        "handoff finished"
    );

    Ok(HandoffReport {
        config: config.clone(),
        elapsed,
        producer,
        consumer,
        gate: stats,
        final_occupancy,
        high_watermark,
        enqueued,
        dequeued,
    })
}

fn spawn_actor<G, F>(
    gate: &Arc<G>,
    role: Role,
    core: Option<usize>,
    body: F,
) -> Result<JoinHandle<Result<ActorStats>>>
where
    G: Gate<Item> + 'static,
    F: FnOnce() -> ActorStats + Send + 'static,
{
    let gate = Arc::clone(gate);
    thread::Builder::new()
        .name(format!("handoff-{role}"))
        .spawn(move || {
            let _poison = PoisonOnPanic(&*gate);
            if let Some(core) = core {
                if let Err(source) = affinity::pin_to_core(core) {
                    trace_warn!(%role, core, error = %source, "pinning failed, stopping run");
                    gate.poison();
                    return Err(HandoffError::Affinity { role, core, source });
                }
                trace_debug!(%role, core, "pinned");
            }
            Ok(body())
        })
        .map_err(|source| HandoffError::Spawn { role, source })
}

/// Poisons the gate if the owning actor thread unwinds.
struct PoisonOnPanic<'a, G: Gate<Item>>(&'a G);

impl<G: Gate<Item>> Drop for PoisonOnPanic<'_, G> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.poison();
        }
    }
}

/// Pick the outcome of a run from both join results. A poison panic is only
/// the echo of the other actor stopping, so the other actor's outcome wins.
fn settle(produced: Joined, consumed: Joined) -> Result<(ActorStats, ActorStats)> {
    match (produced, consumed) {
        (Ok(p), Ok(c)) => Ok((p?, c?)),
        (Err(payload), Ok(other)) | (Ok(other), Err(payload)) => {
            if is_poison_payload(&*payload) {
                other?;
            }
            panic::resume_unwind(payload)
        }
        (Err(p), Err(c)) => panic::resume_unwind(if is_poison_payload(&*p) { c } else { p }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkPlacement;
    use crate::handler::Recorder;

    #[test]
    fn test_demo_defaults() {
        let consumed = Recorder::new();
        let report = run_with(&HandoffConfig::default(), Noop, consumed.clone()).unwrap();

        assert_eq!(consumed.sequences(), (1..=20).collect::<Vec<_>>());
        assert_eq!(report.producer.completed, 20);
        assert_eq!(report.consumer.completed, 20);
        assert_eq!(report.final_occupancy, 0);
        assert_eq!(report.enqueued, 20);
        assert_eq!(report.dequeued, 20);
        assert!(report.high_watermark <= 5);
    }

    #[test]
    fn test_capacity_one_three_items() {
        let config = HandoffConfig::new(1, 3).unwrap();
        let produced = Recorder::new();
        let consumed = Recorder::new();
        let report = run_with(&config, produced.clone(), consumed.clone()).unwrap();

        assert_eq!(produced.sequences(), vec![1, 2, 3]);
        assert_eq!(consumed.sequences(), vec![1, 2, 3]);
        assert_eq!(report.high_watermark, 1);
    }

    #[test]
    fn test_blocking_run_has_no_polling() {
        let config = HandoffConfig::blocking(2, 500).unwrap();
        let consumed = Recorder::new();
        let report = run_with(&config, Noop, consumed.clone()).unwrap();

        assert_eq!(consumed.len(), 500);
        assert_eq!(report.final_occupancy, 0);
        // Every attempt is either the final success or a counted wakeup.
        assert_eq!(
            report.consumer.attempts,
            report.consumer.completed + report.consumer.failed_attempts
        );
    }

    #[test]
    fn test_condvar_polling_outside_gate() {
        let config = HandoffConfig::new(3, 300)
            .unwrap()
            .with_gate(GateKind::Condvar)
            .unwrap()
            .with_wait(WaitStrategy::Yield)
            .unwrap()
            .with_work_placement(WorkPlacement::OutsideGate);
        let consumed = Recorder::new();
        let report = run_with(&config, Noop, consumed.clone()).unwrap();

        assert_eq!(consumed.sequences(), (1..=300).collect::<Vec<_>>());
        assert!(report.gate.acquisitions >= 600);
    }

    #[test]
    fn test_failed_attempts_still_take_the_gate() {
        // Producer sleeps outside the gate, so the consumer polls an empty ring.
        let config = HandoffConfig::new(2, 10)
            .unwrap()
            .with_wait(WaitStrategy::Yield)
            .unwrap()
            .with_work_placement(WorkPlacement::OutsideGate);
        let slow = crate::handler::SimulatedWork::new(Duration::from_millis(2));
        let report = run_with(&config, slow, Noop).unwrap();

        assert!(report.consumer.failed_attempts > 0);
        assert_eq!(
            report.gate.acquisitions,
            report.producer.attempts + report.consumer.attempts
        );
        assert!(report.gate.acquisitions > report.producer.completed + report.consumer.completed);
    }

    #[test]
    fn test_invalid_config_rejected_before_spawn() {
        let mut config = HandoffConfig::default();
        config.capacity = 0;
        assert!(matches!(run(&config), Err(HandoffError::Config(_))));

        let mut config = HandoffConfig::default();
        config.wait = WaitStrategy::Block;
        assert!(matches!(run(&config), Err(HandoffError::Config(_))));
    }

    struct PanicAt(u64);

    impl ItemHandler for PanicAt {
        fn on_item(&mut self, _role: Role, item: Item) {
            if item.sequence() == self.0 {
                panic!("consumer handler failed");
            }
        }
    }

    #[test]
    fn test_actor_panic_is_reraised() {
        // Capacity 1: the producer cannot finish without the consumer, so it
        // only stops because the gate gets poisoned.
        let config = HandoffConfig::new(1, 10).unwrap();
        let payload = panic::catch_unwind(|| run_with(&config, Noop, PanicAt(3))).unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"consumer handler failed"));
    }

    #[test]
    fn test_blocking_actor_panic_is_reraised() {
        let config = HandoffConfig::blocking(1, 10).unwrap();
        let payload = panic::catch_unwind(|| run_with(&config, Noop, PanicAt(2))).unwrap_err();
        assert!(!is_poison_payload(&*payload));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_pin_failure_stops_run() {
        let config = HandoffConfig::new(1, 10)
            .unwrap()
            .with_affinity(1 << 20, affinity::current_core().unwrap());

        match run(&config) {
            Err(HandoffError::Affinity { role, core, .. }) => {
                assert_eq!(role, Role::Producer);
                assert_eq!(core, 1 << 20);
            }
            other => panic!("expected affinity error, got {other:?}"),
        }
    }

    #[test]
    fn test_report_display() {
        let report = run(&HandoffConfig::new(2, 4).unwrap()).unwrap();
        let text = report.to_string();
        assert!(text.contains("4 items through capacity 2"));
        assert!(text.contains("producer:"));
        assert!(text.contains("high watermark"));
    }
}
