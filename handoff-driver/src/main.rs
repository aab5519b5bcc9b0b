//! Handoff driver - one producer, one consumer, one guarded ring.
//!
//! Demo run:   handoff
//! No delays:  handoff --produce-delay-ms 0 --consume-delay-ms 0 --items 1000000 --quiet
//! Blocking:   handoff --gate condvar --wait block
//!
//! Every flag can also be set through a `HANDOFF_*` environment variable.
//! Log level comes from `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::Parser;
use handoff::handlers::{LogItems, SimulatedWork};
use handoff::{
    run_with, CorePair, GateKind, HandoffConfig, ItemHandler, WaitStrategy, WorkPlacement,
    DEFAULT_CAPACITY, DEFAULT_ITEM_COUNT,
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "handoff", version)]
#[command(about = "Bounded producer/consumer handoff through a mutual-exclusion gate")]
struct Cli {
    /// Ring capacity
    #[arg(long, env = "HANDOFF_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Items to produce and consume
    #[arg(long, env = "HANDOFF_ITEMS", default_value_t = DEFAULT_ITEM_COUNT)]
    items: u64,

    /// Gate: spin, condvar
    #[arg(long, env = "HANDOFF_GATE", default_value = "spin")]
    gate: GateKind,

    /// Back-off after a failed attempt: spin, yield, block (block needs --gate condvar)
    #[arg(long, env = "HANDOFF_WAIT", default_value = "spin")]
    wait: WaitStrategy,

    /// Where per-item work runs: inside, outside (the gate)
    #[arg(long, env = "HANDOFF_WORK", default_value = "inside")]
    work: WorkPlacement,

    /// Simulated work per produced item
    #[arg(long, env = "HANDOFF_PRODUCE_DELAY_MS", default_value_t = 100)]
    produce_delay_ms: u64,

    /// Simulated work per consumed item
    #[arg(long, env = "HANDOFF_CONSUME_DELAY_MS", default_value_t = 150)]
    consume_delay_ms: u64,

    /// Pin producer and consumer to cores, e.g. "2,3" (Linux)
    #[arg(long, env = "HANDOFF_PIN", value_parser = parse_core_pair)]
    pin: Option<CorePair>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Skip per-item "Produced: n" / "Consumed: n" lines
    #[arg(long, short)]
    quiet: bool,
}

fn parse_core_pair(s: &str) -> std::result::Result<CorePair, String> {
    let (p, c) = s
        .split_once(',')
        .ok_or_else(|| format!("expected <producer>,<consumer>, got '{s}'"))?;
    let core = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|e| format!("bad core '{v}': {e}"))
    };
    Ok(CorePair {
        producer: core(p)?,
        consumer: core(c)?,
    })
}

fn handler(delay_ms: u64, quiet: bool) -> Box<dyn ItemHandler> {
    let work = SimulatedWork::new(Duration::from_millis(delay_ms));
    if quiet {
        Box::new(work)
    } else {
        // Work first, then the log line, like the classic demo.
        Box::new((work, LogItems))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = HandoffConfig::new(cli.capacity, cli.items)?
        .with_gate(cli.gate)?
        .with_wait(cli.wait)?
        .with_work_placement(cli.work);
    if let Some(pin) = cli.pin {
        config = config.with_affinity(pin.producer, pin.consumer);
    }

    info!(?config, cores = handoff::affinity::available_cores(), "handoff config");
    let report = run_with(
        &config,
        handler(cli.produce_delay_ms, cli.quiet),
        handler(cli.consume_delay_ms, cli.quiet),
    )
    .context("handoff run failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
        println!(
            "  polling cost:   {} wasted attempts",
            report.wasted_attempts()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_core_pair() {
        assert_eq!(
            parse_core_pair("2, 3").unwrap(),
            CorePair {
                producer: 2,
                consumer: 3
            }
        );
        assert!(parse_core_pair("2").is_err());
        assert!(parse_core_pair("a,1").is_err());
    }

    #[test]
    fn test_cli_defaults_match_demo() {
        let cli = Cli::try_parse_from(["handoff"]).unwrap();
        assert_eq!(cli.capacity, 5);
        assert_eq!(cli.items, 20);
        assert_eq!(cli.gate, GateKind::Spin);
        assert_eq!(cli.wait, WaitStrategy::Spin);
        assert_eq!(cli.work, WorkPlacement::InsideGate);
        assert_eq!(cli.produce_delay_ms, 100);
        assert_eq!(cli.consume_delay_ms, 150);
    }

    #[test]
    fn test_cli_blocking_flags() {
        let cli = Cli::try_parse_from([
            "handoff", "--gate", "condvar", "--wait", "block", "--work", "outside", "--pin", "0,1",
        ])
        .unwrap();
        assert_eq!(cli.gate, GateKind::Condvar);
        assert_eq!(cli.wait, WaitStrategy::Block);
        assert_eq!(cli.work, WorkPlacement::OutsideGate);
        assert_eq!(cli.pin.map(|p| p.consumer), Some(1));
    }

    #[test]
    fn test_cli_rejects_unknown_gate() {
        assert!(Cli::try_parse_from(["handoff", "--gate", "ticket"]).is_err());
    }
}
