//! ramkv stress driver
//!
//! Hammers a single [`RamStore`] from several threads with a mix of short-TTL
//! writes, reads and increments on one shared counter, then checks that no
//! increment was lost and reports throughput.

use anyhow::{bail, Context};
use bytes::Bytes;
use ramkv::{start_expiry_sweeper, KvBackend, RamStore, StoreError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const COUNTER_KEY: &str = "stress:counter";

/// Driver configuration
struct StressConfig {
    /// Worker threads
    threads: usize,
    /// Operations per worker
    ops: usize,
    /// Distinct data keys
    keys: usize,
    /// Run the background sweeper alongside the workers
    sweep: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            ops: 100_000,
            keys: 10_000,
            sweep: false,
        }
    }
}

impl StressConfig {
    /// Parse configuration from command-line arguments
    fn from_args() -> anyhow::Result<Self> {
        let mut config = StressConfig::default();
        let mut args = std::env::args().skip(1);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--threads" | "-t" => config.threads = parse_value(&arg, args.next())?,
                "--ops" | "-n" => config.ops = parse_value(&arg, args.next())?,
                "--keys" | "-k" => config.keys = parse_value(&arg, args.next())?,
                "--sweep" => config.sweep = true,
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("ramkv-stress version {}", ramkv::VERSION);
                    std::process::exit(0);
                }
                other => bail!("unknown argument: {other}"),
            }
        }

        if config.threads == 0 || config.keys == 0 {
            bail!("--threads and --keys must be positive");
        }

        Ok(config)
    }
}

fn parse_value(flag: &str, value: Option<String>) -> anyhow::Result<usize> {
    let raw = value.with_context(|| format!("{flag} requires a value"))?;
    raw.parse()
        .with_context(|| format!("invalid value for {flag}: {raw}"))
}

fn print_help() {
    println!(
        r#"
ramkv-stress - concurrency stress test for the ramkv storage backend

USAGE:
    ramkv-stress [OPTIONS]

OPTIONS:
    -t, --threads <N>    Worker threads (default: 8)
    -n, --ops <N>        Operations per worker (default: 100000)
    -k, --keys <N>       Distinct data keys (default: 10000)
        --sweep          Run the background expiry sweeper
    -v, --version        Print version information
        --help           Print this help message

Set RUST_LOG=debug for store-level logging.
"#
    );
}

/// Small deterministic PRNG so runs are comparable.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

/// Runs one worker's share of the workload. Returns how many increments it made.
fn worker(store: &RamStore, seed: u64, ops: usize, keys: &[Bytes]) -> anyhow::Result<u64> {
    let counter = Bytes::from_static(COUNTER_KEY.as_bytes());
    let mut rng = XorShift64::new(seed);
    let mut increments = 0u64;

    for i in 0..ops {
        let roll = rng.next_u64();
        let key = &keys[(roll as usize) % keys.len()];

        match roll % 4 {
            0 => {
                store.incr(&counter, 1)?;
                increments += 1;
            }
            1 => {
                // Mix of persistent and very short-lived values
                let ttl = if roll % 8 == 1 { 5 } else { 0 };
                store.set(key.clone(), Bytes::from(i.to_string()), ttl)?;
            }
            2 => match store.get(key) {
                Ok(_) | Err(StoreError::NotFound) | Err(StoreError::Expired) => {}
                Err(err) => return Err(err.into()),
            },
            _ => {
                store.ttl(key);
            }
        }
    }

    Ok(increments)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = StressConfig::from_args()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let store = Arc::new(RamStore::open("stress")?);
    let _sweeper = config.sweep.then(|| start_expiry_sweeper(Arc::clone(&store)));

    let keys: Arc<Vec<Bytes>> = Arc::new(
        (0..config.keys)
            .map(|i| Bytes::from(format!("stress:key:{}", i)))
            .collect(),
    );

    info!(
        threads = config.threads,
        ops = config.ops,
        keys = config.keys,
        sweep = config.sweep,
        "starting stress run"
    );

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let keys = Arc::clone(&keys);
            let ops = config.ops;
            thread::spawn(move || worker(&store, 0x9E37_79B9_7F4A_7C15 ^ t as u64, ops, &keys))
        })
        .collect();

    let mut expected = 0u64;
    for handle in handles {
        match handle.join() {
            Ok(result) => expected += result?,
            Err(_) => bail!("worker thread panicked"),
        }
    }
    let elapsed = start.elapsed();

    let total_ops = (config.threads * config.ops) as f64;
    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        ops_per_sec = (total_ops / elapsed.as_secs_f64()) as u64,
        "workload finished"
    );

    let counter = store.get(&Bytes::from_static(COUNTER_KEY.as_bytes()));
    let actual = match counter {
        Ok(value) => std::str::from_utf8(&value)?.parse::<u64>()?,
        Err(StoreError::NotFound) => 0,
        Err(err) => return Err(err.into()),
    };

    let stats = store.stats();
    info!(
        keys = stats.keys,
        size_bytes = store.size(),
        expired = stats.expired,
        "final store state"
    );

    if actual != expected {
        warn!(expected, actual, "lost increments detected");
        bail!("counter is {actual}, expected {expected}");
    }

    info!(counter = actual, "no lost increments");
    Ok(())
}
