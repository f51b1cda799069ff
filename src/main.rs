//! agemap demo - concurrent writers and readers against one aging map.
//!
//! Writer tasks store short-lived keys, reader tasks load them back after a
//! varying delay (so some have already expired), and the map's statistics are
//! reported once per second until Ctrl+C or `--duration` runs out.

use agemap::{AgingMap, EvictionMode, SweepConfig};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Demo configuration
struct Config {
    /// Number of writer tasks
    writers: usize,
    /// Number of reader tasks
    readers: usize,
    /// Lifetime of every stored key
    ttl: Duration,
    /// Time between sweep cycles
    interval: Duration,
    /// Fraction of the map inspected per sweep cycle
    delete_scale: f64,
    /// Disable the background sweeper
    lazy: bool,
    /// Stop after this long instead of waiting for Ctrl+C
    duration: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        let sweep = SweepConfig::default();
        Self {
            writers: 10,
            readers: 10,
            ttl: Duration::from_secs(1),
            interval: sweep.interval,
            delete_scale: sweep.delete_scale,
            lazy: false,
            duration: None,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> anyhow::Result<Self> {
        let mut config = Config::default();
        let mut args = std::env::args().skip(1);

        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .ok_or_else(|| anyhow::anyhow!("{} requires a value", name))
            };

            match arg.as_str() {
                "--writers" | "-w" => config.writers = value("--writers")?.parse()?,
                "--readers" | "-r" => config.readers = value("--readers")?.parse()?,
                "--ttl-ms" => config.ttl = Duration::from_millis(value("--ttl-ms")?.parse()?),
                "--interval-ms" => {
                    config.interval = Duration::from_millis(value("--interval-ms")?.parse()?)
                }
                "--delete-scale" => config.delete_scale = value("--delete-scale")?.parse()?,
                "--duration" | "-d" => {
                    config.duration = Some(Duration::from_secs(value("--duration")?.parse()?))
                }
                "--lazy" => config.lazy = true,
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("agemap-demo version {}", agemap::VERSION);
                    std::process::exit(0);
                }
                other => {
                    print_help();
                    anyhow::bail!("unknown argument: {}", other);
                }
            }
        }

        if config.writers == 0 || config.readers == 0 {
            anyhow::bail!("--writers and --readers must be at least 1");
        }

        Ok(config)
    }

    fn eviction_mode(&self) -> EvictionMode {
        if self.lazy {
            return EvictionMode::Lazy;
        }
        EvictionMode::Active(
            SweepConfig::new()
                .with_interval(self.interval)
                .with_delete_scale(self.delete_scale),
        )
    }
}

fn print_help() {
    println!(
        r#"
agemap-demo - exercise an aging map with concurrent writers and readers

USAGE:
    agemap-demo [OPTIONS]

OPTIONS:
    -w, --writers <N>          Writer tasks (default: 10)
    -r, --readers <N>          Reader tasks (default: 10)
        --ttl-ms <MS>          Lifetime of each key (default: 1000)
        --interval-ms <MS>     Time between sweep cycles (default: 1000)
        --delete-scale <F>     Share of the map inspected per cycle (default: 0.5)
        --lazy                 Disable the background sweeper
    -d, --duration <SECS>      Stop after this many seconds (default: run until Ctrl+C)
    -v, --version              Print version information
        --help                 Print this help message

Set RUST_LOG=debug to see every load.
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args()?;

    // Set up logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let map: Arc<AgingMap<Bytes, Bytes>> =
        Arc::new(AgingMap::try_with_mode(config.eviction_mode())?);
    info!(
        writers = config.writers,
        readers = config.readers,
        ttl_ms = config.ttl.as_millis(),
        sweeping = map.is_sweeping(),
        "Aging map demo started"
    );

    let mut tasks = JoinSet::new();

    // One channel per reader; writers hand out keys round-robin
    let mut senders = Vec::with_capacity(config.readers);
    for reader in 0..config.readers {
        let (tx, rx) = mpsc::channel(1024);
        senders.push(tx);
        tasks.spawn(read_loop(Arc::clone(&map), reader, rx));
    }

    for writer in 0..config.writers {
        tasks.spawn(write_loop(
            Arc::clone(&map),
            writer,
            config.ttl,
            senders.clone(),
        ));
    }
    drop(senders);

    tasks.spawn(report_loop(Arc::clone(&map)));

    // Set up graceful shutdown
    let run_for = async {
        match config.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, stopping demo...");
        }
        _ = run_for => {
            info!("Demo duration elapsed, stopping...");
        }
    }

    tasks.shutdown().await;
    map.stop_sweeping();

    let stats = map.stats();
    info!(
        entries = stats.entries,
        stores = stats.stores,
        hits = stats.hits,
        misses = stats.misses,
        lazy_evictions = stats.lazy_evictions,
        swept_evictions = stats.swept_evictions,
        "Demo finished"
    );
    Ok(())
}

/// Stores a fresh key, passes it to a reader, then pauses for a varying time.
async fn write_loop(
    map: Arc<AgingMap<Bytes, Bytes>>,
    writer: usize,
    ttl: Duration,
    readers: Vec<mpsc::Sender<Bytes>>,
) {
    for seq in 0u64.. {
        let key = Bytes::from(format!("{}:{}", writer, seq));
        map.store(key.clone(), Bytes::from(format!("value-{}", seq)), ttl);

        let reader = &readers[seq as usize % readers.len()];
        if reader.send(key).await.is_err() {
            return;
        }

        tokio::time::sleep(jitter(writer as u64 + seq, ttl)).await;
    }
}

/// Loads every key it is handed after a varying delay.
async fn read_loop(
    map: Arc<AgingMap<Bytes, Bytes>>,
    reader: usize,
    mut keys: mpsc::Receiver<Bytes>,
) {
    let mut seq = 0u64;
    while let Some(key) = keys.recv().await {
        seq += 1;
        tokio::time::sleep(jitter(reader as u64 * 7 + seq, Duration::from_secs(2))).await;

        match map.load_with_deadline(&key) {
            Some((value, remaining)) => debug!(
                key = ?key,
                value = ?value,
                remaining_secs = remaining.as_secs_f64(),
                "Loaded"
            ),
            None => debug!(key = ?key, "Expired"),
        }
    }
}

/// Logs the map's statistics once per second.
async fn report_loop(map: Arc<AgingMap<Bytes, Bytes>>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        let stats = map.stats();
        info!(
            entries = stats.entries,
            hits = stats.hits,
            misses = stats.misses,
            lazy_evictions = stats.lazy_evictions,
            swept_evictions = stats.swept_evictions,
            sweep_cycles = stats.sweep_cycles,
            "Map stats"
        );
    }
}

/// A deterministic spread of delays between zero and `max`.
fn jitter(seed: u64, max: Duration) -> Duration {
    let step = seed.wrapping_mul(2_654_435_761) % 100;
    max * step as u32 / 100
}
