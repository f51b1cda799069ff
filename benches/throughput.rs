//! Throughput Benchmark for agemap
//!
//! This benchmark measures the performance of the aging map
//! under various workloads.

use agemap::AgingMap;
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(3600);

/// Benchmark store operations
fn bench_store(c: &mut Criterion) {
    let map = Arc::new(AgingMap::lazy());

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("store_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            let value = Bytes::from("small_value");
            map.store(key, value, TTL);
            i += 1;
        });
    });

    // Replacing entries that have already expired but were never reclaimed
    let stale = Arc::new(AgingMap::lazy());
    for i in 0..10_000 {
        stale.store(Bytes::from(format!("key:{}", i)), Bytes::from("old"), Duration::ZERO);
    }
    group.bench_function("store_over_expired", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 10_000));
            stale.store(key, Bytes::from("new"), Duration::ZERO);
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark load operations
fn bench_load(c: &mut Criterion) {
    let map = Arc::new(AgingMap::lazy());

    // Pre-populate with data
    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        map.store(key, value, TTL);
    }

    let mut group = c.benchmark_group("load");
    group.throughput(Throughput::Elements(1));

    group.bench_function("load_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(map.load(&key));
            i += 1;
        });
    });

    group.bench_function("load_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("missing:{}", i));
            black_box(map.load(&key));
            i += 1;
        });
    });

    group.bench_function("load_with_deadline", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(map.load_with_deadline(&key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% loads, 20% stores)
fn bench_mixed(c: &mut Criterion) {
    let map = Arc::new(AgingMap::lazy());

    // Pre-populate
    for i in 0..10_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        map.store(key, value, TTL);
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_load_20_store", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% stores
                let key = Bytes::from(format!("new:{}", i));
                map.store(key, Bytes::from("value"), TTL);
            } else {
                // 80% loads
                let key = Bytes::from(format!("key:{}", i % 10_000));
                black_box(map.load(&key));
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark load_or_store
fn bench_load_or_store(c: &mut Criterion) {
    let map = Arc::new(AgingMap::lazy());

    let mut group = c.benchmark_group("load_or_store");
    group.throughput(Throughput::Elements(1));

    // Single key (high contention on one shard)
    group.bench_function("single_key", |b| {
        let key = Bytes::from("counter");
        b.iter(|| {
            black_box(map.load_or_store(key.clone(), Bytes::from("value"), TTL));
        });
    });

    // Every call finds an expired entry and replaces it
    group.bench_function("replace_expired", |b| {
        let key = Bytes::from("lease");
        b.iter(|| {
            black_box(map.load_or_store(key.clone(), Bytes::from("value"), Duration::ZERO));
        });
    });

    // Many keys (spread across shards)
    group.bench_function("many_keys", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 1000));
            black_box(map.load_or_store(key, Bytes::from("value"), TTL));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let map = Arc::new(AgingMap::lazy());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let map = Arc::clone(&map);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            map.store(key.clone(), Bytes::from("value"), TTL);
                            map.load(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(map.len());
        });
    });

    group.finish();
}

/// Benchmark sweep cycles
fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");

    // Half of the entries are already expired when the cycle runs
    for scale in [0.25, 0.5, 1.0] {
        group.bench_function(format!("sweep_{}", scale), |b| {
            b.iter_batched(
                || {
                    let map = AgingMap::lazy();
                    for i in 0..10_000u32 {
                        let ttl = if i % 2 == 0 { Duration::ZERO } else { TTL };
                        map.store(i, i, ttl);
                    }
                    map
                },
                |map| black_box(map.sweep(scale)),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_store,
    bench_load,
    bench_mixed,
    bench_load_or_store,
    bench_concurrent,
    bench_sweep,
);

criterion_main!(benches);
