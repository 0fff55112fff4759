//! Throughput Benchmark for timelimited
//!
//! This benchmark measures the cost of the expiry bookkeeping on top of
//! plain map operations, for both eviction strategies.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use timelimited::{TimeLimitedMap, TimeLimitedSet};

const HOUR: Duration = Duration::from_secs(3600);

fn lazy_map() -> TimeLimitedMap<Bytes, Bytes> {
    TimeLimitedMap::new(HOUR).expect("positive expiry")
}

/// Benchmark inserts
fn bench_insert(c: &mut Criterion) {
    let map = lazy_map();

    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert_expiring", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            map.insert(key, Bytes::from("small_value"));
            i += 1;
        });
    });

    group.bench_function("insert_persistent", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("pinned:{}", i));
            map.insert_persistent(key, Bytes::from("small_value"));
            i += 1;
        });
    });

    group.bench_function("reinsert_same_key", |b| {
        let key = Bytes::from("hot");
        b.iter(|| {
            black_box(map.insert(key.clone(), Bytes::from("value")));
        });
    });

    group.finish();
}

/// Benchmark lookups
fn bench_get(c: &mut Criterion) {
    let map = lazy_map();

    // Pre-populate with data
    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        map.insert(key, value);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(map.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("missing:{}", i));
            black_box(map.get(&key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark sweeping a fully expired map
fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");

    for size in [1_000u64, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_function(format!("sweep_{}", size), |b| {
            b.iter_batched(
                || {
                    let set = TimeLimitedSet::new(Duration::from_millis(1))
                        .expect("positive expiry");
                    for i in 0..size {
                        set.insert(i);
                    }
                    // Every entry is older than the window once this returns
                    thread::sleep(Duration::from_millis(2));
                    set
                },
                |set| black_box(set.len()),
                BatchSize::LargeInput,
            );
        });
    }

    group.bench_function("sweep_with_persistent_prefix", |b| {
        b.iter_batched(
            || {
                let set = TimeLimitedSet::new(Duration::from_millis(1))
                    .expect("positive expiry");
                for i in 0..1_000u64 {
                    set.insert_persistent(i);
                }
                for i in 1_000..2_000u64 {
                    set.insert(i);
                }
                thread::sleep(Duration::from_millis(2));
                set
            },
            |set| black_box(set.len()),
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

/// Benchmark timer-driven inserts (one Tokio task per entry)
fn bench_timers(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let _guard = runtime.enter();

    let map = TimeLimitedMap::with_callback(HOUR, |_: Bytes, _: Bytes, _| {})
        .expect("callback map inside runtime");

    let mut group = c.benchmark_group("timers");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert_with_timer", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 10_000));
            map.insert(key, Bytes::from("value"));
            i += 1;
        });
    });

    group.bench_function("insert_remove", |b| {
        let key = Bytes::from("churn");
        b.iter(|| {
            map.insert(key.clone(), Bytes::from("value"));
            black_box(map.remove(&key));
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let map = Arc::new(lazy_map());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let map = Arc::clone(&map);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            map.insert(key.clone(), Bytes::from("value"));
                            map.get(&key);
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

criterion_group!(
    benches,
    bench_insert,
    bench_get,
    bench_sweep,
    bench_timers,
    bench_concurrent,
);

criterion_main!(benches);
