use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use slidewin::{LockedStore, ShardedStore, SlidingWindowLimiter, Store, WindowConfig};

fn config(limit: i64) -> WindowConfig {
    WindowConfig::new(limit, Duration::from_secs(60), Duration::from_secs(30)).unwrap()
}

fn bench_store<S: Store>(c: &mut Criterion, name: &str, make: impl Fn() -> S) {
    let mut group = c.benchmark_group(name);
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("single_key_allowed", |b| {
        let limiter = SlidingWindowLimiter::with_store(config(i64::MAX), make());
        let base = Instant::now();
        let mut tick = 0u64;

        b.iter(|| {
            tick += 1;
            let now = base + Duration::from_micros(tick);
            black_box(limiter.allow(black_box("test_key"), now))
        });
    });

    // Steady state: every call prunes one stamp and appends one
    group.bench_function("single_key_sliding", |b| {
        let limiter = SlidingWindowLimiter::with_store(config(1_000), make());
        let base = Instant::now();
        let step = Duration::from_millis(60);
        let mut tick = 0u32;

        b.iter(|| {
            tick += 1;
            black_box(limiter.allow(black_box("slide_key"), base + step * tick))
        });
    });

    group.bench_function("single_key_denied", |b| {
        let limiter = SlidingWindowLimiter::with_store(config(100), make());
        let now = Instant::now();
        for _ in 0..100 {
            limiter.allow("exhausted_key", now);
        }

        b.iter(|| black_box(limiter.allow(black_box("exhausted_key"), now)));
    });

    group.bench_function("rotating_keys_10000", |b| {
        let limiter = SlidingWindowLimiter::with_store(config(100), make());
        let keys: Vec<String> = (0..10_000).map(|i| format!("key_{i}")).collect();
        let now = Instant::now();
        let mut counter = 0usize;

        b.iter(|| {
            let key = &keys[counter % keys.len()];
            counter += 1;
            black_box(limiter.allow(black_box(key), now))
        });
    });

    group.bench_function("compact_100000_keys", |b| {
        let limiter = SlidingWindowLimiter::with_store(config(10), make());
        let base = Instant::now();
        for i in 0..100_000 {
            limiter.allow(&format!("key_{i}"), base);
        }

        b.iter(|| black_box(limiter.compact(black_box(base + Duration::from_secs(1)))));
    });

    group.finish();
}

fn bench_contention<S: Store + 'static>(c: &mut Criterion, name: &str, make: impl Fn() -> S) {
    let mut group = c.benchmark_group(format!("{name}_contention"));
    let threads = 8;
    let calls_per_thread = 10_000u64;
    group.throughput(Throughput::Elements(threads * calls_per_thread));

    group.bench_function("8_threads_distinct_keys", |b| {
        b.iter(|| {
            let limiter = Arc::new(SlidingWindowLimiter::with_store(config(1_000), make()));
            let now = Instant::now();
            thread::scope(|scope| {
                for t in 0..threads {
                    let limiter = &limiter;
                    scope.spawn(move || {
                        for i in 0..calls_per_thread {
                            let key = format!("t{t}_k{}", i % 64);
                            black_box(limiter.allow(&key, now));
                        }
                    });
                }
            });
        });
    });

    group.finish();
}

fn benchmark_stores(c: &mut Criterion) {
    bench_store(c, "locked_store", LockedStore::new);
    bench_store(c, "sharded_store", ShardedStore::new);
    bench_contention(c, "locked_store", LockedStore::new);
    bench_contention(c, "sharded_store", ShardedStore::new);
}

criterion_group!(benches, benchmark_stores);
criterion_main!(benches);
