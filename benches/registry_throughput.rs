use bucketgate::{BucketRegistry, ManualClock, RefillRate, TokenBucket};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn benchmark_bucket(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_bucket");
    group.throughput(Throughput::Elements(1));

    group.bench_function("try_consume_allowed", |b| {
        let rate = RefillRate::per_second(1_000_000_000).unwrap();
        let bucket = TokenBucket::new(u64::MAX, rate, Instant::now()).unwrap();

        b.iter(|| black_box(bucket.try_consume(black_box(1), Instant::now()).unwrap()));
    });

    group.bench_function("try_consume_denied", |b| {
        let start = Instant::now();
        let bucket = TokenBucket::new(1, RefillRate::per_second(1).unwrap(), start).unwrap();
        bucket.try_consume(1, start).unwrap();

        b.iter(|| black_box(bucket.try_consume(black_box(1), start).unwrap()));
    });

    group.finish();
}

fn benchmark_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket_registry");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("single_client", |b| {
        let limiter = BucketRegistry::new(1_000, 1_000).unwrap();

        b.iter(|| black_box(limiter.allow_request(black_box("test_key"))));
    });

    // Growing number of distinct clients
    for num_clients in [10u64, 1_000, 100_000] {
        group.bench_with_input(
            format!("rotating_clients_{num_clients}"),
            &num_clients,
            |b, &num_clients| {
                let limiter = BucketRegistry::<u64, _>::builder()
                    .capacity(100)
                    .refill_per_second(100)
                    .initial_clients(num_clients as usize)
                    .clock(ManualClock::new())
                    .build()
                    .unwrap();
                let mut counter = 0u64;

                b.iter(|| {
                    let client = counter % num_clients;
                    counter += 1;
                    black_box(limiter.allow_request(black_box(&client)))
                });
            },
        );
    }

    group.finish();
}

fn benchmark_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    const THREADS: u64 = 4;
    const PER_THREAD: u64 = 10_000;
    group.throughput(Throughput::Elements(THREADS * PER_THREAD));

    for (name, distinct) in [("same_client", false), ("distinct_clients", true)] {
        group.bench_function(name, |b| {
            let limiter = Arc::new(BucketRegistry::new(1_000_000, 1_000_000).unwrap());

            b.iter(|| {
                let handles: Vec<_> = (0..THREADS)
                    .map(|t| {
                        let limiter = Arc::clone(&limiter);
                        thread::spawn(move || {
                            let client = if distinct {
                                format!("client-{t}")
                            } else {
                                "shared".to_string()
                            };
                            (0..PER_THREAD)
                                .filter(|_| limiter.allow_request(client.as_str()))
                                .count()
                        })
                    })
                    .collect();

                for handle in handles {
                    black_box(handle.join().unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_bucket,
    benchmark_registry,
    benchmark_contention
);
criterion_main!(benches);
