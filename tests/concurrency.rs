//! Races between real threads hitting the same registry

use bucketgate::{BucketRegistry, ManualClock, RefillRate, TokenBucket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const THREADS: usize = 16;

type FrozenRegistry = BucketRegistry<String, Arc<ManualClock>>;

fn frozen_registry(capacity: u64, rate: u64) -> (Arc<FrozenRegistry>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let registry = BucketRegistry::<String>::builder()
        .capacity(capacity)
        .refill_per_second(rate)
        .clock(Arc::clone(&clock))
        .build()
        .unwrap();
    (Arc::new(registry), clock)
}

/// Run `per_thread` requests for `client` on every thread, all released at once
fn race(registry: &Arc<FrozenRegistry>, client: &str, per_thread: usize) -> usize {
    let barrier = Arc::new(Barrier::new(THREADS));
    let allowed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(registry);
            let barrier = Arc::clone(&barrier);
            let allowed = Arc::clone(&allowed);
            let client = client.to_string();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..per_thread {
                    if registry.allow_request(client.as_str()) {
                        allowed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    allowed.load(Ordering::Relaxed)
}

#[test]
fn test_no_double_spend_on_first_access() {
    for _ in 0..20 {
        let (registry, _clock) = frozen_registry(10, 5);

        // 16 threads * 4 requests against a brand new client; time is frozen
        // so exactly the starting capacity can be admitted
        assert_eq!(race(&registry, "c1", 4), 10);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.available("c1"), Some(0));
    }
}

#[test]
fn test_exact_capacity_race() {
    let (registry, _clock) = frozen_registry(THREADS as u64, 1);

    // One request per thread and exactly one token per thread
    assert_eq!(race(&registry, "c1", 1), THREADS);
    assert!(!registry.allow_request("c1"));
}

#[test]
fn test_refill_between_bursts() {
    let (registry, clock) = frozen_registry(10, 5);

    assert_eq!(race(&registry, "c1", 2), 10);

    clock.advance(Duration::from_secs(1));
    assert_eq!(race(&registry, "c1", 2), 5);

    clock.advance(Duration::from_secs(10));
    assert_eq!(race(&registry, "c1", 2), 10);
}

#[test]
fn test_clients_are_independent_under_contention() {
    let (registry, _clock) = frozen_registry(10, 5);
    let barrier = Arc::new(Barrier::new(THREADS));

    // Each thread owns a client and drains it well past capacity
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let client = format!("client-{t}");
                barrier.wait();
                (0..25).filter(|_| registry.allow_request(client.as_str())).count()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 10);
    }
    assert_eq!(registry.len(), THREADS);
}

#[test]
fn test_many_clients_created_once() {
    let (registry, _clock) = frozen_registry(3, 1);
    let barrier = Arc::new(Barrier::new(THREADS));

    // Every thread walks the same 100 new clients, so each first access races
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..100)
                    .filter(|n| registry.allow_request(format!("client-{n}").as_str()))
                    .count()
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 100 * 3);
    assert_eq!(registry.len(), 100);
}

#[test]
fn test_eviction_racing_with_requests() {
    let (registry, clock) = frozen_registry(5, 5);
    for n in 0..50 {
        assert!(registry.allow_request(format!("client-{n}").as_str()));
    }
    clock.advance(Duration::from_secs(60));

    let evictor = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || registry.evict_idle(Duration::from_secs(30)))
    };

    // Whatever was evicted comes back full, so every client still gets its
    // whole capacity and never more
    let allowed = race(&registry, "client-0", 1);
    let evicted = evictor.join().unwrap();

    assert_eq!(allowed, 5);
    assert!(evicted <= 50);
}

#[test]
fn test_bucket_shared_across_threads_with_real_time() {
    let start = Instant::now();
    let rate = RefillRate::per_second(1).unwrap();
    let bucket = Arc::new(TokenBucket::new(100, rate, start).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let bucket = Arc::clone(&bucket);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..20)
                    .filter(|_| bucket.try_consume(1, Instant::now()).unwrap())
                    .count()
            })
        })
        .collect();

    let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let refilled = start.elapsed().as_secs() as usize + 1;

    // Never more than the starting budget plus what could have refilled
    assert!(allowed >= 100);
    assert!(allowed <= 100 + refilled);
    assert!(bucket.snapshot().tokens <= 100);
}
