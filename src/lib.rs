//! # bucketgate
//!
//! Per-client admission control using the token bucket algorithm.
//!
//! ## Overview
//!
//! Every client identifier gets an independent bucket of tokens:
//! - **Bursts up to capacity**: a fresh client may make `capacity` requests at once
//! - **Continuous refill**: tokens come back at a fixed rate per second
//! - **Whole tokens only**: partial tokens are never credited early
//! - **Independent clients**: draining one bucket never affects another
//!
//! ## Quick Start
//!
//! ```
//! use bucketgate::BucketRegistry;
//!
//! // 10 tokens per client, refilled at 5 tokens per second
//! let limiter = BucketRegistry::new(10, 5)?;
//!
//! if limiter.allow_request("user:123") {
//!     println!("Request allowed!");
//! } else {
//!     println!("Rate limited!");
//! }
//! # Ok::<(), bucketgate::BucketError>(())
//! ```
//!
//! ## Concurrency
//!
//! [`BucketRegistry`] is `Send + Sync` and meant to be shared with an
//! [`Arc`](std::sync::Arc). Each bucket has its own lock, so callers only
//! ever wait on other requests from the same client. The registry map is
//! locked just long enough to find or insert a bucket, and a client's bucket
//! is created exactly once even if its first requests arrive together.
//!
//! ```
//! use bucketgate::BucketRegistry;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let limiter = Arc::new(BucketRegistry::new(10, 5).unwrap());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let limiter = Arc::clone(&limiter);
//!         thread::spawn(move || (0..5).filter(|_| limiter.allow_request("shared")).count())
//!     })
//!     .collect();
//!
//! let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
//! assert!(allowed >= 10);
//! ```
//!
//! ## Testing With Simulated Time
//!
//! The registry reads time from a [`Clock`]. Swap in a [`ManualClock`] to move
//! time forward without sleeping:
//!
//! ```
//! use bucketgate::{BucketRegistry, ManualClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(ManualClock::new());
//! let limiter = BucketRegistry::<String>::builder()
//!     .capacity(10)
//!     .refill_per_second(5)
//!     .clock(Arc::clone(&clock))
//!     .build()?;
//!
//! for _ in 0..10 {
//!     assert!(limiter.allow_request("c1"));
//! }
//! assert!(!limiter.allow_request("c1"));
//!
//! clock.advance(Duration::from_secs(1));
//! assert!(limiter.allow_request("c1"));
//! assert_eq!(limiter.available("c1"), Some(4));
//! # Ok::<(), bucketgate::BucketError>(())
//! ```
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster hashing
//! - `bin`: Build the `bucketgate` load demo binary

pub mod core;

pub use crate::core::{
    BucketError, BucketRegistry, BucketRegistryBuilder, BucketSnapshot, Clock, ManualClock,
    MonotonicClock, RefillRate, TokenBucket,
};
