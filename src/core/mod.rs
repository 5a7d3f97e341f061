//! Core components of the bucketgate rate limiting library
//!
//! This module contains the fundamental building blocks:
//! - [`rate`]: Refill rate and whole-token arithmetic
//! - [`clock`]: Injectable monotonic time sources
//! - [`bucket`]: The per-client token bucket state machine
//! - [`registry`]: Client identifier to bucket mapping with get-or-create

pub mod bucket;
pub mod clock;
pub mod rate;
pub mod registry;

pub use bucket::{BucketSnapshot, TokenBucket};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use rate::RefillRate;
pub use registry::{BucketRegistry, BucketRegistryBuilder};

use std::error::Error;
use std::fmt;

/// Errors that can occur when configuring or using a token bucket
///
/// Denial of a request is not an error: it is reported as `Ok(false)`.
/// These variants only describe invalid input.
///
/// # Example
///
/// ```
/// use bucketgate::{BucketError, BucketRegistry};
///
/// match BucketRegistry::<String>::new(0, 5) {
///     Err(BucketError::InvalidCapacity) => println!("capacity must be positive"),
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketError {
    /// Bucket capacity was zero
    InvalidCapacity,
    /// Refill rate was zero tokens per second
    InvalidRefillRate,
    /// A consume was requested for zero tokens
    InvalidAmount,
}

impl fmt::Display for BucketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketError::InvalidCapacity => write!(f, "bucket capacity must be positive"),
            BucketError::InvalidRefillRate => write!(f, "refill rate must be positive"),
            BucketError::InvalidAmount => write!(f, "consume amount must be positive"),
        }
    }
}

impl Error for BucketError {}
