//! Refill rate for the token bucket
//!
//! This module provides the [`RefillRate`] type which converts elapsed time
//! into a whole number of earned tokens. Partial tokens are truncated, never
//! rounded up.

use super::BucketError;
use std::time::Duration;


const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Number of tokens added to a bucket per second of elapsed time
///
/// # Examples
///
/// ```
/// use bucketgate::RefillRate;
/// use std::time::Duration;
///
/// let rate = RefillRate::per_second(5).unwrap();
/// assert_eq!(rate.tokens_for(Duration::from_millis(1000)), 5);
/// // 199ms at 5/s is 0.995 tokens, which truncates to zero
/// assert_eq!(rate.tokens_for(Duration::from_millis(199)), 0);
/// assert_eq!(rate.period(), Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefillRate {
    tokens_per_second: u64,
}

impl RefillRate {
    /// Creates a rate of `n` tokens per second
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::InvalidRefillRate`] if `n` is zero.
    pub fn per_second(n: u64) -> Result<Self, BucketError> {
        if n == 0 {
            return Err(BucketError::InvalidRefillRate);
        }
        Ok(RefillRate {
            tokens_per_second: n,
        })
    }

    /// Returns the configured tokens per second
    pub fn tokens_per_second(&self) -> u64 {
        self.tokens_per_second
    }

    /// Whole tokens earned over `elapsed`
    ///
    /// Computes `floor(elapsed * rate)` in integer nanoseconds so no
    /// floating point error can creep in. Saturates at `u64::MAX`.
    pub fn tokens_for(&self, elapsed: Duration) -> u64 {
        let earned = elapsed
            .as_nanos()
            .saturating_mul(self.tokens_per_second as u128)
            / NANOS_PER_SEC;
        u64::try_from(earned).unwrap_or(u64::MAX)
    }

    /// Time needed to earn a single token
    pub fn period(&self) -> Duration {
        Duration::from_nanos((NANOS_PER_SEC / self.tokens_per_second as u128) as u64)
    }

    /// Shortest elapsed time after which [`tokens_for`](Self::tokens_for)
    /// returns at least `tokens`
    pub fn time_for(&self, tokens: u64) -> Duration {
        // ceil(tokens * 1e9 / rate)
        let rate = self.tokens_per_second as u128;
        let nanos = (tokens as u128 * NANOS_PER_SEC).div_ceil(rate);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}
