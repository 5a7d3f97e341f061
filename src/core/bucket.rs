//! Token bucket for a single client
//!
//! A [`TokenBucket`] holds a token count and the instant up to which refill
//! has been accounted for. Refill is lazy: nothing happens between calls, and
//! each call first credits the whole tokens earned since the baseline, then
//! tries to debit.

use super::{BucketError, RefillRate};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Point-in-time copy of a bucket's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    /// Tokens currently held, always within `0..=capacity`
    pub tokens: u64,
    /// Instant up to which refill has been credited
    pub last_refill: Instant,
}

#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

impl BucketState {
    /// Credit whole tokens earned since `last_refill`.
    ///
    /// The baseline only moves when at least one token is added, so elapsed
    /// time worth less than a token is measured again on the next call.
    fn refill(&mut self, capacity: u64, rate: RefillRate, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = rate.tokens_for(elapsed);
        if earned > 0 {
            self.tokens = capacity.min(self.tokens.saturating_add(earned));
            self.last_refill = now;
        }
    }
}

/// A token bucket with continuous, lazily applied refill
///
/// All reads and writes of the bucket state happen under one mutex that
/// belongs to this bucket alone, so two callers racing on the same bucket can
/// never both spend the last token.
///
/// # Example
///
/// ```
/// use bucketgate::{RefillRate, TokenBucket};
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let bucket = TokenBucket::new(2, RefillRate::per_second(1).unwrap(), start).unwrap();
///
/// assert!(bucket.try_consume(1, start).unwrap());
/// assert!(bucket.try_consume(1, start).unwrap());
/// assert!(!bucket.try_consume(1, start).unwrap());
///
/// let later = start + Duration::from_secs(1);
/// assert!(bucket.try_consume(1, later).unwrap());
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    rate: RefillRate,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket whose refill baseline is `now`
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: u64, rate: RefillRate, now: Instant) -> Result<Self, BucketError> {
        if capacity == 0 {
            return Err(BucketError::InvalidCapacity);
        }
        Ok(Self::full(capacity, rate, now))
    }

    /// Caller guarantees `capacity > 0`.
    pub(crate) fn full(capacity: u64, rate: RefillRate, now: Instant) -> Self {
        TokenBucket {
            capacity,
            rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    /// Maximum number of tokens this bucket can hold
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Refill rate of this bucket
    pub fn rate(&self) -> RefillRate {
        self.rate
    }

    /// Refill, then take `amount` tokens if that many are available
    ///
    /// Returns `Ok(true)` when the tokens were taken and `Ok(false)` when
    /// there were not enough, in which case the count is left untouched.
    /// Never waits for tokens to arrive.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::InvalidAmount`] if `amount` is zero.
    pub fn try_consume(&self, amount: u64, now: Instant) -> Result<bool, BucketError> {
        if amount == 0 {
            return Err(BucketError::InvalidAmount);
        }

        let mut state = self.state.lock();
        state.refill(self.capacity, self.rate, now);

        if state.tokens >= amount {
            state.tokens -= amount;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Tokens available at `now`, without consuming any
    pub fn available(&self, now: Instant) -> u64 {
        let mut state = self.state.lock();
        state.refill(self.capacity, self.rate, now);
        state.tokens
    }

    /// How long until `amount` tokens will be available
    ///
    /// Returns `Duration::ZERO` if they are available now and `None` if the
    /// bucket can never hold that many. Assumes no other consumer competes for
    /// the tokens in the meantime.
    pub fn retry_after(&self, amount: u64, now: Instant) -> Option<Duration> {
        if amount > self.capacity {
            return None;
        }

        let mut state = self.state.lock();
        state.refill(self.capacity, self.rate, now);
        if state.tokens >= amount {
            return Some(Duration::ZERO);
        }

        // Time already accrued towards the next token counts
        let missing = amount - state.tokens;
        let accrued = now.saturating_duration_since(state.last_refill);
        Some(self.rate.time_for(missing).saturating_sub(accrued))
    }

    /// Copy of the current state, without refilling
    pub fn snapshot(&self) -> BucketSnapshot {
        let state = self.state.lock();
        BucketSnapshot {
            tokens: state.tokens,
            last_refill: state.last_refill,
        }
    }

    /// Whether the bucket would be full at `now` and has not been refilled
    /// for at least `max_idle`
    pub(crate) fn is_idle(&self, now: Instant, max_idle: Duration) -> bool {
        let state = self.state.lock();
        let elapsed = now.saturating_duration_since(state.last_refill);
        elapsed >= max_idle
            && state.tokens.saturating_add(self.rate.tokens_for(elapsed)) >= self.capacity
    }
}
