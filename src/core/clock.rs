//! Time sources for the token bucket
//!
//! Buckets never read the system clock directly. The registry asks its
//! [`Clock`] for the current instant, so tests can move time forward
//! deterministically with a [`ManualClock`] instead of sleeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A monotonic source of "now"
pub trait Clock: Send + Sync {
    /// Returns the current instant
    fn now(&self) -> Instant;
}

/// Reads [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
///
/// Share it between the registry and the test body with an [`Arc`]:
///
/// ```
/// use bucketgate::{BucketRegistry, ManualClock};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new());
/// let registry = BucketRegistry::<String, _>::builder()
///     .capacity(1)
///     .refill_per_second(1)
///     .clock(Arc::clone(&clock))
///     .build()
///     .unwrap();
///
/// assert!(registry.allow_request("c1"));
/// assert!(!registry.allow_request("c1"));
///
/// clock.advance(Duration::from_secs(1));
/// assert!(registry.allow_request("c1"));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a clock frozen at `origin`
    pub fn starting_at(origin: Instant) -> Self {
        ManualClock {
            origin,
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Move the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        // fetch_update never fails with a closure that always returns Some
        let _ = self
            .offset_nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(nanos))
            });
    }

    /// Total time this clock has been advanced
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::Acquire))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now(&self) -> Instant {
        (**self).now()
    }
}
