//! Client identifier to bucket mapping
//!
//! The [`BucketRegistry`] is the single entry point callers use: it finds or
//! creates the bucket for a client and asks it for a decision. Map access is
//! the only place a lock is shared between clients, and it is held only to
//! look up or insert the bucket, never while consuming.

use super::{BucketError, Clock, MonotonicClock, RefillRate, TokenBucket};
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

const DEFAULT_INITIAL_CLIENTS: usize = 64;

/// Per-client token bucket rate limiter
///
/// Every client identifier gets its own bucket with the same capacity and
/// refill rate. Buckets are created on a client's first request, exactly once
/// even when several threads see that client for the first time together.
///
/// The registry is `Send + Sync`; share it behind an [`Arc`] and call it from
/// as many threads as needed.
///
/// # Example
///
/// ```
/// use bucketgate::BucketRegistry;
///
/// // 10 tokens per client, refilled at 5 tokens per second
/// let registry = BucketRegistry::new(10, 5).unwrap();
///
/// for _ in 0..10 {
///     assert!(registry.allow_request("c1"));
/// }
/// assert!(!registry.allow_request("c1"));
///
/// // Other clients are unaffected
/// assert!(registry.allow_request("c2"));
/// ```
pub struct BucketRegistry<K = String, C = MonotonicClock> {
    buckets: RwLock<HashMap<K, Arc<TokenBucket>>>,
    capacity: u64,
    rate: RefillRate,
    clock: C,
}

/// Builder for configuring a [`BucketRegistry`]
///
/// Capacity and refill rate must both be set to positive values.
///
/// # Example
///
/// ```
/// use bucketgate::{BucketRegistry, ManualClock};
///
/// let registry = BucketRegistry::<u64>::builder()
///     .capacity(100)
///     .refill_per_second(20)
///     .initial_clients(10_000)
///     .clock(ManualClock::new())
///     .build()
///     .unwrap();
///
/// assert!(registry.allow_request(&42u64));
/// ```
pub struct BucketRegistryBuilder<K, C = MonotonicClock> {
    capacity: u64,
    refill_per_second: u64,
    initial_clients: usize,
    clock: C,
    _key: PhantomData<fn() -> K>,
}

impl BucketRegistry {
    /// Create a registry keyed by `String` using the system monotonic clock
    ///
    /// # Errors
    ///
    /// - [`BucketError::InvalidCapacity`]: If `capacity` is zero
    /// - [`BucketError::InvalidRefillRate`]: If `refill_per_second` is zero
    pub fn new(capacity: u64, refill_per_second: u64) -> Result<Self, BucketError> {
        Self::builder()
            .capacity(capacity)
            .refill_per_second(refill_per_second)
            .build()
    }
}

impl<K: Eq + Hash> BucketRegistry<K> {
    /// Create a new builder for configuring a registry
    pub fn builder() -> BucketRegistryBuilder<K> {
        BucketRegistryBuilder::new()
    }
}

impl<K: Eq + Hash, C: Clock> BucketRegistry<K, C> {
    /// Admit or reject one request from `client`
    ///
    /// Creates the client's bucket on first sight, then tries to take a
    /// single token from it. Never blocks waiting for tokens.
    pub fn allow_request<Q>(&self, client: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let now = self.clock.now();
        let bucket = self.bucket_for(client, now);
        // amount is non-zero so this cannot fail
        bucket.try_consume(1, now).unwrap_or(false)
    }

    /// Try to take `amount` tokens from `client`'s bucket
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::InvalidAmount`] if `amount` is zero. No bucket is
    /// created in that case.
    pub fn try_acquire<Q>(&self, client: &Q, amount: u64) -> Result<bool, BucketError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if amount == 0 {
            return Err(BucketError::InvalidAmount);
        }
        let now = self.clock.now();
        self.bucket_for(client, now).try_consume(amount, now)
    }

    /// Tokens currently available to `client`
    ///
    /// Returns `None` for a client that has never made a request. Does not
    /// create a bucket.
    pub fn available<Q>(&self, client: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let bucket = self.buckets.read().get(client).map(Arc::clone)?;
        Some(bucket.available(self.clock.now()))
    }

    /// How long `client` must wait before `amount` tokens are available
    ///
    /// A client with no bucket yet would start full, so it only has to wait
    /// if `amount` exceeds capacity, which yields `None`.
    pub fn retry_after<Q>(&self, client: &Q, amount: u64) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if amount > self.capacity {
            return None;
        }
        let bucket = self.buckets.read().get(client).map(Arc::clone);
        match bucket {
            Some(bucket) => bucket.retry_after(amount, self.clock.now()),
            None => Some(Duration::ZERO),
        }
    }

    /// Whether `client` has a bucket
    pub fn contains<Q>(&self, client: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.buckets.read().contains_key(client)
    }

    /// Number of clients with a bucket
    pub fn len(&self) -> usize {
        self.buckets.read().len()
    }

    /// Whether no client has made a request yet
    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }

    /// Token capacity shared by every bucket
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Refill rate shared by every bucket
    pub fn rate(&self) -> RefillRate {
        self.rate
    }

    /// Drop buckets that have been idle for at least `max_idle`
    ///
    /// Only buckets that would be full right now are removed, so a client
    /// whose bucket is evicted gets back exactly the budget it would have had.
    /// Buckets in use by an in-flight request are kept. Returns the number of
    /// buckets removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = self.clock.now();
        let mut buckets = self.buckets.write();
        let before = buckets.len();

        // With the write lock held nobody can pick up a new reference, so a
        // strong count of one means no caller is mid-consume on this bucket.
        buckets.retain(|_, bucket| {
            Arc::strong_count(bucket) > 1 || !bucket.is_idle(now, max_idle)
        });

        let evicted = before - buckets.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = buckets.len(), "evicted idle buckets");
        }
        evicted
    }

    /// Find the bucket for `client`, creating it if this is its first request
    fn bucket_for<Q>(&self, client: &Q, now: Instant) -> Arc<TokenBucket>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(bucket) = self.buckets.read().get(client) {
            return Arc::clone(bucket);
        }

        // Another thread may have inserted between the two locks; the entry
        // API re-checks so only one bucket is ever built per client.
        let mut buckets = self.buckets.write();
        let bucket = buckets.entry(client.to_owned()).or_insert_with(|| {
            tracing::trace!(capacity = self.capacity, "creating bucket for new client");
            Arc::new(TokenBucket::full(self.capacity, self.rate, now))
        });
        Arc::clone(bucket)
    }
}

impl<K> BucketRegistryBuilder<K> {
    /// Create a new builder using the system monotonic clock
    pub fn new() -> Self {
        BucketRegistryBuilder {
            capacity: 0,
            refill_per_second: 0,
            initial_clients: DEFAULT_INITIAL_CLIENTS,
            clock: MonotonicClock,
            _key: PhantomData,
        }
    }
}

impl<K> Default for BucketRegistryBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, C> BucketRegistryBuilder<K, C> {
    /// Set the maximum number of tokens each bucket holds
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set how many tokens each bucket regains per second
    pub fn refill_per_second(mut self, tokens: u64) -> Self {
        self.refill_per_second = tokens;
        self
    }

    /// Pre-size the map for the expected number of distinct clients
    pub fn initial_clients(mut self, clients: usize) -> Self {
        self.initial_clients = clients;
        self
    }

    /// Use `clock` instead of the system monotonic clock
    pub fn clock<C2: Clock>(self, clock: C2) -> BucketRegistryBuilder<K, C2> {
        BucketRegistryBuilder {
            capacity: self.capacity,
            refill_per_second: self.refill_per_second,
            initial_clients: self.initial_clients,
            clock,
            _key: PhantomData,
        }
    }
}

impl<K: Eq + Hash, C: Clock> BucketRegistryBuilder<K, C> {
    /// Build the registry with the configured settings
    ///
    /// # Errors
    ///
    /// - [`BucketError::InvalidCapacity`]: If capacity is zero or was never set
    /// - [`BucketError::InvalidRefillRate`]: If the refill rate is zero or was never set
    pub fn build(self) -> Result<BucketRegistry<K, C>, BucketError> {
        if self.capacity == 0 {
            tracing::debug!("rejecting registry with zero capacity");
            return Err(BucketError::InvalidCapacity);
        }
        let rate = RefillRate::per_second(self.refill_per_second).inspect_err(|_| {
            tracing::debug!("rejecting registry with zero refill rate");
        })?;

        tracing::debug!(
            capacity = self.capacity,
            refill_per_second = self.refill_per_second,
            "configured bucket registry"
        );

        Ok(BucketRegistry {
            buckets: RwLock::new(HashMap::with_capacity(self.initial_clients)),
            capacity: self.capacity,
            rate,
            clock: self.clock,
        })
    }
}
