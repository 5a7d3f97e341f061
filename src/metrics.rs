//! Decision counters for the demo
//!
//! Lightweight atomic counters, safe to update from every worker without
//! locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters collected while driving load through the limiter
pub struct Metrics {
    /// Demo start time
    start_time: Instant,

    /// Total decisions made
    pub total_requests: AtomicU64,

    /// Admit/deny outcomes
    pub requests_allowed: AtomicU64,
    pub requests_denied: AtomicU64,

    /// Decision latency buckets
    pub latency_under_1us: AtomicU64,
    pub latency_under_10us: AtomicU64,
    pub latency_under_100us: AtomicU64,
    pub latency_over_100us: AtomicU64,

    pub latency_sum_nanos: AtomicU64,

    /// Buckets removed by idle eviction
    pub evictions: AtomicU64,
}

/// Plain copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub allowed: u64,
    pub denied: u64,
    pub evictions: u64,
    pub mean_latency: Duration,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            requests_allowed: AtomicU64::new(0),
            requests_denied: AtomicU64::new(0),
            latency_under_1us: AtomicU64::new(0),
            latency_under_10us: AtomicU64::new(0),
            latency_under_100us: AtomicU64::new(0),
            latency_over_100us: AtomicU64::new(0),
            latency_sum_nanos: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Record one admit/deny decision and how long it took
    pub fn record_decision(&self, allowed: bool, latency: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if allowed {
            self.requests_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_denied.fetch_add(1, Ordering::Relaxed);
        }

        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        match nanos {
            0..=999 => self.latency_under_1us.fetch_add(1, Ordering::Relaxed),
            1_000..=9_999 => self.latency_under_10us.fetch_add(1, Ordering::Relaxed),
            10_000..=99_999 => self.latency_under_100us.fetch_add(1, Ordering::Relaxed),
            _ => self.latency_over_100us.fetch_add(1, Ordering::Relaxed),
        };

        self.latency_sum_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Record buckets removed by an eviction pass
    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Time since the metrics were created
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let sum = self.latency_sum_nanos.load(Ordering::Relaxed);
        MetricsSnapshot {
            total,
            allowed: self.requests_allowed.load(Ordering::Relaxed),
            denied: self.requests_denied.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            mean_latency: Duration::from_nanos(sum.checked_div(total).unwrap_or(0)),
        }
    }

    /// Log a one-shot summary of everything recorded so far
    pub fn log_summary(&self, active_clients: usize) {
        let snapshot = self.snapshot();
        tracing::info!(
            total = snapshot.total,
            allowed = snapshot.allowed,
            denied = snapshot.denied,
            evictions = snapshot.evictions,
            active_clients,
            "Simulation finished in {}ms",
            self.elapsed().as_millis()
        );
        tracing::debug!(
            mean_latency_ns = snapshot.mean_latency.as_nanos() as u64,
            under_1us = self.latency_under_1us.load(Ordering::Relaxed),
            under_10us = self.latency_under_10us.load(Ordering::Relaxed),
            under_100us = self.latency_under_100us.load(Ordering::Relaxed),
            over_100us = self.latency_over_100us.load(Ordering::Relaxed),
            "Decision latency"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_decisions() {
        let metrics = Metrics::new();
        metrics.record_decision(true, Duration::from_nanos(500));
        metrics.record_decision(true, Duration::from_nanos(1_500));
        metrics.record_decision(false, Duration::from_micros(200));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.allowed, 2);
        assert_eq!(snapshot.denied, 1);
        assert_eq!(snapshot.mean_latency, Duration::from_nanos(67_333));

        assert_eq!(metrics.latency_under_1us.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_10us.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_over_100us.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.mean_latency, Duration::ZERO);
    }

    #[test]
    fn test_evictions() {
        let metrics = Metrics::new();
        metrics.record_evictions(3);
        metrics.record_evictions(0);
        assert_eq!(metrics.snapshot().evictions, 3);
    }
}
