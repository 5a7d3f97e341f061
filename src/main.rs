mod config;
mod metrics;

use anyhow::Result;
use bucketgate::BucketRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{Config, LoadConfig};
use crate::metrics::Metrics;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("bucketgate={}", config.log_level).parse()?),
        )
        .init();

    let limiter = Arc::new(BucketRegistry::new(
        config.limiter.capacity,
        config.limiter.refill_per_second,
    )?);
    let metrics = Arc::new(Metrics::new());
    let clients = config.load.client_ids();

    tracing::info!(
        "Starting simulation for {} client(s): {}",
        clients.len(),
        clients.join(", ")
    );
    tracing::info!(
        "Capacity: {}, Refill Rate: {} tokens/sec",
        config.limiter.capacity,
        config.limiter.refill_per_second
    );

    let evictor = (config.limiter.evict_idle_secs > 0).then(|| {
        spawn_evictor(
            Arc::clone(&limiter),
            Arc::clone(&metrics),
            Duration::from_secs(config.limiter.evict_idle_secs),
        )
    });

    let start = Instant::now();
    let workers = Arc::new(Semaphore::new(config.load.workers));

    run_wave(
        &limiter,
        &metrics,
        &workers,
        &config.load,
        &clients,
        config.load.burst_requests,
        start,
    )
    .await?;

    tokio::time::sleep(Duration::from_millis(config.load.pause_ms)).await;
    tracing::info!(
        "--- After {}ms pause (should be refilled) ---",
        config.load.pause_ms
    );

    run_wave(
        &limiter,
        &metrics,
        &workers,
        &config.load,
        &clients,
        config.load.followup_requests,
        start,
    )
    .await?;

    if let Some(evictor) = evictor {
        evictor.abort();
    }

    metrics.log_summary(limiter.len());
    Ok(())
}

/// Submit `requests` decisions per client and wait for all of them
///
/// At most `workers` requests are in flight. After deciding, a worker keeps
/// its slot for a short staggered delay so arrival times spread out.
async fn run_wave(
    limiter: &Arc<BucketRegistry>,
    metrics: &Arc<Metrics>,
    workers: &Arc<Semaphore>,
    load: &LoadConfig,
    clients: &[String],
    requests: usize,
    start: Instant,
) -> Result<()> {
    let mut tasks = JoinSet::new();

    for i in 0..requests {
        for client in clients {
            let limiter = Arc::clone(limiter);
            let metrics = Arc::clone(metrics);
            let workers = Arc::clone(workers);
            let client = client.clone();
            let jitter = jitter(i, load.max_jitter_ms);

            tasks.spawn(async move {
                let _permit = workers.acquire_owned().await?;

                let decided_at = Instant::now();
                let allowed = limiter.allow_request(client.as_str());
                metrics.record_decision(allowed, decided_at.elapsed());

                let verdict = if allowed { "ALLOWED" } else { "DENIED" };
                tracing::info!(
                    client = %client,
                    "Request {} at {}ms",
                    verdict,
                    start.elapsed().as_millis()
                );

                tokio::time::sleep(jitter).await;
                anyhow::Ok(())
            });
        }
    }

    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("Worker failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Worker panicked: {}", e);
                return Err(anyhow::anyhow!("Worker panicked"));
            }
        }
    }

    Ok(())
}

/// Periodically drop buckets that have been idle for `max_idle`
fn spawn_evictor(
    limiter: Arc<BucketRegistry>,
    metrics: Arc<Metrics>,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(max_idle);
        loop {
            ticker.tick().await;
            let evicted = limiter.evict_idle(max_idle);
            metrics.record_evictions(evicted);
        }
    })
}

/// Deterministic spread of worker delays in `0..=max_ms`
fn jitter(request: usize, max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis((request as u64).wrapping_mul(37) % (max_ms + 1))
}
