//! Demo configuration and CLI argument parsing
//!
//! Every option can be given on the command line or through an environment
//! variable with the `BUCKETGATE_` prefix.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # The classic run: one client, 10 tokens, 5 per second
//! bucketgate
//!
//! # Three clients hammering a smaller bucket
//! export BUCKETGATE_CAPACITY=4
//! bucketgate --clients 3 --burst-requests 12
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use serde::Deserialize;

/// Main configuration structure for the demo
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bucket settings shared by every client
    pub limiter: LimiterConfig,
    /// Shape of the generated load
    pub load: LoadConfig,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Bucket settings applied to every client
#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    /// Maximum tokens per client
    pub capacity: u64,
    /// Tokens regained per second
    pub refill_per_second: u64,
    /// Evict buckets idle for this many seconds (0 disables eviction)
    pub evict_idle_secs: u64,
}

/// Load generated against the limiter
#[derive(Debug, Clone, Deserialize)]
pub struct LoadConfig {
    /// Prefix for generated client identifiers
    pub client_prefix: String,
    /// Number of distinct clients
    pub clients: usize,
    /// Maximum requests in flight at once
    pub workers: usize,
    /// Requests per client in the first wave
    pub burst_requests: usize,
    /// Pause between the two waves (milliseconds)
    pub pause_ms: u64,
    /// Requests per client in the second wave
    pub followup_requests: usize,
    /// Upper bound for the delay a worker holds its slot after a request (milliseconds)
    pub max_jitter_ms: u64,
}

impl LoadConfig {
    /// Client identifiers in a stable order: `<prefix>-1`, `<prefix>-2`, ...
    pub fn client_ids(&self) -> Vec<String> {
        (1..=self.clients)
            .map(|n| format!("{}-{}", self.client_prefix, n))
            .collect()
    }
}

/// Command-line arguments for the demo
///
/// All arguments can also be set via environment variables with the
/// BUCKETGATE_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "bucketgate",
    about = "Drive concurrent load through a per-client token bucket limiter",
    long_about = "Fires a burst of requests per client from a bounded worker pool, pauses so the buckets refill, then fires a second wave. Every admit/deny decision is logged.\n\nEnvironment variables with BUCKETGATE_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // Limiter
    #[arg(
        long,
        value_name = "TOKENS",
        help = "Bucket capacity per client",
        default_value_t = 10,
        env = "BUCKETGATE_CAPACITY"
    )]
    pub capacity: u64,
    #[arg(
        long,
        value_name = "TOKENS",
        help = "Tokens refilled per second",
        default_value_t = 5,
        env = "BUCKETGATE_REFILL_PER_SECOND"
    )]
    pub refill_per_second: u64,
    #[arg(
        long,
        value_name = "SECS",
        help = "Evict buckets idle for this long (0 disables)",
        default_value_t = 0,
        env = "BUCKETGATE_EVICT_IDLE_SECS"
    )]
    pub evict_idle_secs: u64,

    // Load
    #[arg(
        long,
        value_name = "PREFIX",
        help = "Client identifier prefix",
        default_value = "client",
        env = "BUCKETGATE_CLIENT_PREFIX"
    )]
    pub client_prefix: String,
    #[arg(
        long,
        value_name = "N",
        help = "Number of distinct clients",
        default_value_t = 1,
        env = "BUCKETGATE_CLIENTS"
    )]
    pub clients: usize,
    #[arg(
        long,
        value_name = "N",
        help = "Maximum requests in flight",
        default_value_t = 10,
        env = "BUCKETGATE_WORKERS"
    )]
    pub workers: usize,
    #[arg(
        long,
        value_name = "N",
        help = "Requests per client in the first wave",
        default_value_t = 20,
        env = "BUCKETGATE_BURST_REQUESTS"
    )]
    pub burst_requests: usize,
    #[arg(
        long,
        value_name = "MS",
        help = "Pause between waves in milliseconds",
        default_value_t = 2000,
        env = "BUCKETGATE_PAUSE_MS"
    )]
    pub pause_ms: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Requests per client in the second wave",
        default_value_t = 10,
        env = "BUCKETGATE_FOLLOWUP_REQUESTS"
    )]
    pub followup_requests: usize,
    #[arg(
        long,
        value_name = "MS",
        help = "Maximum per-request worker delay in milliseconds",
        default_value_t = 50,
        env = "BUCKETGATE_MAX_JITTER_MS"
    )]
    pub max_jitter_ms: u64,

    // General options
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "BUCKETGATE_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let config = Self::from_args(args);
        config.validate()?;
        Ok(config)
    }

    fn from_args(args: Args) -> Self {
        Config {
            limiter: LimiterConfig {
                capacity: args.capacity,
                refill_per_second: args.refill_per_second,
                evict_idle_secs: args.evict_idle_secs,
            },
            load: LoadConfig {
                client_prefix: args.client_prefix,
                clients: args.clients,
                workers: args.workers,
                burst_requests: args.burst_requests,
                pause_ms: args.pause_ms,
                followup_requests: args.followup_requests,
                max_jitter_ms: args.max_jitter_ms,
            },
            log_level: args.log_level,
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    fn validate(&self) -> Result<()> {
        if self.limiter.capacity == 0 {
            return Err(anyhow!("--capacity must be at least 1"));
        }
        if self.limiter.refill_per_second == 0 {
            return Err(anyhow!("--refill-per-second must be at least 1"));
        }
        if self.load.clients == 0 {
            return Err(anyhow!("--clients must be at least 1"));
        }
        if self.load.workers == 0 {
            return Err(anyhow!("--workers must be at least 1"));
        }
        Ok(())
    }

    fn print_env_vars() {
        println!("bucketgate Environment Variables");
        println!("================================");
        println!();
        println!("All environment variables use the BUCKETGATE_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Limiter Configuration:");
        println!("  BUCKETGATE_CAPACITY=<tokens>           Bucket capacity per client [default: 10]");
        println!("  BUCKETGATE_REFILL_PER_SECOND=<tokens>  Tokens refilled per second [default: 5]");
        println!(
            "  BUCKETGATE_EVICT_IDLE_SECS=<secs>      Evict buckets idle this long, 0 disables [default: 0]"
        );
        println!();

        println!("Load Configuration:");
        println!("  BUCKETGATE_CLIENT_PREFIX=<prefix>      Client identifier prefix [default: client]");
        println!("  BUCKETGATE_CLIENTS=<n>                 Number of distinct clients [default: 1]");
        println!("  BUCKETGATE_WORKERS=<n>                 Maximum requests in flight [default: 10]");
        println!("  BUCKETGATE_BURST_REQUESTS=<n>          First wave size per client [default: 20]");
        println!("  BUCKETGATE_PAUSE_MS=<ms>               Pause between waves [default: 2000]");
        println!("  BUCKETGATE_FOLLOWUP_REQUESTS=<n>       Second wave size per client [default: 10]");
        println!("  BUCKETGATE_MAX_JITTER_MS=<ms>          Maximum worker delay [default: 50]");
        println!();

        println!("General Configuration:");
        println!(
            "  BUCKETGATE_LOG_LEVEL=<level>           Log level: error, warn, info, debug, trace [default: info]"
        );
    }
}
