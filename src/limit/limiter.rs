//! Per-client rate limiter.
//!
//! Buckets are kept in a bounded concurrent map keyed by client identity.
//! Lookups and inserts never take a map-wide lock; each bucket has its own
//! mutex, so clients never contend on each other's token arithmetic.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

use super::bucket::TokenBucket;

/// Default number of tokens per client (maximum burst).
pub const DEFAULT_CAPACITY: f64 = 60.0;

/// Default refill rate in tokens per second.
pub const DEFAULT_REFILL_RATE: f64 = 1.0;

/// Default number of distinct clients tracked before eviction.
pub const DEFAULT_MAX_CLIENTS: usize = 10_000;

/// Rate limiter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_rate: f64,
    pub max_clients: usize,
}

impl RateLimitConfig {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    /// Estimated time until one more token is available: `1 / refill_rate`.
    ///
    /// Saturates at [`Duration::MAX`] for rates too small to represent.
    pub fn retry_after(&self) -> Duration {
        if self.refill_rate > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.refill_rate).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_REFILL_RATE)
    }
}

/// Denial details, enough to build rate-limit response headers.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitExceeded {
    /// Bucket capacity
    pub limit: f64,

    /// Estimated wait before retrying
    pub retry_after: Duration,
}

/// Token-bucket rate limiter with one bucket per client.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Cache<String, Arc<Mutex<TokenBucket>>>,
}

impl RateLimiter {
    /// Create a limiter. A `max_clients` of zero is treated as one.
    ///
    /// Once `max_clients` distinct clients are tracked, the least recently
    /// seen one is forgotten and starts over with a full bucket.
    pub fn new(config: RateLimitConfig) -> Self {
        let max_clients = config.max_clients.max(1) as u64;
        Self {
            config,
            buckets: Cache::builder()
                .max_capacity(max_clients)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    /// Whether a request from `client_id` is admitted right now.
    pub fn allow(&self, client_id: &str) -> bool {
        self.check(client_id).is_ok()
    }

    /// Admit a request from `client_id`, or report how long to back off.
    pub fn check(&self, client_id: &str) -> Result<(), RateLimitExceeded> {
        self.check_at(client_id, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, client_id: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        let bucket = self.bucket_for(client_id, now);
        let admitted = bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire(now);

        if admitted {
            Ok(())
        } else {
            debug!(client = client_id, "Rate limit exceeded");
            Err(RateLimitExceeded {
                limit: self.config.capacity,
                retry_after: self.config.retry_after(),
            })
        }
    }

    /// Existing bucket for `client_id`, or a full one inserted on first sight.
    ///
    /// Concurrent first requests from one client share a single insert.
    fn bucket_for(&self, client_id: &str, now: Instant) -> Arc<Mutex<TokenBucket>> {
        self.buckets.get_with_by_ref(client_id, || {
            Arc::new(Mutex::new(TokenBucket::new(
                self.config.capacity,
                self.config.refill_rate,
                now,
            )))
        })
    }

    /// Number of clients currently tracked.
    ///
    /// Applies pending evictions first, so the count is exact.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.run_pending_tasks();
        self.buckets.entry_count() as usize
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}
