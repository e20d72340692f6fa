//! Per-client admission control.
//!
//! ```text
//! client id ──► RateLimiter ──► moka Cache<client, Arc<Mutex<TokenBucket>>>
//!                   │
//!                   └─► Ok(()) | Err(RateLimitExceeded { limit, retry_after })
//! ```
//!
//! [`RateLimiter::check`] never blocks or queues; it answers immediately.

mod bucket;
mod limiter;

pub use bucket::TokenBucket;
pub use limiter::{
    RateLimitConfig, RateLimitExceeded, RateLimiter, DEFAULT_CAPACITY, DEFAULT_MAX_CLIENTS,
    DEFAULT_REFILL_RATE,
};
