//! Single token bucket.
//!
//! Tokens refill continuously at `refill_rate` per second up to `capacity`.
//! Each admitted request withdraws exactly one token.

use std::time::Instant;

/// Token bucket state for one client.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Current balance, always within `0.0..=capacity`
    tokens: f64,

    /// Maximum burst size
    capacity: f64,

    /// Tokens added per second
    refill_rate: f64,

    /// Last time the refill formula was applied
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: now,
        }
    }

    /// Refill for the time elapsed since the last call, then try to withdraw one token.
    ///
    /// Instants earlier than the last refill count as zero elapsed time.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let added = elapsed * self.refill_rate;

        if added > 0.0 {
            self.tokens = (self.tokens + added).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Current token balance.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}
