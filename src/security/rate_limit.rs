//! Per-client token bucket rate limiting.

use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::security::client_ip::ClientIdentity;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// One bucket per client, created lazily at full capacity.
///
/// Buckets are never evicted; the map grows with the number of distinct
/// clients seen over the process lifetime.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<ClientIdentity, TokenBucket>,
    refill_rate: f64,
    capacity: f64,
}

impl RateLimiter {
    /// Create a limiter refilling `refill_rate` tokens/second up to `burst`.
    pub fn new(refill_rate: f64, burst: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            refill_rate,
            capacity: f64::from(burst),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    /// Spend one token for `client`. Returns false when the bucket is empty.
    pub fn allow(&self, client: &ClientIdentity) -> bool {
        let now = Instant::now();
        // The entry guard holds the shard lock, so refill and consume are
        // atomic for this key without blocking other shards.
        let mut bucket = self
            .buckets
            .entry(*client)
            .or_insert_with(|| TokenBucket::new(self.capacity, now));

        bucket.try_acquire(self.capacity, self.refill_rate, now)
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}
