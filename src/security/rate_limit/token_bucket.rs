//! In-process token buckets keyed by client.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::{RateLimitStore, StorageError};

/// A single client's budget.
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_per_sec: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets for every client seen, created lazily.
///
/// The refill-and-consume step runs while holding the map shard's write
/// lock for that key, so concurrent requests from one client serialize.
#[derive(Debug)]
pub struct TokenBucketStore {
    buckets: DashMap<String, TokenBucket>,
    capacity: f64,
    refill_per_sec: f64,
    idle_ttl: Duration,
}

impl TokenBucketStore {
    /// `capacity` tokens, refilled completely over `interval`.
    pub fn new(capacity: u32, interval: Duration, idle_eviction_factor: u32) -> Self {
        let capacity = capacity as f64;
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_per_sec: capacity / interval.as_secs_f64(),
            idle_ttl: interval.saturating_mul(idle_eviction_factor.max(1)),
        }
    }

    pub fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));
        bucket.try_acquire(self.capacity, self.refill_per_sec, now)
    }

    /// Remaining tokens for `key` as of its last update.
    pub fn tokens(&self, key: &str) -> Option<f64> {
        self.buckets.get(key).map(|b| b.tokens)
    }

    /// Drop buckets untouched for longer than the idle TTL. Returns how many were removed.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) <= self.idle_ttl);
        before.saturating_sub(self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl RateLimitStore for TokenBucketStore {
    async fn try_acquire(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.try_acquire_at(key, Instant::now()))
    }
}
