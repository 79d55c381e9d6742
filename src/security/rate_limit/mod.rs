//! Per-client rate limiting.
//!
//! # Data Flow
//! ```text
//! client key (peer IP or first X-Forwarded-For hop)
//!     → RateLimiter::check
//!     → store (token_bucket.rs in process, fixed_window.rs in Redis)
//!     → Admit / Reject
//! ```
//!
//! # Design Decisions
//! - The limiter owns its keyed store; the dispatcher only holds a handle
//! - A failing counter store admits the request and logs a warning
//! - Idle in-process buckets are swept in the background

pub mod fixed_window;
pub mod token_bucket;

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use tokio::sync::broadcast;

use crate::config::{RateLimitConfig, RateLimitStrategy};
use crate::observability::metrics;
use crate::security::headers::forwarded_client_ip;

pub use fixed_window::FixedWindowStore;
pub use token_bucket::TokenBucketStore;

/// Errors from a counter store. Never surfaced to clients.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("counter store connection failed: {0}")]
    Connection(String),
    #[error("counter store query failed: {0}")]
    Query(String),
    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),
}

/// A keyed counter store that atomically decides and records one request.
#[allow(async_fn_in_trait)]
pub trait RateLimitStore: Send + Sync {
    /// Consume one unit of `key`'s budget. `Ok(false)` means the budget is exhausted.
    async fn try_acquire(&self, key: &str) -> Result<bool, StorageError>;
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject,
}

enum Storage {
    TokenBucket(TokenBucketStore),
    FixedWindow(FixedWindowStore),
}

impl Storage {
    async fn try_acquire(&self, key: &str) -> Result<bool, StorageError> {
        match self {
            Storage::TokenBucket(store) => store.try_acquire(key).await,
            Storage::FixedWindow(store) => store.try_acquire(key).await,
        }
    }
}

pub struct RateLimiter {
    storage: Storage,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, StorageError> {
        let interval = Duration::from_secs(config.interval_secs);
        let storage = match config.strategy {
            RateLimitStrategy::TokenBucket => Storage::TokenBucket(TokenBucketStore::new(
                config.capacity,
                interval,
                config.idle_eviction_factor,
            )),
            RateLimitStrategy::FixedWindow => Storage::FixedWindow(FixedWindowStore::new(
                &config.redis_url,
                config.key_prefix.clone(),
                config.capacity,
                interval,
                Duration::from_millis(config.store_timeout_ms),
            )?),
        };

        tracing::info!(
            enabled = config.enabled,
            strategy = ?config.strategy,
            capacity = config.capacity,
            interval_secs = config.interval_secs,
            "Rate limiter configured"
        );

        Ok(Self {
            storage,
            config: config.clone(),
        })
    }

    /// Seconds a rejected client is told to wait.
    pub fn retry_after_secs(&self) -> u64 {
        self.config.interval_secs
    }

    /// Key identifying the client behind a request.
    pub fn client_key(&self, peer: &SocketAddr, headers: &HeaderMap) -> String {
        let ip: IpAddr = if self.config.trust_forwarded_for {
            forwarded_client_ip(headers).unwrap_or_else(|| peer.ip())
        } else {
            peer.ip()
        };
        ip.to_string()
    }

    /// Admit or reject one request from `key`.
    pub async fn check(&self, key: &str) -> Decision {
        if !self.config.enabled {
            return Decision::Admit;
        }

        match self.storage.try_acquire(key).await {
            Ok(true) => Decision::Admit,
            Ok(false) => {
                tracing::warn!(client = %key, "Rate limit exceeded");
                metrics::record_rate_limited("budget_exhausted");
                Decision::Reject
            }
            Err(e) => {
                tracing::warn!(client = %key, error = %e, "Rate limit store unavailable, admitting request");
                metrics::record_rate_limit_store_error();
                Decision::Admit
            }
        }
    }

    /// Periodically evict idle in-process buckets until shutdown.
    /// Returns immediately for stores that expire their own keys.
    pub async fn run_sweeper(&self, mut shutdown: broadcast::Receiver<()>) {
        let Storage::TokenBucket(store) = &self.storage else {
            return;
        };

        let period = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = store.evict_idle(Instant::now());
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = store.len(), "Evicted idle rate limit buckets");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(capacity: u32) -> RateLimitConfig {
        RateLimitConfig {
            capacity,
            ..RateLimitConfig::default()
        }
    }

    #[tokio::test]
    async fn rejects_when_budget_exhausted() {
        let limiter = RateLimiter::from_config(&config(2)).unwrap();
        assert_eq!(limiter.check("c").await, Decision::Admit);
        assert_eq!(limiter.check("c").await, Decision::Admit);
        assert_eq!(limiter.check("c").await, Decision::Reject);
    }

    #[tokio::test]
    async fn disabled_limiter_admits_everything() {
        let mut cfg = config(1);
        cfg.enabled = false;
        let limiter = RateLimiter::from_config(&cfg).unwrap();
        for _ in 0..10 {
            assert_eq!(limiter.check("c").await, Decision::Admit);
        }
    }

    #[tokio::test]
    async fn fails_open_when_store_unreachable() {
        let cfg = RateLimitConfig {
            strategy: RateLimitStrategy::FixedWindow,
            redis_url: "redis://127.0.0.1:1".into(),
            store_timeout_ms: 100,
            capacity: 1,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::from_config(&cfg).unwrap();
        for _ in 0..3 {
            assert_eq!(limiter.check("c").await, Decision::Admit);
        }
    }

    #[test]
    fn client_key_prefers_forwarded_for_only_when_trusted() {
        let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5"));

        let limiter = RateLimiter::from_config(&config(1)).unwrap();
        assert_eq!(limiter.client_key(&peer, &headers), "10.0.0.1");

        let trusting = RateLimiter::from_config(&RateLimitConfig {
            trust_forwarded_for: true,
            ..config(1)
        })
        .unwrap();
        assert_eq!(trusting.client_key(&peer, &headers), "203.0.113.5");
        assert_eq!(trusting.client_key(&peer, &HeaderMap::new()), "10.0.0.1");
    }
}
