//! Redis-backed fixed window counters.
//!
//! Each request runs `INCR <prefix><client>:<window>` and `EXPIRE` in one
//! MULTI/EXEC pipeline, so the increment and the admit decision are atomic
//! across every gateway instance sharing the store.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use super::{RateLimitStore, StorageError};

pub struct FixedWindowStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    key_prefix: String,
    limit: u64,
    window: Duration,
    timeout: Duration,
}

impl FixedWindowStore {
    /// Build the store. No connection is made until the first request.
    pub fn new(
        redis_url: &str,
        key_prefix: impl Into<String>,
        limit: u32,
        window: Duration,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StorageError::Connection(format!("invalid Redis URL: {e}")))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            key_prefix: key_prefix.into(),
            limit: limit as u64,
            window: Duration::from_secs(window.as_secs().max(1)),
            timeout,
        })
    }

    /// Counter key for `client` in the window containing `now`.
    pub fn window_key(&self, client: &str, now: SystemTime) -> String {
        let epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let window_id = epoch / self.window.as_secs();
        format!("{}{}:{}", self.key_prefix, client, window_id)
    }

    async fn connection(&self) -> Result<ConnectionManager, StorageError> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                self.client
                    .get_connection_manager()
                    .await
                    .map_err(|e| StorageError::Connection(e.to_string()))
            })
            .await?;
        Ok(conn.clone())
    }

    async fn increment(&self, key: &str) -> Result<u64, StorageError> {
        let mut conn = self.connection().await?;
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, self.window.as_secs() as i64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(count)
    }
}

impl RateLimitStore for FixedWindowStore {
    async fn try_acquire(&self, key: &str) -> Result<bool, StorageError> {
        let key = self.window_key(key, SystemTime::now());

        let count = tokio::time::timeout(self.timeout, self.increment(&key))
            .await
            .map_err(|_| StorageError::Timeout(self.timeout))??;

        Ok(count <= self.limit)
    }
}
