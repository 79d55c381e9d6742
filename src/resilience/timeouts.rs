//! Timeout enforcement for upstream calls.
//!
//! # Design Decisions
//! - Connect timeout is enforced by the connector, so it surfaces as a connect error
//! - Request timeout bounds the wait for the response head, not body streaming
//! - Both count as transient failures for the retry policy

use std::future::Future;
use std::time::Duration;

use crate::config::TimeoutConfig;

#[derive(Debug, Clone, Copy)]
pub struct UpstreamTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl UpstreamTimeouts {
    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self {
            connect: Duration::from_millis(config.connect_ms),
            request: Duration::from_secs(config.request_secs),
        }
    }

    /// Run `fut` under the request deadline. `None` means it timed out.
    pub async fn within_request_deadline<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::time::timeout(self.request, fut).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_elapses() {
        let timeouts = UpstreamTimeouts {
            connect: Duration::from_millis(10),
            request: Duration::from_millis(20),
        };
        let slow = tokio::time::sleep(Duration::from_millis(200));
        assert!(timeouts.within_request_deadline(slow).await.is_none());
        assert_eq!(timeouts.within_request_deadline(async { 7 }).await, Some(7));
    }
}
