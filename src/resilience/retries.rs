//! Retry policy.
//!
//! # Design Decisions
//! - Retry only idempotent methods (GET, HEAD, OPTIONS, PUT, DELETE)
//! - Retry only connect failures and upstream timeouts, never a response
//! - Fixed backoff between attempts
//! - A streamed body cannot be replayed, so it gets exactly one attempt

use std::time::Duration;

use axum::http::Method;

use crate::config::RetryConfig;

/// Why an upstream attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// TCP connect refused, unreachable or timed out.
    Connect,
    /// No response head within the request timeout.
    Timeout,
    /// Anything else (connection reset mid-exchange, protocol error).
    Other,
}

impl UpstreamFailure {
    pub fn is_transient(self) -> bool {
        matches!(self, UpstreamFailure::Connect | UpstreamFailure::Timeout)
    }
}

pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    enabled: bool,
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Total attempts allowed for a request.
    pub fn attempts_for(&self, method: &Method, replayable: bool) -> u32 {
        if self.enabled && replayable && is_idempotent(method) {
            self.max_attempts
        } else {
            1
        }
    }

    /// Whether attempt number `attempt` (1-based) may be followed by another.
    pub fn should_retry(&self, method: &Method, replayable: bool, attempt: u32, failure: UpstreamFailure) -> bool {
        failure.is_transient() && attempt < self.attempts_for(method, replayable)
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig::default())
    }

    #[test]
    fn idempotent_methods() {
        for m in [Method::GET, Method::HEAD, Method::OPTIONS, Method::PUT, Method::DELETE] {
            assert!(is_idempotent(&m), "{m}");
        }
        for m in [Method::POST, Method::PATCH] {
            assert!(!is_idempotent(&m), "{m}");
        }
    }

    #[test]
    fn get_retries_once_on_connect_failure() {
        let p = policy();
        assert!(p.should_retry(&Method::GET, true, 1, UpstreamFailure::Connect));
        assert!(p.should_retry(&Method::GET, true, 1, UpstreamFailure::Timeout));
        assert!(!p.should_retry(&Method::GET, true, 2, UpstreamFailure::Connect));
    }

    #[test]
    fn post_is_never_retried() {
        let p = policy();
        assert_eq!(p.attempts_for(&Method::POST, true), 1);
        assert!(!p.should_retry(&Method::POST, true, 1, UpstreamFailure::Connect));
        assert!(!p.should_retry(&Method::PATCH, true, 1, UpstreamFailure::Timeout));
    }

    #[test]
    fn non_transient_and_streamed_are_not_retried() {
        let p = policy();
        assert!(!p.should_retry(&Method::GET, true, 1, UpstreamFailure::Other));
        assert!(!p.should_retry(&Method::PUT, false, 1, UpstreamFailure::Connect));
    }

    #[test]
    fn disabled_policy_is_single_attempt() {
        let p = RetryPolicy::from_config(&RetryConfig {
            enabled: false,
            ..RetryConfig::default()
        });
        assert_eq!(p.attempts_for(&Method::GET, true), 1);
        assert_eq!(policy().backoff(), Duration::from_millis(200));
    }
}
