//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, mount path).
    pub listener: ListenerConfig,

    /// Routing table: one entry per backend service.
    pub routes: Vec<RouteConfig>,

    /// Bearer token verification.
    pub auth: AuthConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Upstream timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            routes: default_routes(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            retries: RetryConfig::default(),
            cors: CorsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_routes() -> Vec<RouteConfig> {
    let mut users = RouteConfig::new("users", "http://users-service:8000");
    users.public_paths = vec![
        "/login".to_string(),
        "/register".to_string(),
        "/token/refresh".to_string(),
    ];

    vec![
        users,
        RouteConfig::new("posts", "http://posts-service:8000"),
        RouteConfig::new("activities", "http://activities-service:8000"),
        RouteConfig::new("events", "http://events-service:8000"),
        RouteConfig::new("social", "http://social-service:8000"),
    ]
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Optional path prefix every proxied request lives under (e.g. "/api/v1").
    pub mount_path: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            mount_path: None,
        }
    }
}

/// A backend service reachable through the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Service key, the first path segment of inbound requests.
    pub name: String,

    /// Backend base URL (e.g., "http://users-service:8000").
    pub base_url: String,

    /// Paths below the service that skip authentication.
    /// Exact match, or prefix match when the pattern ends in `*`.
    #[serde(default)]
    pub public_paths: Vec<String>,

    /// Methods that skip authentication on every path of this service.
    #[serde(default)]
    pub public_methods: Vec<String>,
}

impl RouteConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            public_paths: Vec::new(),
            public_methods: Vec::new(),
        }
    }
}

/// Bearer token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HMAC signing secret.
    pub secret: String,

    /// Signing algorithm identifier (HS256, HS384, HS512).
    pub algorithm: String,

    /// Clock skew tolerated when checking `exp`, in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            secret: "change-me".to_string(),
            algorithm: "HS256".to_string(),
            leeway_secs: 0,
        }
    }
}

/// Which rate limiting algorithm and store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    /// In-process token buckets, one per client.
    TokenBucket,
    /// Fixed window counters in Redis.
    FixedWindow,
}

impl std::str::FromStr for RateLimitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token_bucket" => Ok(Self::TokenBucket),
            "fixed_window" => Ok(Self::FixedWindow),
            other => Err(format!("unknown rate limit strategy '{}'", other)),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Algorithm (and therefore store) to use.
    pub strategy: RateLimitStrategy,

    /// Bucket capacity / requests allowed per window.
    pub capacity: u32,

    /// Refill interval (token bucket) or window length (fixed window) in seconds.
    pub interval_secs: u64,

    /// Redis URL for the fixed window store.
    pub redis_url: String,

    /// Prefix for fixed window counter keys.
    pub key_prefix: String,

    /// Deadline for a single counter store round trip in milliseconds.
    pub store_timeout_ms: u64,

    /// Buckets idle for this many intervals are evicted.
    pub idle_eviction_factor: u32,

    /// How often the idle bucket sweep runs, in seconds.
    pub sweep_interval_secs: u64,

    /// Key clients by the first X-Forwarded-For address instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: RateLimitStrategy::TokenBucket,
            capacity: 100,
            interval_secs: 60,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "gateway:rate_limit:".to_string(),
            store_timeout_ms: 250,
            idle_eviction_factor: 10,
            sweep_interval_secs: 60,
            trust_forwarded_for: false,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Time allowed for the backend to produce a response head, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2_000,
            request_secs: 30,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Total attempts for an idempotent request, first one included.
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds.
    pub backoff_ms: u64,

    /// Largest request body buffered so it can be replayed on retry.
    pub replay_buffer_bytes: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 2,
            backoff_ms: 200,
            replay_buffer_bytes: 1024 * 1024,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter used when RUST_LOG is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "service_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
