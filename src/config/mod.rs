//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (optional TOML file, then environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the routing table never changes at runtime
//! - All fields have defaults so the gateway starts with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, CorsConfig, GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    RateLimitConfig, RateLimitStrategy, RetryConfig, RouteConfig, TimeoutConfig,
};
