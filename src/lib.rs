//! API gateway for a set of backend microservices.
//!
//! One public entry point that rate limits, routes by the first path
//! segment, checks bearer tokens and proxies to the owning service.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
