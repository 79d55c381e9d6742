//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit/ (per-client budget)
//!     → auth.rs (bearer token on protected routes)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*, X-User-Id)
//!     → Pass to proxy
//! ```
//!
//! # Design Decisions
//! - Authentication failures are typed; the dispatcher maps them to 401
//! - Rate limiting fails open only when its own store fails
//! - No trust in client-supplied identity headers

pub mod auth;
pub mod headers;
pub mod rate_limit;

pub use auth::{AuthClaims, TokenValidator};
pub use rate_limit::{Decision, RateLimiter};
