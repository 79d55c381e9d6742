//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! ForwardContext (method, target URI, filtered headers, body)
//!     → forwarder.rs (pooled client, per-attempt request, deadline)
//!     → On transient failure: resilience::retries decides, fixed backoff
//!     → Response streamed back with hop-by-hop headers removed
//! ```

pub mod forwarder;

pub use forwarder::{build_client, ForwardContext, Forwarder, OutboundBody, UpstreamClient};
