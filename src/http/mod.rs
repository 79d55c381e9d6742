//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned and echoed)
//!     → middleware/access_log.rs (entry/exit logs, request metrics)
//!     → /health → health.rs
//!     → anything else → dispatcher.rs
//!         (rate limit → route → auth → proxy::Forwarder)
//! ```

pub mod dispatcher;
pub mod health;
pub mod middleware;
pub mod request;
pub mod server;

pub use dispatcher::{dispatch_handler, RoutedService, Stage};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, GatewayServer, StartupError};
