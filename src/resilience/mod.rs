//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (connect timeout, response head deadline)
//!     → On failure: retries.rs (idempotent + replayable + transient? wait, try again)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - At most one retry by default, after a short fixed pause

pub mod retries;
pub mod timeouts;

pub use retries::{is_idempotent, RetryPolicy, UpstreamFailure};
pub use timeouts::UpstreamTimeouts;
