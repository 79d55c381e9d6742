//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound path + method
//!     → router.rs (strip mount path, split first segment, service lookup)
//!     → matcher.rs (public path patterns)
//!     → Return: ResolvedRoute or NotFound
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Parse base URLs, compile public patterns
//!     → Freeze as immutable ServiceRouter
//! ```

pub mod matcher;
pub mod router;

pub use matcher::PathPattern;
pub use router::{ResolvedRoute, RouteEntry, ServiceRouter};
