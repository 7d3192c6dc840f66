//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (ordered scan)
//!     → matcher.rs (pattern match, capture path params)
//!     → Return: RouteMatch, NotFound or MethodNotAllowed
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Parse methods and patterns
//!     → Resolve targets
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (config order)

pub mod matcher;
pub mod router;

pub use matcher::{PathPattern, PatternError};
pub use router::{Route, RouteMatch, RouteTable, RouteTarget};
