//! Authenticating reverse proxy.
//!
//! # Data Flow
//! ```text
//! authorized request
//!     → forwarder.rs (rewrite URI, clean headers, inject principal)
//!     → upstream ──► SessionBody(Upstream) streams the client body up
//!     ← upstream response ◄── SessionBody(Downstream) streams the body down
//! ```
//!
//! # Design Decisions
//! - One `ProxySession` per forwarded request, torn down on completion,
//!   client disconnect or upstream failure
//! - Bodies are never buffered; the byte stream is opaque to the gateway

pub mod body;
pub mod forwarder;
pub mod session;

pub use body::{Direction, SessionBody};
pub use forwarder::ProxyForwarder;
pub use session::ProxySession;
