//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → dispatch.rs (route lookup, parameter pipeline, auth)
//!     → backend handler or proxy forwarder
//!     → Send to client
//! ```

pub mod dispatch;
pub mod request;
pub mod server;

pub use request::{X_HTTP_METHOD_OVERRIDE, X_REQUEST_ID};
pub use server::HttpServer;
