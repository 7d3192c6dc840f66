//! Request-normalization and dispatch gateway for cluster services.
//!
//! Requests arrive in whatever shape a client generation produces (JSON or
//! form bodies, nested or flattened attrs, booleans as literals or strings,
//! tokens in headers, query or body) and leave as one canonical parameter set
//! plus a validated identity. Proxy routes stream authorized requests to an
//! upstream process untouched.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod params;
pub mod proxy;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
