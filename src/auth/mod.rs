//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! headers / query / body
//!     → token.rs (TokenExtractor: first credential found)
//!     → gate.rs (AuthGate: validator call under timeout, scope check)
//!     → allow (Option<Identity>) or deny (401 / 403 / 503)
//! ```
//!
//! # Design Decisions
//! - Fail closed: validator errors and timeouts deny with 503, never 401
//! - No identity caching; caching is the validator's concern
//! - Tokens are redacted in Debug output and never forwarded by default

pub mod gate;
pub mod token;
pub mod validator;

pub use gate::{AuthGate, AuthPolicy};
pub use token::{Token, TokenExtractor, TokenLocation};
pub use validator::{Identity, StaticTokenValidator, TokenValidator, ValidationError};
