//! Request inspection helpers.
//!
//! # Responsibilities
//! - Read the request ID assigned by the request-id layer
//! - Resolve the method used for route lookup (method override)
//! - Recognize git pushes on proxy routes
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Override only applies to POST, so a GET can never be turned into a write

use axum::http::{HeaderMap, HeaderName, Method};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::params::{ParamSet, ParamValue};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_HTTP_METHOD_OVERRIDE: HeaderName = HeaderName::from_static("x-http-method-override");

/// Query parameter naming the override method.
pub const METHOD_OVERRIDE_PARAM: &str = "_method";

/// Request ID set (or honored) by the request-id layer.
///
/// Falls back to a fresh UUID when the router runs without that layer.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// The method to route by.
///
/// A `POST` may name another method in `X-Http-Method-Override` or the
/// `_method` query parameter; the header wins.
pub fn effective_method(method: &Method, headers: &HeaderMap, query: &ParamSet) -> GatewayResult<Method> {
    if method != Method::POST {
        return Ok(method.clone());
    }

    let requested = headers
        .get(X_HTTP_METHOD_OVERRIDE)
        .and_then(|v| v.to_str().ok())
        .or_else(|| query.get(METHOD_OVERRIDE_PARAM).and_then(ParamValue::as_str))
        .map(str::trim)
        .filter(|m| !m.is_empty());

    match requested {
        Some(name) => Method::from_bytes(name.to_ascii_uppercase().as_bytes())
            .map_err(|_| GatewayError::Decode(format!("invalid method override `{}`", name))),
        None => Ok(Method::POST),
    }
}

/// Whether a git smart-HTTP request writes to the repository.
pub fn is_git_push(path: &str, query: &ParamSet) -> bool {
    const RECEIVE_PACK: &str = "git-receive-pack";
    path.ends_with(RECEIVE_PACK)
        || query.get("service").and_then(ParamValue::as_str) == Some(RECEIVE_PACK)
}
