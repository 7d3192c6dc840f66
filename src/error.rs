//! Gateway error type and its mapping onto HTTP responses.
//!
//! # Design Decisions
//! - One enum for every request-path failure; handlers and the proxy share it
//! - Client-visible messages never include upstream internals
//! - Validator outages (503) and proxy target outages (502) stay distinct

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Duration;
use thiserror::Error;

/// The external service that could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// The token validation capability.
    TokenValidator,
    /// The upstream process behind a proxy route.
    ProxyTarget,
}

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unavailable::TokenValidator => write!(f, "token validator"),
            Unavailable::ProxyTarget => write!(f, "proxy target"),
        }
    }
}

/// Errors produced while normalizing, authorizing or forwarding a request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Body or attrs value could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Request body stream could not be read.
    #[error("I/O error: {0}")]
    Io(String),

    /// A declared field had a representation its type does not accept.
    #[error("field `{field}` is not a valid {expected}")]
    Type { field: String, expected: &'static str },

    #[error("no route matches {0}")]
    NotFound(String),

    /// The path matched but none of its routes accept this method.
    #[error("method {method} not allowed")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("token lacks required scope `{scope}`")]
    Forbidden { scope: String },

    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable { service: Unavailable, reason: String },

    /// The proxy session was torn down while bytes were in flight.
    #[error("proxy stream aborted: {0}")]
    StreamAbort(String),

    /// A handler route did not finish within the request deadline.
    #[error("request not completed within {0:?}")]
    Timeout(Duration),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validator_unavailable(reason: impl Into<String>) -> Self {
        GatewayError::UpstreamUnavailable {
            service: Unavailable::TokenValidator,
            reason: reason.into(),
        }
    }

    pub fn proxy_unavailable(reason: impl Into<String>) -> Self {
        GatewayError::UpstreamUnavailable {
            service: Unavailable::ProxyTarget,
            reason: reason.into(),
        }
    }

    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Decode(_) | GatewayError::Type { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Io(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden { .. } => StatusCode::FORBIDDEN,
            GatewayError::UpstreamUnavailable { service: Unavailable::TokenValidator, .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::UpstreamUnavailable { service: Unavailable::ProxyTarget, .. } => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::StreamAbort(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Decode(_) => "decode_error",
            GatewayError::Io(_) => "io_error",
            GatewayError::Type { .. } => "type_error",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::MethodNotAllowed { .. } => "method_not_allowed",
            GatewayError::Unauthenticated(_) => "unauthenticated",
            GatewayError::Forbidden { .. } => "forbidden",
            GatewayError::UpstreamUnavailable { .. } => "upstream_unavailable",
            GatewayError::StreamAbort(_) => "stream_aborted",
            GatewayError::Timeout(_) => "request_timeout",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    fn public_message(&self) -> String {
        match self {
            GatewayError::UpstreamUnavailable { service, reason } => {
                tracing::error!(service = %service, reason = %reason, "Upstream unavailable");
                format!("{} unavailable", service)
            }
            GatewayError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.code(),
            "message": self.public_message(),
        });
        let mut response = (status, Json(body)).into_response();

        if let GatewayError::MethodNotAllowed { allowed, .. } = &self {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_error_table() {
        assert_eq!(GatewayError::Decode("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::Type { field: "f".into(), expected: "boolean" }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GatewayError::NotFound("/x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(GatewayError::Unauthenticated("no token".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::Forbidden { scope: "s".into() }.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayError::validator_unavailable("timeout").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(GatewayError::proxy_unavailable("refused").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            GatewayError::Timeout(Duration::from_secs(1)).status(),
            StatusCode::REQUEST_TIMEOUT
        );
    }

    #[test]
    fn method_not_allowed_sets_allow_header() {
        let err = GatewayError::MethodNotAllowed {
            method: Method::DELETE,
            allowed: vec![Method::GET, Method::POST],
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET, POST");
    }
}
