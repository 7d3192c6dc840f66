//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Keep the validator deadline inside the handler request deadline
//! - Check every route compiles: methods, pattern, target
//! - Detect conflicting routes (same method on the same pattern)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::{HeaderName, Method};
use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, RouteConfig, TargetConfig, ValidatorConfig};
use crate::routing::matcher::PathPattern;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    BindAddress(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    /// A validator timeout must surface as 503 before the request deadline fires.
    #[error("timeouts.auth_ms ({auth_ms}) must be below timeouts.request_secs ({request_secs}s)")]
    AuthTimeout { auth_ms: u64, request_secs: u64 },

    #[error("invalid principal header name `{0}`")]
    HeaderName(String),

    #[error("invalid metrics address `{0}`")]
    MetricsAddress(String),

    #[error("invalid validator url `{0}`")]
    ValidatorUrl(String),

    #[error("route #{0} has no name")]
    UnnamedRoute(usize),

    #[error("duplicate route name `{0}`")]
    DuplicateName(String),

    #[error("route `{route}`: {reason}")]
    Route { route: String, reason: String },

    #[error("route `{route}` duplicates {method} {path}")]
    DuplicateBinding {
        route: String,
        method: String,
        path: String,
    },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    for (name, value) in [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.auth_ms", config.timeouts.auth_ms),
        ("limits.max_body_bytes", config.limits.max_body_bytes as u64),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(name));
        }
    }

    let timeouts = &config.timeouts;
    if timeouts.request_secs > 0 && timeouts.auth_ms >= timeouts.request_secs.saturating_mul(1000) {
        errors.push(ValidationError::AuthTimeout {
            auth_ms: timeouts.auth_ms,
            request_secs: timeouts.request_secs,
        });
    }

    if HeaderName::from_bytes(config.proxy.principal_header.as_bytes()).is_err() {
        errors.push(ValidationError::HeaderName(config.proxy.principal_header.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(config.observability.metrics_address.clone()));
    }

    if let ValidatorConfig::Http { url } = &config.auth.validator {
        if url::Url::parse(url).is_err() {
            errors.push(ValidationError::ValidatorUrl(url.clone()));
        }
    }

    let mut names = HashSet::new();
    let mut bindings = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        if route.name.trim().is_empty() {
            errors.push(ValidationError::UnnamedRoute(index));
        } else if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateName(route.name.clone()));
        }

        validate_route(route, &mut errors);

        for method in &route.methods {
            let method = method.to_ascii_uppercase();
            if !bindings.insert((method.clone(), route.path.clone())) {
                errors.push(ValidationError::DuplicateBinding {
                    route: route.name.clone(),
                    method,
                    path: route.path.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    let mut fail = |reason: String| {
        errors.push(ValidationError::Route {
            route: route.name.clone(),
            reason,
        })
    };

    if route.methods.is_empty() {
        fail("no methods".to_string());
    }
    for method in &route.methods {
        if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
            fail(format!("invalid method `{}`", method));
        }
    }

    if let Err(e) = PathPattern::parse(&route.path) {
        fail(e.to_string());
    }

    match &route.target {
        TargetConfig::Handler { handler } if handler.trim().is_empty() => {
            fail("empty handler name".to_string());
        }
        TargetConfig::Handler { .. } => {}
        TargetConfig::Proxy { upstream } => match url::Url::parse(upstream) {
            Ok(url) if url.scheme() == "http" && url.host_str().is_some() => {}
            Ok(url) => fail(format!("upstream `{}` must be an http:// URL with a host", url)),
            Err(e) => fail(format!("upstream `{}`: {}", upstream, e)),
        },
    }

    if let Some(attrs) = &route.attrs {
        if attrs.key.trim().is_empty() {
            fail("empty attrs key".to_string());
        }
        if matches!(route.target, TargetConfig::Proxy { .. }) {
            fail("proxy routes do not decode parameters; attrs not allowed".to_string());
        }
    }
}
