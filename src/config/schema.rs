//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::auth::AuthPolicy;
use crate::params::{AttrsRule, FieldType};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Credential locations and the validation capability.
    pub auth: AuthConfig,

    /// Settings shared by all proxy routes.
    pub proxy: ProxySettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Route table, checked in order.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest body decoded for handler routes. Proxy bodies stream and are not limited.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time a handler route has to read, authorize and answer, in seconds.
    /// Proxy routes are bounded by `connect_secs` and `auth_ms` instead.
    pub request_secs: u64,

    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Token validation deadline in milliseconds.
    pub auth_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn auth(&self) -> Duration {
        Duration::from_millis(self.auth_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            connect_secs: 5,
            auth_ms: 2000,
        }
    }
}

/// Where credentials are looked for and who validates them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Query parameter that may carry the token.
    pub token_query_param: String,

    /// Body field that may carry the token.
    pub token_body_field: String,

    /// Accept `Authorization: Basic` with the token as password.
    pub accept_basic_auth: bool,

    /// Realm advertised in `WWW-Authenticate` challenges.
    pub realm: String,

    pub validator: ValidatorConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_query_param: "api_token".to_string(),
            token_body_field: "api_token".to_string(),
            accept_basic_auth: true,
            realm: "cluster-gateway".to_string(),
            validator: ValidatorConfig::default(),
        }
    }
}

/// The token validation capability.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ValidatorConfig {
    /// Identity service queried over HTTP.
    Http { url: String },
    /// Fixed token table.
    Static {
        #[serde(default)]
        tokens: Vec<StaticTokenConfig>,
    },
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig::Static { tokens: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticTokenConfig {
    pub token: String,
    pub principal: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Settings applied to every proxied request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Header carrying the validated principal to the upstream.
    pub principal_header: String,

    /// Pass the client's `Authorization` header through to the upstream.
    pub forward_credentials: bool,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            principal_header: "X-Gateway-Principal".to_string(),
            forward_credentials: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One entry of the route table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Accepted methods, e.g. `["GET", "POST"]`.
    pub methods: Vec<String>,

    /// Path pattern: literal segments, `{name}` captures (with optional
    /// literal suffix) and a trailing `{*name}`.
    pub path: String,

    pub target: TargetConfig,

    /// Attrs block declaration for resource routes.
    #[serde(default)]
    pub attrs: Option<AttrsRule>,

    /// Declared field types, coerced before the handler runs.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldType>,

    #[serde(default)]
    pub auth: AuthPolicy,
}

/// What a matched request is dispatched to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetConfig {
    /// A registered backend handler.
    Handler { handler: String },
    /// An upstream process the request is streamed to.
    Proxy { upstream: String },
}
