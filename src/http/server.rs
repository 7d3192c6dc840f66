//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compile config into the shared `Gateway` (routes, auth, proxy client)
//! - Create Axum Router with the dispatch fallback
//! - Wire up middleware (request ID, tracing)
//! - Serve on a listener until shutdown

use axum::http::HeaderValue;
use axum::routing::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::{validator, AuthGate, TokenExtractor, TokenValidator};
use crate::config::{ConfigError, GatewayConfig};
use crate::handlers::{Handler, HandlerRegistry};
use crate::http::dispatch::{dispatch, Gateway};
use crate::proxy::ProxyForwarder;
use crate::routing::{RouteTable, RouteTarget};

/// HTTP server for the gateway.
pub struct HttpServer {
    config: GatewayConfig,
    handlers: HandlerRegistry,
    validator: Option<Arc<dyn TokenValidator>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// The built-in handlers are registered; the token validator is built
    /// from `auth.validator` unless one is supplied with [`with_validator`].
    ///
    /// [`with_validator`]: HttpServer::with_validator
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::with_builtins(),
            validator: None,
        }
    }

    /// Use `validator` instead of the one described by the config.
    pub fn with_validator(mut self, validator: Arc<dyn TokenValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Register a backend handler that routes can reference by `name`.
    pub fn with_handler(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.handlers.register(name, handler);
        self
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Compile the config and build the Axum router with all middleware layers.
    pub fn into_router(self) -> Result<Router, ConfigError> {
        let config = self.config;

        let routes = RouteTable::from_config(&config.routes)?;
        for route in routes.routes() {
            if let RouteTarget::Handler(name) = &route.target {
                if !self.handlers.contains(name) {
                    return Err(ConfigError::Invalid(format!(
                        "route `{}` references unknown handler `{}`",
                        route.name, name
                    )));
                }
            }
        }

        let validator = match self.validator {
            Some(validator) => validator,
            None => validator::from_config(&config.auth.validator, config.timeouts.auth())?,
        };

        let scheme = if config.auth.accept_basic_auth { "Basic" } else { "Bearer" };
        let challenge = HeaderValue::from_str(&format!("{} realm=\"{}\"", scheme, config.auth.realm))
            .map_err(|e| ConfigError::Invalid(format!("auth realm: {}", e)))?;

        let gateway = Gateway {
            routes,
            handlers: self.handlers,
            extractor: TokenExtractor::from_config(&config.auth),
            gate: AuthGate::new(validator, config.timeouts.auth()),
            forwarder: ProxyForwarder::new(&config.proxy, config.timeouts.connect())?,
            max_body_bytes: config.limits.max_body_bytes,
            request_timeout: config.timeouts.request(),
            challenge,
        };

        Ok(Router::new()
            .fallback(dispatch)
            .with_state(Arc::new(gateway))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. In-flight requests are drained before returning.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let router = self
            .into_router()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        tracing::info!(address = %addr, "HTTP server starting");

        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn unknown_handler_is_rejected() {
        let config = parse_config(
            r#"
            [[routes]]
            name = "a"
            methods = ["GET"]
            path = "/a"
            target = { kind = "handler", handler = "missing" }
            "#,
        )
        .unwrap();
        let err = HttpServer::new(config).into_router().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn default_config_builds() {
        assert!(HttpServer::new(GatewayConfig::default()).into_router().is_ok());
    }
}
