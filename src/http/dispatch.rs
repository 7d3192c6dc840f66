//! Per-request dispatch.
//!
//! # Responsibilities
//! - Resolve the route (method override, 404/405)
//! - Handler routes: decode, merge and coerce parameters, authorize, call the handler
//! - Proxy routes: authorize from header/query only, then stream through
//! - Turn every failure into a structured error response
//!
//! # Data Flow
//! ```text
//! Request ──► effective_method ──► RouteTable::lookup
//!    ├─ Handler: read_body → decode → extract token → ParamRules::apply → AuthGate → Handler
//!    └─ Proxy:   extract token → AuthGate (read or write scope) → ProxyForwarder
//! ```
//!
//! # Design Decisions
//! - The body is read once, before any handler runs; handlers never re-parse it
//! - Proxy bodies are never read here: the token must come from a header or the query
//! - Errors are logged where they are decided, once
//! - Only handler routes run under the request deadline; a proxied push may
//!   upload for longer than any fixed deadline before the upstream answers

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::auth::{AuthGate, TokenExtractor};
use crate::error::{GatewayError, GatewayResult};
use crate::handlers::{HandlerContext, HandlerRegistry};
use crate::http::request::{effective_method, is_git_push, request_id, METHOD_OVERRIDE_PARAM};
use crate::observability::metrics;
use crate::params::decoder::{decode_body, decode_query, read_body, BodyFormat};
use crate::params::{ParamSet, RequestSources};
use crate::proxy::{ProxyForwarder, ProxySession};
use crate::routing::{Route, RouteTable, RouteTarget};

/// Everything dispatch needs, built once at startup and shared by reference.
pub struct Gateway {
    pub(crate) routes: RouteTable,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) extractor: TokenExtractor,
    pub(crate) gate: AuthGate,
    pub(crate) forwarder: ProxyForwarder,
    pub(crate) max_body_bytes: usize,
    /// Deadline for reading, authorizing and handling a handler-route request.
    pub(crate) request_timeout: Duration,
    /// `WWW-Authenticate` value sent with every 401.
    pub(crate) challenge: HeaderValue,
}

/// Fallback handler: every request enters here.
pub async fn dispatch(State(gateway): State<Arc<Gateway>>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(request.headers());

    let (route_name, result) = gateway.route(request, &request_id).await;
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            tracing::info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                route = route_name.as_deref().unwrap_or("none"),
                status = err.status().as_u16(),
                error = %err,
                "Request rejected"
            );
            gateway.error_response(err)
        }
    };

    metrics::record_request(
        method.as_str(),
        response.status().as_u16(),
        route_name.as_deref().unwrap_or("none"),
        started,
    );
    response
}

impl Gateway {
    /// Returns the matched route's name (if any) alongside the outcome.
    async fn route(&self, request: Request<Body>, request_id: &str) -> (Option<String>, GatewayResult<Response>) {
        let query = decode_query(request.uri().query());
        let method = match effective_method(request.method(), request.headers(), &query) {
            Ok(method) => method,
            Err(e) => return (None, Err(e)),
        };

        let matched = match self.routes.lookup(&method, request.uri().path()) {
            Ok(matched) => matched,
            Err(e) => return (None, Err(e)),
        };
        let route = matched.route;

        tracing::debug!(
            request_id = %request_id,
            method = %method,
            route = %route.name,
            "Route matched"
        );

        let result = match &route.target {
            RouteTarget::Handler(name) => {
                let call = self.call_handler(route, name, query, matched.path_params, request, request_id);
                match tokio::time::timeout(self.request_timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::Timeout(self.request_timeout)),
                }
            }
            RouteTarget::Proxy(upstream) => self.proxy(route, upstream, query, request, request_id).await,
        };
        (Some(route.name.clone()), result)
    }

    async fn call_handler(
        &self,
        route: &Route,
        name: &str,
        mut query: ParamSet,
        path: ParamSet,
        request: Request<Body>,
        request_id: &str,
    ) -> GatewayResult<Response> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| GatewayError::Internal(format!("handler `{}` is not registered", name)))?;

        let (parts, body) = request.into_parts();
        let content_type = parts.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let format = BodyFormat::from_content_type(content_type);
        let bytes = read_body(body, self.max_body_bytes).await?;
        let mut body = decode_body(format, &bytes)?;

        let token = self.extractor.extract(&parts.headers, &query, Some(&body));
        self.extractor.strip(&mut query);
        self.extractor.strip(&mut body);
        query.remove(METHOD_OVERRIDE_PARAM);

        let params = route.rules.apply(RequestSources {
            query,
            format,
            body,
            path,
        })?;

        let identity = self
            .gate
            .authorize(token.as_ref(), route.auth.required, route.auth.required_scope(false))
            .await?;

        let ctx = HandlerContext {
            route: route.name.clone(),
            params,
            token,
            identity,
            request_id: request_id.to_string(),
        };
        handler.handle(ctx).await
    }

    async fn proxy(
        &self,
        route: &Route,
        upstream: &Url,
        query: ParamSet,
        request: Request<Body>,
        request_id: &str,
    ) -> GatewayResult<Response> {
        let token = self.extractor.extract(request.headers(), &query, None);
        let write = is_git_push(request.uri().path(), &query);
        let identity = self
            .gate
            .authorize(token.as_ref(), route.auth.required, route.auth.required_scope(write))
            .await?;

        let session = ProxySession::new(request_id, &route.name);
        self.forwarder
            .forward(upstream, request, identity.as_ref(), session)
            .await
    }

    fn error_response(&self, err: GatewayError) -> Response {
        let challenge = err.status() == StatusCode::UNAUTHORIZED;
        let mut response = err.into_response();
        if challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, self.challenge.clone());
        }
        response
    }
}
