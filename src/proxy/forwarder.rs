//! Streaming forwarder for authorized proxy routes.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream base URL
//! - Clean request headers and inject the trusted principal header
//! - Stream the request body up and the response body down without buffering
//! - Relay the upstream status, headers and body unaltered
//!
//! # Design Decisions
//! - No retries: a failed upstream is surfaced to the client
//! - Both bodies share one `ProxySession`; either side failing ends the other
//! - The pooled hyper client is shared by all proxy routes

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, Uri};
use axum::response::Response;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use url::Url;

use crate::auth::Identity;
use crate::config::{ConfigError, ProxySettings};
use crate::error::{GatewayError, GatewayResult};
use crate::proxy::body::{Direction, SessionBody};
use crate::proxy::session::ProxySession;

/// Headers that describe one connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    client: Client<HttpConnector, Body>,
    principal_header: HeaderName,
    forward_credentials: bool,
}

impl ProxyForwarder {
    pub fn new(settings: &ProxySettings, connect_timeout: Duration) -> Result<Self, ConfigError> {
        let principal_header = HeaderName::from_bytes(settings.principal_header.as_bytes())
            .map_err(|e| ConfigError::Invalid(format!("principal header: {}", e)))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            principal_header,
            forward_credentials: settings.forward_credentials,
        })
    }

    /// Forward `request` to `upstream` and return the upstream response.
    ///
    /// The returned response streams; its body keeps the session alive until
    /// the client has read it or gone away.
    pub async fn forward(
        &self,
        upstream: &Url,
        request: Request<Body>,
        identity: Option<&Identity>,
        session: ProxySession,
    ) -> GatewayResult<Response> {
        let (mut parts, body) = request.into_parts();

        parts.uri = upstream_uri(upstream, &parts.uri)?;
        self.prepare_headers(&mut parts.headers, identity)?;

        tracing::debug!(
            request_id = %session.request_id(),
            upstream = %parts.uri,
            "Forwarding to upstream"
        );

        let body = Body::new(SessionBody::new(body, session.clone(), Direction::Upstream));
        let request = Request::from_parts(parts, body);

        match self.client.request(request).await {
            Ok(response) => {
                let (parts, body): (_, hyper::body::Incoming) = response.into_parts();
                let body = SessionBody::new(body, session, Direction::Downstream);
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Err(e) if session.is_aborted() => {
                Err(GatewayError::StreamAbort(format!("request body aborted: {}", e)))
            }
            Err(e) => {
                tracing::error!(
                    request_id = %session.request_id(),
                    upstream = %upstream,
                    error = %e,
                    "Upstream request failed"
                );
                Err(GatewayError::proxy_unavailable(e.to_string()))
            }
        }
    }

    fn prepare_headers(&self, headers: &mut HeaderMap, identity: Option<&Identity>) -> GatewayResult<()> {
        // Headers named by `Connection` are hop-by-hop too.
        let listed: Vec<HeaderName> = headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
            .collect();
        for name in listed.iter().chain(HOP_BY_HOP.iter()) {
            headers.remove(name);
        }

        // The client sets `Host` for the gateway; the pool sets it for the upstream.
        headers.remove(header::HOST);

        // Only the gateway may assert who the caller is.
        headers.remove(&self.principal_header);
        if !self.forward_credentials {
            headers.remove(header::AUTHORIZATION);
        }

        if let Some(identity) = identity {
            let value = HeaderValue::from_str(&identity.principal)
                .map_err(|e| GatewayError::Internal(format!("principal not a valid header value: {}", e)))?;
            headers.insert(self.principal_header.clone(), value);
        }
        Ok(())
    }
}

/// Join the upstream base URL with the request's path and query.
fn upstream_uri(upstream: &Url, original: &Uri) -> GatewayResult<Uri> {
    let base = upstream.as_str().trim_end_matches('/');
    let path_and_query = original.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{}{}", base, path_and_query)
        .parse::<Uri>()
        .map_err(|e| GatewayError::Internal(format!("upstream uri: {}", e)))
}
