//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use http_body::{Frame, SizeHint};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpListener;

use cluster_gateway::auth::TokenValidator;
use cluster_gateway::config::parse_config;
use cluster_gateway::{HttpServer, Shutdown};

/// Body returned by the mock upstream for repositories that do not exist.
/// Not valid UTF-8 on purpose.
pub const MISSING_REPO_BODY: &[u8] = b"\x00\x01repository not found\n\xff\xfe";

pub const READER_TOKEN: &str = "reader-token";
pub const READER: &str = "zzzzz-tpzed-reader000000000";
pub const WRITER_TOKEN: &str = "writer-token";
pub const WRITER: &str = "zzzzz-tpzed-writer000000000";
pub const OTHER_TOKEN: &str = "other-token";
pub const OTHER: &str = "zzzzz-tpzed-other0000000000";

/// Static validator table shared by every test config.
pub const TOKENS: &str = r#"
[auth.validator]
kind = "static"
tokens = [
    { token = "reader-token", principal = "zzzzz-tpzed-reader000000000", scopes = ["git.read", "secrets.read"] },
    { token = "writer-token", principal = "zzzzz-tpzed-writer000000000", scopes = ["all"] },
    { token = "other-token", principal = "zzzzz-tpzed-other0000000000", scopes = ["other"] },
]
"#;

/// A running gateway on a loopback port.
pub struct TestGateway {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a gateway from TOML config text.
pub async fn start_gateway(config: &str) -> TestGateway {
    start_gateway_with(config, None).await
}

/// Start a gateway, optionally overriding the configured token validator.
pub async fn start_gateway_with(config: &str, validator: Option<Arc<dyn TokenValidator>>) -> TestGateway {
    let config = parse_config(config).expect("test config is valid");
    let mut server = HttpServer::new(config);
    if let Some(validator) = validator {
        server = server.with_validator(validator);
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestGateway { addr, shutdown }
}

/// Start a mock upstream.
///
/// - Paths containing `missing` answer 404 with [`MISSING_REPO_BODY`].
/// - Paths containing `truncated` promise 1000 bytes, send a few, then fail.
/// - Paths containing `slow` read the whole body and think for 1.5s before
///   answering, the way receive-pack does.
/// - Everything else answers 200 with a JSON description of the request it
///   received: method, uri, headers and body length.
pub async fn start_mock_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(mock_upstream);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn mock_upstream(request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    if parts.uri.path().contains("missing") {
        return (
            StatusCode::NOT_FOUND,
            [("x-upstream", "mock"), ("content-type", "application/octet-stream")],
            MISSING_REPO_BODY,
        )
            .into_response();
    }
    if parts.uri.path().contains("truncated") {
        return axum::http::Response::builder()
            .header("content-type", "application/x-git-upload-pack-result")
            .body(Body::new(TruncatedBody { sent: false }))
            .unwrap();
    }

    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    if parts.uri.path().contains("slow") {
        tokio::time::sleep(Duration::from_millis(1500)).await;
    }
    let headers: serde_json::Map<String, serde_json::Value> = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                serde_json::Value::String(value.to_str().unwrap_or("<binary>").to_string()),
            )
        })
        .collect();

    axum::Json(serde_json::json!({
        "method": parts.method.as_str(),
        "uri": parts.uri.to_string(),
        "headers": headers,
        "body_len": body.len(),
    }))
    .into_response()
}

/// Response body that dies after its first frame.
struct TruncatedBody {
    sent: bool,
}

impl http_body::Body for TruncatedBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        if self.sent {
            return Poll::Ready(Some(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "upstream went away",
            ))));
        }
        self.sent = true;
        Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(b"PACK\x00\x00\x00")))))
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(1000)
    }
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
