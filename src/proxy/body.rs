//! Body wrapper that ties one direction of a proxy session to its cancellation token.

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::WaitForCancellationFutureOwned;

use crate::observability::metrics;
use crate::proxy::session::ProxySession;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which way the bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client request body on its way to the upstream.
    Upstream,
    /// Upstream response body on its way to the client.
    Downstream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upstream => "upstream",
            Direction::Downstream => "downstream",
        }
    }
}

/// Streams frames through unchanged while watching the session.
///
/// - A cancelled session turns the next poll into an error, so the connection
///   is closed instead of ending the body cleanly.
/// - An error from the wrapped body aborts the session.
/// - Dropping the downstream body before its end (client went away) aborts
///   the session. The upstream body may be dropped early by the client
///   connection, so its drop does not.
pub struct SessionBody<B> {
    inner: B,
    session: ProxySession,
    direction: Direction,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    bytes: u64,
    finished: bool,
}

impl<B: Body> SessionBody<B> {
    pub fn new(inner: B, session: ProxySession, direction: Direction) -> Self {
        let cancelled = Box::pin(session.token().clone().cancelled_owned());
        // HEAD and 204/304 responses are empty from the start and may never be polled.
        let finished = inner.is_end_stream();
        Self {
            inner,
            session,
            direction,
            cancelled,
            bytes: 0,
            finished,
        }
    }
}

impl<B> Body for SessionBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.finished {
            return Poll::Ready(None);
        }

        if self.cancelled.as_mut().poll(cx).is_ready() {
            self.finished = true;
            return Poll::Ready(Some(Err(format!(
                "proxy session {} aborted",
                self.session.request_id()
            )
            .into())));
        }

        match Pin::new(&mut self.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    self.bytes += data.len() as u64;
                }
                // The server stops polling once the body reports its end.
                self.finished = self.inner.is_end_stream();
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                let e: BoxError = e.into();
                self.finished = true;
                let reason = match self.direction {
                    Direction::Upstream => format!("client body error: {}", e),
                    Direction::Downstream => format!("upstream body error: {}", e),
                };
                self.session.abort(&reason);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for SessionBody<B> {
    fn drop(&mut self) {
        metrics::record_proxy_bytes(self.direction.as_str(), self.bytes);
        if self.direction == Direction::Downstream && !self.finished {
            self.session.abort("client disconnected");
        }
    }
}
