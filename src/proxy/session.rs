//! One forwarded request/response pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;

/// Shared state of one proxy session.
///
/// Both pumps hold a clone. Aborting from either side cancels the shared
/// token, which ends the other side on its next poll.
#[derive(Debug, Clone)]
pub struct ProxySession {
    request_id: Arc<str>,
    route: Arc<str>,
    cancel: CancellationToken,
    aborted: Arc<AtomicBool>,
}

impl ProxySession {
    pub fn new(request_id: &str, route: &str) -> Self {
        Self {
            request_id: request_id.into(),
            route: route.into(),
            cancel: CancellationToken::new(),
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Tear the session down. Only the first call is logged and counted.
    pub fn abort(&self, reason: &str) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                request_id = %self.request_id,
                route = %self.route,
                reason = %reason,
                "Proxy session aborted"
            );
            metrics::record_session_aborted();
        }
        self.cancel.cancel();
    }
}
