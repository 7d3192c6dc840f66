//! Allow/deny decision for one request.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::token::Token;
use crate::auth::validator::{Identity, TokenValidator, ValidationError};
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;

/// Authentication requirements of a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthPolicy {
    /// Reject requests without a credential.
    pub required: bool,
    /// Scope the token must carry.
    pub scope: Option<String>,
    /// Scope required instead of `scope` for writes (git pushes).
    pub write_scope: Option<String>,
}

impl AuthPolicy {
    pub fn required_scope(&self, write: bool) -> Option<&str> {
        if write {
            self.write_scope.as_deref().or(self.scope.as_deref())
        } else {
            self.scope.as_deref()
        }
    }
}

/// Calls the validator and turns its answer into a decision.
///
/// Fails closed: a validator that errors or does not answer in time denies.
#[derive(Clone)]
pub struct AuthGate {
    validator: Arc<dyn TokenValidator>,
    timeout: Duration,
}

impl AuthGate {
    pub fn new(validator: Arc<dyn TokenValidator>, timeout: Duration) -> Self {
        Self { validator, timeout }
    }

    /// Decide whether a request may proceed.
    ///
    /// Returns the validated identity, or `None` for an anonymous request on a
    /// route that does not require authentication. A credential that is present
    /// is always validated, even where it is optional.
    pub async fn authorize(
        &self,
        token: Option<&Token>,
        required: bool,
        scope: Option<&str>,
    ) -> GatewayResult<Option<Identity>> {
        let Some(token) = token else {
            if required || scope.is_some() {
                metrics::record_auth_decision("missing_token");
                return Err(GatewayError::Unauthenticated("no credential supplied".to_string()));
            }
            return Ok(None);
        };

        let identity = match tokio::time::timeout(self.timeout, self.validator.validate(token.value())).await {
            Ok(Ok(identity)) => identity,
            Ok(Err(ValidationError::Rejected(reason))) => {
                tracing::info!(location = token.location().as_str(), reason = %reason, "Token rejected");
                metrics::record_auth_decision("rejected");
                return Err(GatewayError::Unauthenticated("invalid or expired token".to_string()));
            }
            Ok(Err(ValidationError::Unavailable(reason))) => {
                tracing::warn!(reason = %reason, "Token validator unavailable");
                metrics::record_auth_decision("validator_unavailable");
                return Err(GatewayError::validator_unavailable(reason));
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Token validation timed out");
                metrics::record_auth_decision("validator_timeout");
                return Err(GatewayError::validator_unavailable("validation timed out"));
            }
        };

        if let Some(scope) = scope {
            if !identity.has_scope(scope) {
                tracing::info!(principal = %identity.principal, scope, "Token lacks required scope");
                metrics::record_auth_decision("forbidden");
                return Err(GatewayError::Forbidden { scope: scope.to_string() });
            }
        }

        metrics::record_auth_decision("allowed");
        Ok(Some(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::TokenLocation;
    use crate::auth::validator::StaticTokenValidator;
    use async_trait::async_trait;

    struct SlowValidator;

    #[async_trait]
    impl TokenValidator for SlowValidator {
        async fn validate(&self, _token: &str) -> Result<Identity, ValidationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(ValidationError::Rejected("too late".into()))
        }
    }

    struct DownValidator;

    #[async_trait]
    impl TokenValidator for DownValidator {
        async fn validate(&self, _token: &str) -> Result<Identity, ValidationError> {
            Err(ValidationError::Unavailable("connection refused".into()))
        }
    }

    fn gate() -> AuthGate {
        let validator = StaticTokenValidator::new()
            .with_token("reader", "user-r", &["git.read"])
            .with_token("admin", "user-a", &["all"]);
        AuthGate::new(Arc::new(validator), Duration::from_millis(200))
    }

    fn token(value: &str) -> Token {
        Token::new(value, TokenLocation::Header)
    }

    #[tokio::test]
    async fn missing_token_on_protected_route() {
        let err = gate().authorize(None, true, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn anonymous_allowed_on_open_route() {
        assert_eq!(gate().authorize(None, false, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_token_is_unauthenticated() {
        let err = gate().authorize(Some(&token("bogus")), false, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn insufficient_scope_is_forbidden() {
        let err = gate()
            .authorize(Some(&token("reader")), true, Some("git.write"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn valid_token_with_scope() {
        let identity = gate()
            .authorize(Some(&token("reader")), true, Some("git.read"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.principal, "user-r");
    }

    #[tokio::test]
    async fn timeout_fails_closed_as_unavailable() {
        let gate = AuthGate::new(Arc::new(SlowValidator), Duration::from_millis(50));
        let err = gate.authorize(Some(&token("any")), true, None).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unreachable_validator_fails_closed() {
        let gate = AuthGate::new(Arc::new(DownValidator), Duration::from_millis(50));
        let err = gate.authorize(Some(&token("any")), false, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn write_scope_selection() {
        let policy = AuthPolicy {
            required: true,
            scope: Some("git.read".into()),
            write_scope: Some("git.write".into()),
        };
        assert_eq!(policy.required_scope(false), Some("git.read"));
        assert_eq!(policy.required_scope(true), Some("git.write"));
        let read_only = AuthPolicy {
            scope: Some("git.read".into()),
            ..Default::default()
        };
        assert_eq!(read_only.required_scope(true), Some("git.read"));
    }
}
