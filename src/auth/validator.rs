//! Token validation capability.
//!
//! The gateway never decides who a token belongs to; it asks a validator.
//! Two implementations ship: an HTTP client for an identity service and a
//! fixed table for development and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, ValidatorConfig};

/// Scope that grants every other scope.
pub const SCOPE_ALL: &str = "all";

/// Who a valid token belongs to and what it may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub principal: String,
    pub scopes: Vec<String>,
}

impl Identity {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope || s == SCOPE_ALL)
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    /// The token is unknown, expired or revoked.
    #[error("token rejected: {0}")]
    Rejected(String),

    /// The validator could not give an answer.
    #[error("validator unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<Identity, ValidationError>;
}

/// Fixed token table.
#[derive(Debug, Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: impl Into<String>, scopes: &[&str]) -> Self {
        self.tokens.insert(
            token.into(),
            Identity {
                principal: principal.into(),
                scopes: scopes.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Result<Identity, ValidationError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| ValidationError::Rejected("unknown token".to_string()))
    }
}

/// Asks an identity service about the token, presenting it as a bearer credential.
///
/// Expects a JSON answer carrying `principal` (or `owner_uuid`) and optional `scopes`.
pub struct HttpTokenValidator {
    client: reqwest::Client,
    url: url::Url,
}

#[derive(Deserialize)]
struct CurrentToken {
    #[serde(alias = "owner_uuid")]
    principal: String,
    scopes: Option<Vec<String>>,
}

impl HttpTokenValidator {
    pub fn new(url: url::Url, timeout: Duration) -> Result<Self, ConfigError> {
        // The identity service is cluster-internal; never route it through a proxy.
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("token validator client: {}", e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl TokenValidator for HttpTokenValidator {
    async fn validate(&self, token: &str) -> Result<Identity, ValidationError> {
        let response = self
            .client
            .get(self.url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ValidationError::Unavailable(e.to_string()))?;

        let status = response.status();
        if matches!(status.as_u16(), 401 | 403 | 404) {
            return Err(ValidationError::Rejected(format!("identity service answered {}", status)));
        }
        if !status.is_success() {
            return Err(ValidationError::Unavailable(format!("identity service answered {}", status)));
        }

        let current: CurrentToken = response
            .json()
            .await
            .map_err(|e| ValidationError::Unavailable(format!("unreadable identity response: {}", e)))?;

        Ok(Identity {
            principal: current.principal,
            scopes: current.scopes.unwrap_or_else(|| vec![SCOPE_ALL.to_string()]),
        })
    }
}

/// Build the validator a configuration describes.
pub fn from_config(config: &ValidatorConfig, timeout: Duration) -> Result<Arc<dyn TokenValidator>, ConfigError> {
    match config {
        ValidatorConfig::Http { url } => {
            let url = url::Url::parse(url).map_err(|e| ConfigError::Invalid(format!("validator url: {}", e)))?;
            Ok(Arc::new(HttpTokenValidator::new(url, timeout)?))
        }
        ValidatorConfig::Static { tokens } => {
            let mut validator = StaticTokenValidator::new();
            for entry in tokens {
                let scopes: Vec<&str> = entry.scopes.iter().map(String::as_str).collect();
                validator = validator.with_token(&entry.token, &entry.principal, &scopes);
            }
            Ok(Arc::new(validator))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_validator_known_and_unknown() {
        let validator = StaticTokenValidator::new().with_token("t1", "user-1", &["read"]);
        let identity = validator.validate("t1").await.unwrap();
        assert_eq!(identity.principal, "user-1");
        assert!(matches!(validator.validate("nope").await, Err(ValidationError::Rejected(_))));
    }

    #[test]
    fn all_scope_grants_everything() {
        let identity = Identity {
            principal: "p".into(),
            scopes: vec![SCOPE_ALL.into()],
        };
        assert!(identity.has_scope("git.write"));
        let narrow = Identity {
            principal: "p".into(),
            scopes: vec!["git.read".into()],
        };
        assert!(narrow.has_scope("git.read"));
        assert!(!narrow.has_scope("git.write"));
    }

    #[tokio::test]
    async fn unreachable_identity_service_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = url::Url::parse(&format!("http://{}/current", addr)).unwrap();
        let validator = HttpTokenValidator::new(url, Duration::from_secs(1)).unwrap();
        assert!(matches!(validator.validate("t").await, Err(ValidationError::Unavailable(_))));
    }
}
