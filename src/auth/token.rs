//! Credential discovery.
//!
//! # Responsibilities
//! - Locate one credential: `Authorization` header, then query parameter, then body field
//! - Accept the `Bearer` and legacy `OAuth2` schemes, and optionally `Basic`
//!   with the token as password (git clients)
//! - Remove credential fields from parameters before handlers see them
//!
//! # Design Decisions
//! - First match wins; later locations are not consulted
//! - A missing or empty credential is `None`, never an error at this layer

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::AuthConfig;
use crate::params::{ParamSet, ParamValue};

/// Where a credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLocation {
    Header,
    Query,
    Body,
}

impl TokenLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenLocation::Header => "header",
            TokenLocation::Query => "query",
            TokenLocation::Body => "body",
        }
    }
}

/// An opaque credential and where it came from. Lives for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    location: TokenLocation,
}

impl Token {
    pub fn new(value: impl Into<String>, location: TokenLocation) -> Self {
        Self {
            value: value.into(),
            location,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn location(&self) -> TokenLocation {
        self.location
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("location", &self.location)
            .finish()
    }
}

/// Finds the request credential according to deployment configuration.
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    query_param: String,
    body_field: String,
    accept_basic: bool,
}

impl TokenExtractor {
    pub fn new(query_param: impl Into<String>, body_field: impl Into<String>, accept_basic: bool) -> Self {
        Self {
            query_param: query_param.into(),
            body_field: body_field.into(),
            accept_basic,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.token_query_param, &config.token_body_field, config.accept_basic_auth)
    }

    /// Locate the credential. `body` is `None` when the body is not a parameter source.
    pub fn extract(&self, headers: &HeaderMap, query: &ParamSet, body: Option<&ParamSet>) -> Option<Token> {
        if let Some(value) = self.from_header(headers) {
            return Some(Token::new(value, TokenLocation::Header));
        }
        if let Some(value) = non_empty(query.get(&self.query_param)) {
            return Some(Token::new(value, TokenLocation::Query));
        }
        body.and_then(|b| non_empty(b.get(&self.body_field)))
            .map(|value| Token::new(value, TokenLocation::Body))
    }

    /// Drop credential fields so they never reach a handler.
    pub fn strip(&self, params: &mut ParamSet) {
        params.remove(&self.query_param);
        params.remove(&self.body_field);
    }

    fn from_header(&self, headers: &HeaderMap) -> Option<String> {
        let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
        let (scheme, credential) = raw.split_once(' ')?;
        let credential = credential.trim();
        if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("oauth2") {
            return (!credential.is_empty()).then(|| credential.to_string());
        }
        if self.accept_basic && scheme.eq_ignore_ascii_case("basic") {
            return basic_password(credential);
        }
        None
    }
}

/// Password half of a Basic credential; git clients send the token there.
fn basic_password(encoded: &str) -> Option<String> {
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (_user, password) = decoded.split_once(':')?;
    (!password.is_empty()).then(|| password.to_string())
}

fn non_empty(value: Option<&ParamValue>) -> Option<String> {
    value
        .and_then(ParamValue::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::decoder::decode_form;
    use axum::http::HeaderValue;

    fn extractor() -> TokenExtractor {
        TokenExtractor::new("api_token", "api_token", true)
    }

    fn auth_header(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn header_beats_query() {
        let token = extractor()
            .extract(&auth_header("Bearer from-header"), &decode_form(b"api_token=from-query"), None)
            .unwrap();
        assert_eq!(token.value(), "from-header");
        assert_eq!(token.location(), TokenLocation::Header);
    }

    #[test]
    fn query_beats_body() {
        let body = decode_form(b"api_token=from-body");
        let token = extractor()
            .extract(&HeaderMap::new(), &decode_form(b"api_token=from-query"), Some(&body))
            .unwrap();
        assert_eq!(token.value(), "from-query");
        assert_eq!(token.location(), TokenLocation::Query);
    }

    #[test]
    fn body_field_used_last() {
        let body = decode_form(b"api_token=from-body");
        let token = extractor()
            .extract(&HeaderMap::new(), &ParamSet::new(), Some(&body))
            .unwrap();
        assert_eq!(token.location(), TokenLocation::Body);
    }

    #[test]
    fn body_ignored_when_not_a_source() {
        assert!(extractor().extract(&HeaderMap::new(), &ParamSet::new(), None).is_none());
    }

    #[test]
    fn legacy_oauth2_scheme() {
        let token = extractor()
            .extract(&auth_header("OAuth2 legacy"), &ParamSet::new(), None)
            .unwrap();
        assert_eq!(token.value(), "legacy");
    }

    #[test]
    fn basic_auth_password_is_token() {
        let encoded = STANDARD.encode("git:secret-token");
        let token = extractor()
            .extract(&auth_header(&format!("Basic {}", encoded)), &ParamSet::new(), None)
            .unwrap();
        assert_eq!(token.value(), "secret-token");
    }

    #[test]
    fn basic_auth_ignored_when_disabled() {
        let encoded = STANDARD.encode("git:secret-token");
        let extractor = TokenExtractor::new("api_token", "api_token", false);
        assert!(extractor
            .extract(&auth_header(&format!("Basic {}", encoded)), &ParamSet::new(), None)
            .is_none());
    }

    #[test]
    fn empty_credentials_are_absent() {
        assert!(extractor().extract(&auth_header("Bearer "), &decode_form(b"api_token="), None).is_none());
    }

    #[test]
    fn unknown_scheme_falls_through_to_query() {
        let token = extractor()
            .extract(&auth_header("Digest abc"), &decode_form(b"api_token=q"), None)
            .unwrap();
        assert_eq!(token.location(), TokenLocation::Query);
    }

    #[test]
    fn strip_removes_credentials() {
        let mut params = decode_form(b"api_token=x&keep=1");
        extractor().strip(&mut params);
        assert!(!params.contains_key("api_token"));
        assert!(params.contains_key("keep"));
    }

    #[test]
    fn debug_redacts_value() {
        let token = Token::new("super-secret", TokenLocation::Header);
        assert!(!format!("{:?}", token).contains("super-secret"));
    }
}
