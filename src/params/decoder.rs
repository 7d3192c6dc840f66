//! Body and query string decoding.
//!
//! # Responsibilities
//! - Read the request body exactly once, bounded by the configured limit
//! - Decode JSON bodies into a ParamSet (top level must be an object)
//! - Decode form-urlencoded bodies and query strings as string pairs
//!
//! # Design Decisions
//! - Form values are never JSON-decoded here; typed fields are handled later
//! - A repeated form key keeps its last value
//! - Unrecognized content types contribute no body parameters

use axum::body::Body;
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};
use crate::params::ParamSet;

/// How a request body is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    Json,
    #[default]
    Form,
    /// Any other declared type; the body is not a parameter source.
    Opaque,
}

impl BodyFormat {
    /// Classify a `Content-Type` header value. A missing header means form.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(raw) = content_type else {
            return BodyFormat::Form;
        };
        let mime = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match mime.as_str() {
            "application/json" => BodyFormat::Json,
            "" | "application/x-www-form-urlencoded" => BodyFormat::Form,
            _ => BodyFormat::Opaque,
        }
    }
}

/// Collect the body into memory, failing with 413 past `limit` bytes.
pub async fn read_body(body: Body, limit: usize) -> GatewayResult<Bytes> {
    let collected = Limited::new(body, limit).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            tracing::warn!(limit, "Request body exceeded limit");
            GatewayError::PayloadTooLarge { limit }
        } else {
            GatewayError::Io(e.to_string())
        }
    })?;
    Ok(collected.to_bytes())
}

/// Decode a body according to its format.
pub fn decode_body(format: BodyFormat, body: &[u8]) -> GatewayResult<ParamSet> {
    match format {
        BodyFormat::Json => decode_json(body),
        BodyFormat::Form => Ok(decode_form(body)),
        BodyFormat::Opaque => {
            tracing::debug!(bytes = body.len(), "Ignoring body with unrecognized content type");
            Ok(ParamSet::new())
        }
    }
}

/// Decode a JSON object body. An empty body decodes to an empty set.
pub fn decode_json(body: &[u8]) -> GatewayResult<ParamSet> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ParamSet::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map.into()),
        Ok(other) => Err(GatewayError::Decode(format!(
            "JSON body must be an object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(GatewayError::Decode(format!("malformed JSON body: {}", e))),
    }
}

/// Decode `application/x-www-form-urlencoded` pairs; every value is a string.
pub fn decode_form(body: &[u8]) -> ParamSet {
    url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned().into()))
        .collect()
}

/// Decode a raw query string (without the leading `?`).
pub fn decode_query(query: Option<&str>) -> ParamSet {
    query.map(|q| decode_form(q.as_bytes())).unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
