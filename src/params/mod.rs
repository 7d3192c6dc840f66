//! Request parameter normalization.
//!
//! # Data Flow
//! ```text
//! query string ──► decoder::decode_query ─┐
//!                                         ├─► merger::merge ──► + path captures ──► coercer ──► ParamSet
//! body + Content-Type ──► decoder::decode_body ─┘      (attrs framing)                (declared fields)
//! ```
//!
//! # Design Decisions
//! - Every stage is a pure function of its inputs; running the pipeline twice on
//!   the same request yields the same ParamSet
//! - `attrs` is a reserved key: after merging it is an object or absent
//! - Precedence is query < body < path captures

pub mod coercer;
pub mod decoder;
pub mod merger;
pub mod value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::GatewayResult;

pub use coercer::FieldType;
pub use decoder::BodyFormat;
pub use merger::AttrsFraming;
pub use value::{ParamSet, ParamValue};

/// Reserved key under which the attrs block is always found.
pub const ATTRS_KEY: &str = "attrs";

/// How a route expects its attrs block to be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FramingMode {
    Nested,
    Flattened,
    /// Flattened for a JSON body that lacks the attrs key, nested otherwise.
    /// Form clients always send the attrs block JSON-encoded under the key.
    #[default]
    Auto,
}

/// A route's attrs declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttrsRule {
    /// Key the attrs block is nested under, e.g. a resource type name.
    pub key: String,
    #[serde(default)]
    pub framing: FramingMode,
}

impl AttrsRule {
    /// Select the merge strategy for one request's decoded body.
    pub fn framing_for(&self, format: BodyFormat, body: &ParamSet) -> AttrsFraming {
        match self.framing {
            FramingMode::Nested => AttrsFraming::Nested(self.key.clone()),
            FramingMode::Flattened => AttrsFraming::Flattened,
            FramingMode::Auto
                if format == BodyFormat::Json && !body.is_empty() && !body.contains_key(&self.key) =>
            {
                AttrsFraming::Flattened
            }
            FramingMode::Auto => AttrsFraming::Nested(self.key.clone()),
        }
    }
}

/// Decoded parameter sources for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestSources {
    pub query: ParamSet,
    pub format: BodyFormat,
    pub body: ParamSet,
    pub path: ParamSet,
}

/// Per-route normalization rules, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct ParamRules {
    pub attrs: Option<AttrsRule>,
    pub fields: BTreeMap<String, FieldType>,
}

impl ParamRules {
    /// Merge, place attrs, layer path captures and coerce declared fields.
    pub fn apply(&self, sources: RequestSources) -> GatewayResult<ParamSet> {
        let framing = self.attrs.as_ref().map(|rule| rule.framing_for(sources.format, &sources.body));
        let mut params = merger::merge(sources.query, sources.body, framing.as_ref())?;
        params.extend(sources.path);
        coercer::coerce_declared(&mut params, &self.fields)?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::params::decoder::{decode_form, decode_json};

    fn rules() -> ParamRules {
        ParamRules {
            attrs: Some(AttrsRule {
                key: "model_name".into(),
                framing: FramingMode::Auto,
            }),
            fields: BTreeMap::from([("ensure_unique_name".to_string(), FieldType::Bool)]),
        }
    }

    #[test]
    fn auto_framing_selection() {
        let rule = rules().attrs.unwrap();
        let nested = decode_json(br#"{"model_name":{}}"#).unwrap();
        assert_eq!(
            rule.framing_for(BodyFormat::Json, &nested),
            AttrsFraming::Nested("model_name".into())
        );
        let flat = decode_json(br#"{"foo":"bar"}"#).unwrap();
        assert_eq!(rule.framing_for(BodyFormat::Json, &flat), AttrsFraming::Flattened);
        assert_eq!(
            rule.framing_for(BodyFormat::Json, &ParamSet::new()),
            AttrsFraming::Nested("model_name".into())
        );
        let form = decode_form(b"foo=bar");
        assert_eq!(
            rule.framing_for(BodyFormat::Form, &form),
            AttrsFraming::Nested("model_name".into())
        );
    }

    #[test]
    fn full_pipeline_form_body() {
        let sources = RequestSources {
            query: decode_form(b"ensure_unique_name=true"),
            body: decode_form(b"ensure_unique_name=0&model_name=%7B%22foo%22%3A%22bar%22%7D"),
            ..Default::default()
        };
        let params = rules().apply(sources).unwrap();
        assert_eq!(params.get("ensure_unique_name"), Some(&ParamValue::Bool(false)));
        assert_eq!(params.attrs().unwrap().get("foo").and_then(ParamValue::as_str), Some("bar"));
    }

    #[test]
    fn path_captures_win() {
        let mut path = ParamSet::new();
        path.insert("uuid", "from-path");
        let sources = RequestSources {
            query: decode_form(b"uuid=from-query"),
            format: BodyFormat::Json,
            body: decode_json(br#"{"uuid":"from-body"}"#).unwrap(),
            path,
        };
        let params = ParamRules::default().apply(sources).unwrap();
        assert_eq!(params.get("uuid").and_then(ParamValue::as_str), Some("from-path"));
    }

    #[test]
    fn bad_boolean_is_type_error() {
        let sources = RequestSources {
            body: decode_form(b"ensure_unique_name=maybe"),
            ..Default::default()
        };
        assert!(matches!(rules().apply(sources), Err(GatewayError::Type { .. })));
    }

    #[test]
    fn form_fields_without_attrs_key_stay_top_level() {
        let sources = RequestSources {
            body: decode_form(b"ensure_unique_name=1&limit=5"),
            ..Default::default()
        };
        let params = rules().apply(sources).unwrap();
        assert!(params.attrs().is_none());
        assert_eq!(params.get("ensure_unique_name"), Some(&ParamValue::Bool(true)));
        assert_eq!(params.get("limit").and_then(ParamValue::as_str), Some("5"));
    }
}
