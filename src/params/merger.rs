//! Merging of query, body and attrs sources into one ParamSet.
//!
//! Precedence, lowest to highest: query string, then body. Path captures are
//! layered on top by the router after merging.

use crate::error::{GatewayError, GatewayResult};
use crate::params::{ParamSet, ParamValue, ATTRS_KEY};

/// How the client framed the attrs block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrsFraming {
    /// Every body key is an attribute.
    Flattened,
    /// Attributes live under the given key, as an object or JSON-encoded string.
    Nested(String),
}

/// Merge query and body parameters, then resolve attrs per `framing`.
///
/// With no framing the route declares no attrs block and `attrs` is left untouched.
pub fn merge(query: ParamSet, body: ParamSet, framing: Option<&AttrsFraming>) -> GatewayResult<ParamSet> {
    let flattened_attrs = matches!(framing, Some(AttrsFraming::Flattened)).then(|| body.clone());

    let mut params = query;
    params.extend(body);

    match framing {
        None => {}
        Some(AttrsFraming::Flattened) => {
            if let Some(attrs) = flattened_attrs {
                params.insert(ATTRS_KEY, attrs);
            }
        }
        Some(AttrsFraming::Nested(key)) => {
            if let Some(raw) = params.remove(key) {
                match decode_attrs(key, raw)? {
                    Some(attrs) => {
                        params.insert(key.clone(), attrs.clone());
                        params.insert(ATTRS_KEY, attrs);
                    }
                    None => {
                        params.insert(key.clone(), ParamValue::Null);
                    }
                }
            }
        }
    }

    if let Some(value) = params.get(ATTRS_KEY) {
        if value.as_object().is_none() {
            return Err(GatewayError::Decode(format!(
                "`{}` must be an object, got {}",
                ATTRS_KEY,
                value.kind()
            )));
        }
    }

    Ok(params)
}

/// Decode a nested attrs value. `null` means no attrs were sent.
fn decode_attrs(key: &str, raw: ParamValue) -> GatewayResult<Option<ParamSet>> {
    match raw {
        ParamValue::Object(set) => Ok(Some(set)),
        ParamValue::Null => Ok(None),
        ParamValue::String(s) => match serde_json::from_str::<serde_json::Value>(&s) {
            Ok(serde_json::Value::Object(map)) => Ok(Some(map.into())),
            Ok(serde_json::Value::Null) => Ok(None),
            Ok(other) => Err(GatewayError::Decode(format!(
                "`{}` must decode to an object, got {}",
                key,
                ParamValue::from(other).kind()
            ))),
            Err(e) => Err(GatewayError::Decode(format!("`{}` is not valid JSON: {}", key, e))),
        },
        other => Err(GatewayError::Decode(format!(
            "`{}` must be an object, got {}",
            key,
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::decoder::{decode_form, decode_json};

    fn attrs_foo(params: &ParamSet) -> Option<&str> {
        params.attrs()?.get("foo")?.as_str()
    }

    #[test]
    fn body_overrides_query() {
        let query = decode_form(b"limit=10&order=name");
        let body = decode_form(b"limit=50");
        let params = merge(query, body, None).unwrap();
        assert_eq!(params.get("limit").and_then(ParamValue::as_str), Some("50"));
        assert_eq!(params.get("order").and_then(ParamValue::as_str), Some("name"));
    }

    #[test]
    fn nested_json_object() {
        let body = decode_json(br#"{"model_name":{"foo":"bar"}}"#).unwrap();
        let framing = AttrsFraming::Nested("model_name".into());
        let params = merge(ParamSet::new(), body, Some(&framing)).unwrap();
        assert_eq!(attrs_foo(&params), Some("bar"));
    }

    #[test]
    fn flattened_json_body() {
        let body = decode_json(br#"{"foo":"bar"}"#).unwrap();
        let params = merge(ParamSet::new(), body, Some(&AttrsFraming::Flattened)).unwrap();
        assert_eq!(attrs_foo(&params), Some("bar"));
        assert_eq!(params.get("foo").and_then(ParamValue::as_str), Some("bar"));
    }

    #[test]
    fn nested_form_string_is_decoded() {
        let body = decode_form(b"model_name=%7B%22foo%22%3A%22bar%22%7D");
        let framing = AttrsFraming::Nested("model_name".into());
        let params = merge(ParamSet::new(), body, Some(&framing)).unwrap();
        assert_eq!(attrs_foo(&params), Some("bar"));
        assert!(params.get("model_name").unwrap().as_object().is_some());
    }

    #[test]
    fn framing_independent_result() {
        let framing = AttrsFraming::Nested("model_name".into());
        let nested = merge(
            ParamSet::new(),
            decode_json(br#"{"model_name":{"foo":"bar"}}"#).unwrap(),
            Some(&framing),
        )
        .unwrap();
        let flat = merge(
            ParamSet::new(),
            decode_json(br#"{"foo":"bar"}"#).unwrap(),
            Some(&AttrsFraming::Flattened),
        )
        .unwrap();
        assert_eq!(nested.attrs().unwrap().get("foo"), flat.attrs().unwrap().get("foo"));
    }

    #[test]
    fn undecodable_attrs_string() {
        let body = decode_form(b"model_name=not-json");
        let framing = AttrsFraming::Nested("model_name".into());
        let err = merge(ParamSet::new(), body, Some(&framing)).unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[test]
    fn attrs_json_array_rejected() {
        let body = decode_form(b"model_name=%5B1%2C2%5D");
        let framing = AttrsFraming::Nested("model_name".into());
        assert!(matches!(
            merge(ParamSet::new(), body, Some(&framing)),
            Err(GatewayError::Decode(_))
        ));
    }

    #[test]
    fn attrs_number_rejected() {
        let body = decode_json(br#"{"model_name": 5}"#).unwrap();
        let framing = AttrsFraming::Nested("model_name".into());
        assert!(merge(ParamSet::new(), body, Some(&framing)).is_err());
    }

    #[test]
    fn missing_nested_key_leaves_attrs_absent() {
        let body = decode_json(br#"{"other":1}"#).unwrap();
        let framing = AttrsFraming::Nested("model_name".into());
        let params = merge(ParamSet::new(), body, Some(&framing)).unwrap();
        assert!(params.get(ATTRS_KEY).is_none());
    }

    #[test]
    fn raw_attrs_string_never_survives() {
        let body = decode_form(b"attrs=raw");
        assert!(matches!(merge(ParamSet::new(), body, None), Err(GatewayError::Decode(_))));
    }

    #[test]
    fn nested_attrs_from_query_string() {
        let query = decode_form(b"model_name=%7B%22foo%22%3A%22q%22%7D");
        let framing = AttrsFraming::Nested("model_name".into());
        let params = merge(query, ParamSet::new(), Some(&framing)).unwrap();
        assert_eq!(attrs_foo(&params), Some("q"));
    }

    #[test]
    fn merge_is_deterministic() {
        let run = || {
            merge(
                decode_form(b"a=1"),
                decode_json(br#"{"model_name":{"foo":"bar"},"b":true}"#).unwrap(),
                Some(&AttrsFraming::Nested("model_name".into())),
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }
}
