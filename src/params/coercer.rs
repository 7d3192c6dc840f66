//! Scalar normalization for fields whose type a route declares.
//!
//! Only declared fields are touched; everything else passes through as sent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{GatewayError, GatewayResult};
use crate::params::{ParamSet, ParamValue};

/// Declared type of a request field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Int,
    Float,
    String,
    /// A structured value that form clients send JSON-encoded.
    Json,
}

impl FieldType {
    fn name(self) -> &'static str {
        match self {
            FieldType::Bool => "boolean",
            FieldType::Int => "integer",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Json => "JSON value",
        }
    }
}

/// Normalize a boolean from any accepted wire representation.
///
/// Accepts `true`/`false`, `"true"`/`"false"`, `"1"`/`"0"`, and `""` as false.
pub fn coerce_bool(field: &str, value: &ParamValue) -> GatewayResult<bool> {
    match value {
        ParamValue::Bool(b) => Ok(*b),
        ParamValue::String(s) => match s.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            _ => Err(type_error(field, FieldType::Bool)),
        },
        _ => Err(type_error(field, FieldType::Bool)),
    }
}

pub fn coerce_int(field: &str, value: &ParamValue) -> GatewayResult<i64> {
    match value {
        ParamValue::Number(n) => n.as_i64().ok_or_else(|| type_error(field, FieldType::Int)),
        ParamValue::String(s) => s.trim().parse().map_err(|_| type_error(field, FieldType::Int)),
        _ => Err(type_error(field, FieldType::Int)),
    }
}

pub fn coerce_float(field: &str, value: &ParamValue) -> GatewayResult<f64> {
    match value {
        ParamValue::Number(n) => n.as_f64().ok_or_else(|| type_error(field, FieldType::Float)),
        ParamValue::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| type_error(field, FieldType::Float)),
        _ => Err(type_error(field, FieldType::Float)),
    }
}

/// Coerce one value to `ty`, returning the canonical representation.
pub fn coerce_value(field: &str, ty: FieldType, value: &ParamValue) -> GatewayResult<ParamValue> {
    match ty {
        FieldType::Bool => coerce_bool(field, value).map(ParamValue::Bool),
        FieldType::Int => coerce_int(field, value).map(|i| ParamValue::Number(i.into())),
        FieldType::Float => {
            let f = coerce_float(field, value)?;
            serde_json::Number::from_f64(f)
                .map(ParamValue::Number)
                .ok_or_else(|| type_error(field, ty))
        }
        FieldType::String => match value {
            ParamValue::String(_) => Ok(value.clone()),
            ParamValue::Number(n) => Ok(ParamValue::String(n.to_string())),
            _ => Err(type_error(field, ty)),
        },
        FieldType::Json => match value {
            ParamValue::String(s) => serde_json::from_str::<serde_json::Value>(s)
                .map(ParamValue::from)
                .map_err(|_| type_error(field, ty)),
            ParamValue::Null => Err(type_error(field, ty)),
            other => Ok(other.clone()),
        },
    }
}

/// Apply declared field types to `params` in place. Absent fields are skipped.
pub fn coerce_declared(params: &mut ParamSet, fields: &BTreeMap<String, FieldType>) -> GatewayResult<()> {
    for (field, ty) in fields {
        if let Some(value) = params.get(field) {
            let coerced = coerce_value(field, *ty, value)?;
            params.insert(field.clone(), coerced);
        }
    }
    Ok(())
}

impl ParamSet {
    /// Read `key` as a boolean, whatever representation it arrived in.
    pub fn get_bool(&self, key: &str) -> GatewayResult<Option<bool>> {
        self.get(key).map(|v| coerce_bool(key, v)).transpose()
    }

    pub fn get_int(&self, key: &str) -> GatewayResult<Option<i64>> {
        self.get(key).map(|v| coerce_int(key, v)).transpose()
    }

    pub fn get_float(&self, key: &str) -> GatewayResult<Option<f64>> {
        self.get(key).map(|v| coerce_float(key, v)).transpose()
    }
}

fn type_error(field: &str, ty: FieldType) -> GatewayError {
    GatewayError::Type {
        field: field.to_string(),
        expected: ty.name(),
    }
}
