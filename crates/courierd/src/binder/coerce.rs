//! Coercion of payload values to declared parameter kinds.

use serde_json::{Number, Value};

use crate::registry::{ParamKind, ParamSpec};

use super::BindingError;

pub(super) fn to_kind(spec: &ParamSpec, value: &Value) -> Result<Value, BindingError> {
    let coerced = match spec.kind() {
        ParamKind::Integer => integer(value).map(Value::from),
        ParamKind::Float => float(value)
            .and_then(Number::from_f64)
            .map(Value::Number),
        ParamKind::Boolean => boolean(value).map(Value::Bool),
        ParamKind::String => text(value).map(Value::String),
        _ => Some(value.clone()),
    };
    coerced.ok_or_else(|| {
        BindingError::new(
            spec.name(),
            format!("expected {}, got {value}", spec.kind().as_str()),
        )
    })
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok().filter(|parsed| parsed.is_finite()),
        _ => None,
    }
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Some(true),
            "false" | "off" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
