//! Parameter extraction and coercion for dispatched operations.

use super::failure::DispatchError;
use serde_json::{Map, Value};

pub(super) type Params = Map<String, Value>;

pub(super) fn required<'a>(params: &'a Params, field: &str) -> Result<&'a Value, DispatchError> {
    match params.get(field) {
        Some(Value::Null) | None => Err(DispatchError::MissingParam(field.to_string())),
        Some(value) => Ok(value),
    }
}

/// Integer as the remote side expects it: JSON integers, integral floats and
/// numeric strings are accepted; anything else names the offending field.
pub(super) fn coerce_int(field: &str, value: &Value) -> Result<i32, DispatchError> {
    let invalid = |reason: String| DispatchError::InvalidParam {
        field: field.to_string(),
        reason,
    };
    let wide = match value {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                int
            } else if let Some(float) = number.as_f64().filter(|f| f.fract() == 0.0) {
                if float.abs() > i64::MAX as f64 {
                    return Err(invalid(format!("{number} is out of range")));
                }
                float as i64
            } else {
                return Err(invalid(format!("expected an integer, got {number}")));
            }
        }
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(format!("expected an integer, got {text:?}")))?,
        Value::Bool(flag) => i64::from(*flag),
        other => return Err(invalid(format!("expected an integer, got {}", type_name(other)))),
    };
    i32::try_from(wide).map_err(|_| invalid(format!("{wide} is out of range")))
}

pub(super) fn required_int(params: &Params, field: &str) -> Result<i32, DispatchError> {
    coerce_int(field, required(params, field)?)
}

pub(super) fn int_or(params: &Params, field: &str, default: i32) -> Result<i32, DispatchError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => coerce_int(field, value),
    }
}

pub(super) fn coerce_string(field: &str, value: &Value) -> Result<String, DispatchError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(DispatchError::InvalidParam {
            field: field.to_string(),
            reason: format!("expected a string, got {}", type_name(other)),
        }),
    }
}

pub(super) fn required_string(params: &Params, field: &str) -> Result<String, DispatchError> {
    coerce_string(field, required(params, field)?)
}

pub(super) fn string_or(params: &Params, field: &str, default: &str) -> Result<String, DispatchError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(value) => coerce_string(field, value),
    }
}

/// Truthiness: `false`, `0`, `""`, `[]`, `{}` and `null` are false.
pub(super) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub(super) fn bool_or(params: &Params, field: &str, default: bool) -> bool {
    params.get(field).map_or(default, truthy)
}

pub(super) fn object<'a>(field: &str, value: &'a Value) -> Result<&'a Params, DispatchError> {
    value.as_object().ok_or_else(|| DispatchError::InvalidParam {
        field: field.to_string(),
        reason: format!("expected an object, got {}", type_name(value)),
    })
}

pub(super) fn array<'a>(field: &str, value: &'a Value) -> Result<&'a [Value], DispatchError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| DispatchError::InvalidParam {
            field: field.to_string(),
            reason: format!("expected an array, got {}", type_name(value)),
        })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
