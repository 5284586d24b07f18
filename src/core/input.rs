// Input helpers - Shape checks over untrusted JSON input
// Shape failures are SchemaViolation at the given path; unexpected keys are UnknownField

use serde_json::{Map, Value};

use crate::core::strong_types::FieldPath;
use crate::error::{ValidationError, ValidationResult};

/// Short human name of a JSON value's type, used in error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn expect_object<'a>(value: &'a Value, path: &FieldPath) -> ValidationResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        ValidationError::schema_violation(
            path.clone(),
            format!("expected an object, got {}", json_type_name(value)),
        )
    })
}

pub fn expect_array<'a>(value: &'a Value, path: &FieldPath) -> ValidationResult<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| {
        ValidationError::schema_violation(
            path.clone(),
            format!("expected an array, got {}", json_type_name(value)),
        )
    })
}

pub fn expect_bool(value: &Value, path: &FieldPath) -> ValidationResult<bool> {
    value.as_bool().ok_or_else(|| {
        ValidationError::schema_violation(
            path.clone(),
            format!("expected a boolean, got {}", json_type_name(value)),
        )
    })
}

/// Object with a fixed set of argument keys, such as `{where, data}`
pub fn expect_keys<'a>(
    value: &'a Value,
    path: &FieldPath,
    allowed: &[&str],
    required: &[&str],
) -> ValidationResult<&'a Map<String, Value>> {
    let object = expect_object(value, path)?;
    if let Some(unknown) = object.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ValidationError::unknown_field(
            path.key(unknown),
            format!("unknown key '{}', expected {}", unknown, allowed.join(", ")),
        ));
    }
    if let Some(missing) = required.iter().find(|k| !object.contains_key(**k)) {
        return Err(ValidationError::schema_violation(
            path.clone(),
            format!("missing '{}'", missing),
        ));
    }
    Ok(object)
}

/// Accept either a single item or an array of items, returning each item with its own path.
///
/// A single item keeps the parent path; array items get an index segment.
pub fn one_or_many<'a>(value: &'a Value, path: &FieldPath) -> Vec<(&'a Value, FieldPath)> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (item, path.index(i)))
            .collect(),
        other => vec![(other, path.clone())],
    }
}
