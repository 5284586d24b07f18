// Scalar Field Update Operators - set / unset / arithmetic deltas and list set / push

use serde::Serialize;
use serde_json::{Number, Value};

use crate::core::input::{expect_bool, json_type_name};
use crate::core::{FieldPath, ScalarValue};
use crate::ent_schema::{MirrorLink, ScalarKind};
use crate::error::{ValidationError, ValidationResult};
use crate::query::coerce_scalar;

const ARITHMETIC_OPERATORS: &[&str] = &["increment", "decrement", "multiply", "divide"];

/// One operator applied to a scalar field.
///
/// `Unset` removes the field from the document; `Set(Null)` keeps it present
/// with a null value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarUpdate {
    Set(ScalarValue),
    Unset,
    Increment(ScalarValue),
    Decrement(ScalarValue),
    Multiply(ScalarValue),
    Divide(ScalarValue),
}

/// Replace and/or append on a scalar list; `set` applies before `push`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListUpdate {
    pub set: Option<Vec<ScalarValue>>,
    pub push: Option<Vec<ScalarValue>>,
    /// Present when the list backs a mirrored many-to-many relation
    pub mirror: Option<MirrorLink>,
}

fn allowed_update_operators(kind: &ScalarKind, nullable: bool) -> Vec<&'static str> {
    let mut ops = vec!["set"];
    if kind.is_numeric() {
        ops.extend_from_slice(ARITHMETIC_OPERATORS);
    }
    if nullable {
        ops.push("unset");
    }
    ops
}

/// Validate the update of one scalar field. A bare value is shorthand for `set`.
pub fn parse_scalar_update(
    kind: &ScalarKind,
    nullable: bool,
    value: &Value,
    path: &FieldPath,
) -> ValidationResult<ScalarUpdate> {
    let object = match value {
        Value::Object(object) => object,
        bare => return Ok(ScalarUpdate::Set(coerce_scalar(kind, nullable, bare, path)?)),
    };

    let allowed = allowed_update_operators(kind, nullable);
    if let Some(unknown) = object.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ValidationError::unknown_field(
            path.key(unknown),
            format!(
                "unknown update operator '{}' for {} field, expected one of {}",
                unknown,
                kind.type_name(),
                allowed.join(", ")
            ),
        ));
    }

    let mut entries = object.iter();
    let (op, operand) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        (None, _) => {
            return Err(ValidationError::schema_violation(
                path.clone(),
                "expected exactly one update operator",
            ))
        }
        (Some(_), Some(_)) => {
            let ops: Vec<&str> = object.keys().map(String::as_str).collect();
            return Err(ValidationError::ambiguous(
                path.clone(),
                format!("update operators {} are mutually exclusive", ops.join(", ")),
            ));
        }
    };

    let op_path = path.key(op);
    let update = match op.as_str() {
        "set" => ScalarUpdate::Set(coerce_scalar(kind, nullable, operand, &op_path)?),
        "unset" => {
            if !expect_bool(operand, &op_path)? {
                return Err(ValidationError::schema_violation(op_path, "unset only accepts true"));
            }
            ScalarUpdate::Unset
        }
        _ => {
            let delta = coerce_scalar(kind, false, operand, &op_path)?;
            match op.as_str() {
                "increment" => ScalarUpdate::Increment(delta),
                "decrement" => ScalarUpdate::Decrement(delta),
                "multiply" => ScalarUpdate::Multiply(delta),
                _ => {
                    if delta.as_f64() == Some(0.0) {
                        return Err(ValidationError::schema_violation(op_path, "division by zero"));
                    }
                    ScalarUpdate::Divide(delta)
                }
            }
        }
    };
    Ok(update)
}

/// Validate the update of a scalar list: a bare array replaces, otherwise `set` and/or `push`
pub fn parse_list_update(
    kind: &ScalarKind,
    value: &Value,
    path: &FieldPath,
    mirror: Option<MirrorLink>,
) -> ValidationResult<ListUpdate> {
    let mut update = ListUpdate {
        mirror,
        ..ListUpdate::default()
    };
    let object = match value {
        Value::Array(_) => {
            update.set = Some(coerce_elements(kind, value, path)?);
            return Ok(update);
        }
        Value::Object(object) => object,
        other => {
            return Err(ValidationError::schema_violation(
                path.clone(),
                format!("expected an array or a list update, got {}", json_type_name(other)),
            ))
        }
    };
    if object.is_empty() {
        return Err(ValidationError::schema_violation(
            path.clone(),
            "expected set and/or push",
        ));
    }

    for (op, operand) in object {
        let op_path = path.key(op);
        match op.as_str() {
            "set" => update.set = Some(coerce_elements(kind, operand, &op_path)?),
            "push" => update.push = Some(coerce_elements(kind, operand, &op_path)?),
            other => {
                return Err(ValidationError::unknown_field(
                    op_path,
                    format!("unknown list update operator '{}', expected set or push", other),
                ))
            }
        }
    }
    Ok(update)
}

/// Elements of a scalar list; a single element is accepted for `push`
pub(crate) fn coerce_elements(
    kind: &ScalarKind,
    value: &Value,
    path: &FieldPath,
) -> ValidationResult<Vec<ScalarValue>> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| coerce_scalar(kind, false, item, &path.index(i)))
            .collect(),
        single => Ok(vec![coerce_scalar(kind, false, single, path)?]),
    }
}

impl ScalarUpdate {
    /// New value of the field given its current one; `None` means absent.
    ///
    /// Arithmetic on an absent or null field leaves it untouched.
    pub fn apply(&self, current: Option<&Value>) -> Option<Value> {
        match self {
            ScalarUpdate::Set(value) => Some(value.to_json()),
            ScalarUpdate::Unset => None,
            ScalarUpdate::Increment(d) => arithmetic(current, d, i64::saturating_add, |a, b| a + b),
            ScalarUpdate::Decrement(d) => arithmetic(current, d, i64::saturating_sub, |a, b| a - b),
            ScalarUpdate::Multiply(d) => arithmetic(current, d, i64::saturating_mul, |a, b| a * b),
            ScalarUpdate::Divide(d) => arithmetic(current, d, i64::saturating_div, |a, b| a / b),
        }
    }
}

/// Integer fields stay integral and saturate at the i64 bounds
fn arithmetic(
    current: Option<&Value>,
    operand: &ScalarValue,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Option<Value> {
    let stored = match current {
        Some(Value::Number(n)) => n,
        other => return other.cloned(),
    };

    if let (Some(a), ScalarValue::Int(b)) = (stored.as_i64(), operand) {
        return Some(Value::from(int_op(a, *b)));
    }
    let result = match (stored.as_f64(), operand.as_f64()) {
        (Some(a), Some(b)) => Number::from_f64(float_op(a, b)),
        _ => None,
    };
    match result {
        Some(n) => Some(Value::Number(n)),
        None => current.cloned(),
    }
}

impl ListUpdate {
    pub fn apply(&self, current: Option<&Value>) -> Value {
        let mut items = match (&self.set, current) {
            (Some(set), _) => set.iter().map(ScalarValue::to_json).collect(),
            (None, Some(Value::Array(existing))) => existing.clone(),
            (None, _) => Vec::new(),
        };
        if let Some(push) = &self.push {
            items.extend(push.iter().map(ScalarValue::to_json));
        }
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn price_path() -> FieldPath {
        FieldPath::new("data").key("price")
    }

    #[test]
    fn test_bare_value_is_set() {
        let update = parse_scalar_update(&ScalarKind::Int, false, &json!(5), &price_path()).unwrap();
        assert_eq!(update, ScalarUpdate::Set(ScalarValue::Int(5)));
    }

    #[test]
    fn test_set_and_increment_are_ambiguous() {
        let err = parse_scalar_update(
            &ScalarKind::Int,
            false,
            &json!({"set": 5, "increment": 1}),
            &price_path(),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousUpdateOperator);
        assert_eq!(err.path.to_string(), "data.price");

        let err = parse_scalar_update(&ScalarKind::Int, false, &json!({}), &price_path()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
    }

    #[test]
    fn test_arithmetic_only_on_numbers() {
        let path = FieldPath::new("data").key("name");
        let err = parse_scalar_update(&ScalarKind::String, false, &json!({"increment": 1}), &path)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);

        let err = parse_scalar_update(&ScalarKind::Int, false, &json!({"divide": 0}), &price_path())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);

        let err = parse_scalar_update(&ScalarKind::Int, false, &json!({"increment": 1.5}), &price_path())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
    }

    #[test]
    fn test_unset_differs_from_set_null() {
        let path = FieldPath::new("data").key("dec");
        let unset = parse_scalar_update(&ScalarKind::String, true, &json!({"unset": true}), &path).unwrap();
        let null = parse_scalar_update(&ScalarKind::String, true, &json!({"set": null}), &path).unwrap();
        assert_eq!(unset, ScalarUpdate::Unset);
        assert_eq!(null, ScalarUpdate::Set(ScalarValue::Null));
        assert_eq!(unset.apply(Some(&json!("x"))), None);
        assert_eq!(null.apply(Some(&json!("x"))), Some(Value::Null));

        let err = parse_scalar_update(&ScalarKind::String, true, &json!({"unset": false}), &path)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
        let err = parse_scalar_update(&ScalarKind::Int, false, &json!({"unset": true}), &price_path())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
        let err = parse_scalar_update(&ScalarKind::Int, false, &json!({"set": null}), &price_path())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
    }

    #[test]
    fn test_arithmetic_apply() {
        let inc = ScalarUpdate::Increment(ScalarValue::Int(2));
        assert_eq!(inc.apply(Some(&json!(40))), Some(json!(42)));
        assert_eq!(inc.apply(None), None);
        assert_eq!(inc.apply(Some(&Value::Null)), Some(Value::Null));

        let halve = ScalarUpdate::Divide(ScalarValue::Float(2.0));
        assert_eq!(halve.apply(Some(&json!(5.0))), Some(json!(2.5)));
        let int_div = ScalarUpdate::Divide(ScalarValue::Int(2));
        assert_eq!(int_div.apply(Some(&json!(5))), Some(json!(2)));
    }

    #[test]
    fn test_int_arithmetic_saturates_instead_of_widening() {
        let inc = ScalarUpdate::Increment(ScalarValue::Int(1));
        assert_eq!(inc.apply(Some(&json!(i64::MAX))), Some(json!(i64::MAX)));

        let dec = ScalarUpdate::Decrement(ScalarValue::Int(1));
        assert_eq!(dec.apply(Some(&json!(i64::MIN))), Some(json!(i64::MIN)));

        let double = ScalarUpdate::Multiply(ScalarValue::Int(2));
        let result = double.apply(Some(&json!(i64::MAX / 2 + 1))).unwrap();
        assert!(result.is_i64());
        assert_eq!(result, json!(i64::MAX));

        let flip = ScalarUpdate::Divide(ScalarValue::Int(-1));
        assert_eq!(flip.apply(Some(&json!(i64::MIN))), Some(json!(i64::MAX)));
    }

    #[test]
    fn test_list_set_then_push() {
        let update = parse_list_update(
            &ScalarKind::String,
            &json!({"set": ["a"], "push": "b"}),
            &FieldPath::new("data").key("views"),
            None,
        )
        .unwrap();
        assert_eq!(update.apply(Some(&json!(["x", "y"]))), json!(["a", "b"]));

        let push_only = parse_list_update(
            &ScalarKind::String,
            &json!({"push": ["b", "b"]}),
            &FieldPath::new("data").key("views"),
            None,
        )
        .unwrap();
        assert_eq!(push_only.apply(Some(&json!(["b"]))), json!(["b", "b", "b"]));

        let err = parse_list_update(
            &ScalarKind::String,
            &json!({"append": ["b"]}),
            &FieldPath::new("data").key("views"),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
    }
}
