// Scalar Filter Validator - Per-kind operator sets for leaf fields

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::core::input::{expect_array, expect_bool, json_type_name};
use crate::core::{FieldPath, ScalarValue};
use crate::ent_schema::ScalarKind;
use crate::error::{ValidationError, ValidationResult};
use crate::query::{FilterParser, QueryMode, ScalarCondition, ScalarFilter};

const STRING_OPERATORS: &[&str] = &[
    "equals", "in", "notIn", "lt", "lte", "gt", "gte", "contains", "startsWith", "endsWith",
    "mode", "not",
];
const ORDERED_OPERATORS: &[&str] = &["equals", "in", "notIn", "lt", "lte", "gt", "gte", "not"];
const BOOL_OPERATORS: &[&str] = &["equals", "not"];
const ENUM_OPERATORS: &[&str] = &["equals", "in", "notIn", "not"];

/// Operator keys accepted for a scalar kind; nullable fields also accept `isSet`
pub fn allowed_operators(kind: &ScalarKind) -> &'static [&'static str] {
    match kind {
        ScalarKind::String => STRING_OPERATORS,
        ScalarKind::Int | ScalarKind::Float | ScalarKind::Date => ORDERED_OPERATORS,
        ScalarKind::Bool => BOOL_OPERATORS,
        ScalarKind::Enum(_) => ENUM_OPERATORS,
    }
}

/// Parse a calendar timestamp: RFC 3339, or `YYYY-MM-DD` taken as midnight UTC
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Type-check one JSON value against a scalar kind
pub fn coerce_scalar(
    kind: &ScalarKind,
    nullable: bool,
    value: &Value,
    path: &FieldPath,
) -> ValidationResult<ScalarValue> {
    let mismatch = || {
        ValidationError::schema_violation(
            path.clone(),
            format!("expected {}, got {}", kind.type_name(), json_type_name(value)),
        )
    };

    if value.is_null() {
        return if nullable {
            Ok(ScalarValue::Null)
        } else {
            Err(ValidationError::schema_violation(
                path.clone(),
                format!("{} value cannot be null", kind.type_name()),
            ))
        };
    }

    match kind {
        ScalarKind::String => value
            .as_str()
            .map(|s| ScalarValue::String(s.to_string()))
            .ok_or_else(mismatch),
        ScalarKind::Int => {
            if !value.is_number() {
                return Err(mismatch());
            }
            value.as_i64().map(ScalarValue::Int).ok_or_else(|| {
                ValidationError::schema_violation(
                    path.clone(),
                    format!("{} is not a 64-bit integer", value),
                )
            })
        }
        ScalarKind::Float => value.as_f64().map(ScalarValue::Float).ok_or_else(mismatch),
        ScalarKind::Bool => value.as_bool().map(ScalarValue::Bool).ok_or_else(mismatch),
        ScalarKind::Date => {
            let raw = value.as_str().ok_or_else(mismatch)?;
            parse_date(raw).map(ScalarValue::Date).ok_or_else(|| {
                ValidationError::schema_violation(
                    path.clone(),
                    format!("'{}' is not a valid date", raw),
                )
            })
        }
        ScalarKind::Enum(def) => {
            let raw = value.as_str().ok_or_else(mismatch)?;
            if def.contains(raw) {
                Ok(ScalarValue::Enum(raw.to_string()))
            } else {
                Err(ValidationError::schema_violation(
                    path.clone(),
                    format!(
                        "'{}' is not a variant of {} ({})",
                        raw,
                        def.name,
                        def.variants.join(", ")
                    ),
                ))
            }
        }
    }
}

fn coerce_all(
    kind: &ScalarKind,
    nullable: bool,
    value: &Value,
    path: &FieldPath,
) -> ValidationResult<Vec<ScalarValue>> {
    expect_array(value, path)?
        .iter()
        .enumerate()
        .map(|(i, item)| coerce_scalar(kind, nullable, item, &path.index(i)))
        .collect()
}

fn expect_str(value: &Value, path: &FieldPath) -> ValidationResult<String> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        ValidationError::schema_violation(
            path.clone(),
            format!("expected a string, got {}", json_type_name(value)),
        )
    })
}

fn parse_mode(value: &Value, path: &FieldPath) -> ValidationResult<QueryMode> {
    match value.as_str() {
        Some("default") => Ok(QueryMode::Default),
        Some("insensitive") => Ok(QueryMode::Insensitive),
        _ => Err(ValidationError::schema_violation(
            path.clone(),
            "mode must be 'default' or 'insensitive'",
        )),
    }
}

impl<'r> FilterParser<'r> {
    /// Validate the filter for one scalar field.
    ///
    /// A bare value is shorthand for `equals`.
    pub(crate) fn parse_scalar_filter(
        &self,
        kind: &ScalarKind,
        nullable: bool,
        value: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<ScalarFilter> {
        self.parse_scalar_filter_in(kind, nullable, value, path, depth, QueryMode::Default)
    }

    /// `inherited` is the mode of the enclosing filter; a `not` sub-filter
    /// compares the same way unless it sets its own `mode`.
    fn parse_scalar_filter_in(
        &self,
        kind: &ScalarKind,
        nullable: bool,
        value: &Value,
        path: &FieldPath,
        depth: usize,
        inherited: QueryMode,
    ) -> ValidationResult<ScalarFilter> {
        let Some(operators) = value.as_object() else {
            let equals = coerce_scalar(kind, nullable, value, path)?;
            return Ok(ScalarFilter {
                conditions: vec![ScalarCondition::Equals(equals)],
                mode: inherited,
            });
        };

        let allowed = allowed_operators(kind);
        let mut filter = ScalarFilter {
            conditions: Vec::new(),
            mode: inherited,
        };
        if allowed.contains(&"mode") {
            if let Some(mode) = operators.get("mode") {
                filter.mode = parse_mode(mode, &path.key("mode"))?;
            }
        }
        for (op, operand) in operators {
            let op_path = path.key(op);
            let unknown = || {
                ValidationError::unknown_field(
                    op_path.clone(),
                    format!("unknown operator '{}' for {} field", op, kind.type_name()),
                )
            };
            if !(allowed.contains(&op.as_str()) || (nullable && op == "isSet")) {
                return Err(unknown());
            }

            let condition = match op.as_str() {
                "equals" => ScalarCondition::Equals(coerce_scalar(kind, nullable, operand, &op_path)?),
                "in" => ScalarCondition::In(coerce_all(kind, nullable, operand, &op_path)?),
                "notIn" => ScalarCondition::NotIn(coerce_all(kind, nullable, operand, &op_path)?),
                "lt" => ScalarCondition::Lt(coerce_scalar(kind, false, operand, &op_path)?),
                "lte" => ScalarCondition::Lte(coerce_scalar(kind, false, operand, &op_path)?),
                "gt" => ScalarCondition::Gt(coerce_scalar(kind, false, operand, &op_path)?),
                "gte" => ScalarCondition::Gte(coerce_scalar(kind, false, operand, &op_path)?),
                "contains" => ScalarCondition::Contains(expect_str(operand, &op_path)?),
                "startsWith" => ScalarCondition::StartsWith(expect_str(operand, &op_path)?),
                "endsWith" => ScalarCondition::EndsWith(expect_str(operand, &op_path)?),
                "isSet" => ScalarCondition::IsSet(expect_bool(operand, &op_path)?),
                // Parsed above
                "mode" => continue,
                "not" => {
                    let inner = if operand.is_object() {
                        let depth = self.enter(depth, &op_path)?;
                        self.parse_scalar_filter_in(kind, nullable, operand, &op_path, depth, filter.mode)?
                    } else {
                        ScalarFilter {
                            conditions: vec![ScalarCondition::Equals(coerce_scalar(
                                kind, nullable, operand, &op_path,
                            )?)],
                            mode: filter.mode,
                        }
                    };
                    ScalarCondition::Not(Box::new(inner))
                }
                _ => return Err(unknown()),
            };
            filter.conditions.push(condition);
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ent_schema::EnumDefinition;
    use crate::error::ErrorKind;
    use crate::schemas::create_schema_registry;
    use serde_json::json;

    fn with_parser<T>(f: impl FnOnce(&FilterParser) -> T) -> T {
        let registry = create_schema_registry().unwrap();
        let parser = FilterParser::new(&registry, EngineConfig::default());
        f(&parser)
    }

    fn parse(kind: &ScalarKind, nullable: bool, value: Value) -> ValidationResult<ScalarFilter> {
        with_parser(|p| p.parse_scalar_filter(kind, nullable, &value, &FieldPath::new("where"), 1))
    }

    #[test]
    fn test_every_string_operator_validates() {
        let filter = parse(
            &ScalarKind::String,
            false,
            json!({
                "equals": "a", "in": ["a"], "notIn": ["b"], "lt": "z", "lte": "z",
                "gt": "a", "gte": "a", "contains": "x", "startsWith": "s",
                "endsWith": "e", "mode": "insensitive", "not": {"contains": "q"}
            }),
        )
        .unwrap();
        assert_eq!(filter.mode, QueryMode::Insensitive);
        assert_eq!(filter.conditions.len(), 11);
    }

    #[test]
    fn test_numeric_operators_and_rejections() {
        let int_ops = json!({"equals": 1, "in": [1, 2], "notIn": [3], "lt": 9, "lte": 9, "gt": 0, "gte": 0, "not": 5});
        assert!(parse(&ScalarKind::Int, false, int_ops.clone()).is_ok());
        assert!(parse(&ScalarKind::Float, false, int_ops).is_ok());

        let err = parse(&ScalarKind::Int, false, json!({"contains": "1"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
        assert_eq!(err.path.to_string(), "where.contains");

        let err = parse(&ScalarKind::Int, false, json!({"equals": 1.5})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
    }

    #[test]
    fn test_not_inherits_outer_mode() {
        let filter = parse(&ScalarKind::String, false, json!({"not": "SOAP", "mode": "insensitive"})).unwrap();
        match &filter.conditions[0] {
            ScalarCondition::Not(inner) => assert_eq!(inner.mode, QueryMode::Insensitive),
            other => panic!("expected not, got {:?}", other),
        }

        let own = parse(
            &ScalarKind::String,
            false,
            json!({"mode": "insensitive", "not": {"equals": "SOAP", "mode": "default"}}),
        )
        .unwrap();
        match &own.conditions[0] {
            ScalarCondition::Not(inner) => assert_eq!(inner.mode, QueryMode::Default),
            other => panic!("expected not, got {:?}", other),
        }
    }

    #[test]
    fn test_bool_accepts_only_equals_and_not() {
        assert!(parse(&ScalarKind::Bool, false, json!({"equals": true, "not": false})).is_ok());
        let err = parse(&ScalarKind::Bool, false, json!({"in": [true]})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
    }

    #[test]
    fn test_dates_must_parse() {
        let ok = parse(
            &ScalarKind::Date,
            false,
            json!({"gte": "2024-01-01", "lt": "2024-02-01T10:00:00Z"}),
        );
        assert!(ok.is_ok());
        let err = parse(&ScalarKind::Date, false, json!({"gt": "last tuesday"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
        let err = parse(&ScalarKind::Date, false, json!({"not": {"lte": "soon"}})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
        assert_eq!(err.path.to_string(), "where.not.lte");
    }

    #[test]
    fn test_enum_values_must_be_declared() {
        let role = ScalarKind::Enum(EnumDefinition::new("WorkerRole", &["ADMIN", "DELIVERY"]));
        assert!(parse(&role, false, json!({"in": ["ADMIN", "DELIVERY"], "not": "ADMIN"})).is_ok());
        let err = parse(&role, false, json!("CEO")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
        let err = parse(&role, false, json!({"lt": "ADMIN"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
    }

    #[test]
    fn test_is_set_only_on_nullable_fields() {
        assert!(parse(&ScalarKind::String, true, json!({"isSet": false})).is_ok());
        let err = parse(&ScalarKind::String, false, json!({"isSet": true})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
    }

    #[test]
    fn test_null_requires_nullable_field() {
        assert_eq!(
            parse(&ScalarKind::Int, true, json!(null)).unwrap().conditions,
            vec![ScalarCondition::Equals(ScalarValue::Null)]
        );
        let err = parse(&ScalarKind::Int, false, json!(null)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
    }

    #[test]
    fn test_nested_not_counts_towards_depth() {
        let registry = create_schema_registry().unwrap();
        let parser = FilterParser::new(&registry, EngineConfig::default().with_max_depth(2).unwrap());
        let value = json!({"not": {"not": {"equals": "x"}}});
        let err = parser
            .parse_scalar_filter(&ScalarKind::String, false, &value, &FieldPath::new("where"), 1)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursionLimitExceeded);
    }
}
