// List-Field Filter Validator - Operators for scalar-array fields

use serde_json::Value;

use crate::core::input::{expect_array, expect_bool};
use crate::core::{FieldPath, ScalarValue};
use crate::ent_schema::ScalarKind;
use crate::error::{ValidationError, ValidationResult};
use crate::query::{coerce_scalar, FilterParser, ListCondition, ListFilter};

fn elements(kind: &ScalarKind, value: &Value, path: &FieldPath) -> ValidationResult<Vec<ScalarValue>> {
    expect_array(value, path)?
        .iter()
        .enumerate()
        .map(|(i, item)| coerce_scalar(kind, false, item, &path.index(i)))
        .collect()
}

impl<'r> FilterParser<'r> {
    /// Validate the filter for a scalar-list field.
    ///
    /// A bare array is shorthand for `equals`.
    pub(crate) fn parse_list_filter(
        &self,
        element: &ScalarKind,
        value: &Value,
        path: &FieldPath,
    ) -> ValidationResult<ListFilter> {
        if value.is_array() {
            return Ok(ListFilter {
                conditions: vec![ListCondition::Equals(elements(element, value, path)?)],
            });
        }
        let Some(operators) = value.as_object() else {
            return Err(ValidationError::schema_violation(
                path.clone(),
                "list filters take an operator object or an array",
            ));
        };

        let mut filter = ListFilter::default();
        for (op, operand) in operators {
            let op_path = path.key(op);
            let condition = match op.as_str() {
                "has" => ListCondition::Has(coerce_scalar(element, false, operand, &op_path)?),
                "hasEvery" => ListCondition::HasEvery(elements(element, operand, &op_path)?),
                "hasSome" => ListCondition::HasSome(elements(element, operand, &op_path)?),
                "isEmpty" => ListCondition::IsEmpty(expect_bool(operand, &op_path)?),
                "equals" => ListCondition::Equals(elements(element, operand, &op_path)?),
                other => {
                    return Err(ValidationError::unknown_field(
                        op_path,
                        format!("unknown list operator '{}'", other),
                    ))
                }
            };
            filter.conditions.push(condition);
        }
        Ok(filter)
    }
}
