// Query arguments - where / orderBy / take / skip for list reads

use serde::Serialize;
use serde_json::Value;

use crate::core::input::{expect_object, one_or_many};
use crate::core::{EntityId, FieldPath};
use crate::ent_schema::FieldType;
use crate::error::{ValidationError, ValidationResult};
use crate::query::{EntityFilter, FilterParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub field: String,
    pub order: SortOrder,
}

/// Validated arguments of a `findMany` read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindManyArgs {
    pub filter: Option<EntityFilter>,
    pub order_by: Vec<OrderBy>,
    /// Negative values take from the end of the ordered result
    pub take: Option<i64>,
    pub skip: Option<u64>,
}

impl<'r> FilterParser<'r> {
    pub fn parse_find_many(
        &self,
        entity: EntityId,
        value: &Value,
        path: &FieldPath,
    ) -> ValidationResult<FindManyArgs> {
        let mut args = FindManyArgs {
            filter: None,
            order_by: Vec::new(),
            take: None,
            skip: None,
        };
        if value.is_null() {
            return Ok(args);
        }

        for (key, operand) in expect_object(value, path)? {
            let key_path = path.key(key);
            match key.as_str() {
                "where" => args.filter = Some(self.parse(entity, operand, &key_path)?),
                "orderBy" => args.order_by = self.parse_order_by(entity, operand, &key_path)?,
                "take" => {
                    args.take = Some(operand.as_i64().ok_or_else(|| {
                        ValidationError::schema_violation(key_path.clone(), "take must be an integer")
                    })?)
                }
                "skip" => {
                    args.skip = Some(operand.as_u64().ok_or_else(|| {
                        ValidationError::schema_violation(
                            key_path.clone(),
                            "skip must be a non-negative integer",
                        )
                    })?)
                }
                other => {
                    return Err(ValidationError::unknown_field(
                        key_path,
                        format!("unknown findMany argument '{}'", other),
                    ))
                }
            }
        }
        Ok(args)
    }

    fn parse_order_by(
        &self,
        entity: EntityId,
        value: &Value,
        path: &FieldPath,
    ) -> ValidationResult<Vec<OrderBy>> {
        let schema = self.registry.resolve(entity, path)?;
        let mut order_by = Vec::new();
        for (item, item_path) in one_or_many(value, path) {
            let object = expect_object(item, &item_path)?;
            if object.len() != 1 {
                return Err(ValidationError::schema_violation(
                    item_path,
                    "each orderBy object must name exactly one field",
                ));
            }
            for (name, direction) in object {
                let field_path = item_path.key(name);
                match schema.field(name).map(|f| &f.field_type) {
                    Some(FieldType::Scalar(_)) => {}
                    Some(_) => {
                        return Err(ValidationError::schema_violation(
                            field_path,
                            format!("cannot order by non-scalar field '{}'", name),
                        ))
                    }
                    None => {
                        return Err(ValidationError::unknown_field(
                            field_path,
                            format!("unknown field '{}' on {}", name, schema.name()),
                        ))
                    }
                }
                let order = match direction.as_str() {
                    Some("asc") => SortOrder::Asc,
                    Some("desc") => SortOrder::Desc,
                    _ => {
                        return Err(ValidationError::schema_violation(
                            field_path,
                            format!("expected 'asc' or 'desc', got {}", direction),
                        ))
                    }
                };
                order_by.push(OrderBy {
                    field: name.clone(),
                    order,
                });
            }
        }
        Ok(order_by)
    }
}
