// Unique selectors - `where` objects that address exactly one record

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::core::input::expect_object;
use crate::core::{EntityId, FieldPath, ScalarValue};
use crate::ent_schema::{FieldType, SchemaRegistry};
use crate::error::{ValidationError, ValidationResult};
use crate::query::eval::compare;
use crate::query::{coerce_scalar, QueryMode};

/// Unique-key lookup such as `{id: "..."}` or `{code: "SPRING"}`; all keys must match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueWhere {
    pub entity: EntityId,
    pub keys: BTreeMap<String, ScalarValue>,
}

impl UniqueWhere {
    pub fn parse(
        registry: &SchemaRegistry,
        entity: EntityId,
        value: &Value,
        path: &FieldPath,
    ) -> ValidationResult<Self> {
        let schema = registry.resolve(entity, path)?;
        let object = expect_object(value, path)?;
        if object.is_empty() {
            return Err(ValidationError::schema_violation(
                path.clone(),
                format!("expected at least one unique field of {}", schema.name()),
            ));
        }

        let mut keys = BTreeMap::new();
        for (name, raw) in object {
            let key_path = path.key(name);
            let kind = match schema.field(name) {
                Some(field) if field.unique => match &field.field_type {
                    FieldType::Scalar(kind) => kind,
                    _ => return Err(ValidationError::schema_violation(key_path, "unique keys must be scalar")),
                },
                _ => {
                    return Err(ValidationError::unknown_field(
                        key_path,
                        format!("'{}' is not a unique field of {}", name, schema.name()),
                    ))
                }
            };
            keys.insert(name.clone(), coerce_scalar(kind, false, raw, &key_path)?);
        }
        Ok(Self { entity, keys })
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.keys.iter().all(|(name, expected)| {
            doc.get(name)
                .and_then(|v| compare(v, expected, QueryMode::Default))
                == Some(Ordering::Equal)
        })
    }
}
