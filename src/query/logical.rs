// Logical Composer - AND / OR / NOT over where-objects
// Every nested where-object passes through `parse_where`, which owns the depth guard

use serde_json::Value;

use crate::core::input::{expect_array, expect_object, one_or_many};
use crate::core::{EntityId, FieldPath};
use crate::ent_schema::{EntitySchema, FieldType};
use crate::error::{ValidationError, ValidationResult};
use crate::query::{FilterNode, FilterParser};

impl<'r> FilterParser<'r> {
    /// Validate a where-object for `entity`. Several keys form an implicit AND.
    pub(crate) fn parse_where(
        &self,
        entity: EntityId,
        value: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<FilterNode> {
        let depth = self.enter(depth, path)?;
        let object = expect_object(value, path)?;
        let schema = self.registry.resolve(entity, path)?;

        let mut nodes = Vec::with_capacity(object.len());
        for (key, operand) in object {
            let key_path = path.key(key);
            let node = match key.as_str() {
                "AND" => FilterNode::And(self.parse_children(entity, operand, &key_path, depth)?),
                "NOT" => FilterNode::Not(self.parse_children(entity, operand, &key_path, depth)?),
                "OR" => {
                    expect_array(operand, &key_path)?;
                    FilterNode::Or(self.parse_children(entity, operand, &key_path, depth)?)
                }
                _ => self.parse_field(schema, key, operand, &key_path, depth)?,
            };
            nodes.push(node);
        }

        Ok(match nodes.len() {
            1 => nodes.remove(0),
            _ => FilterNode::And(nodes),
        })
    }

    /// One where-object or an array of them; fails on the first invalid child
    fn parse_children(
        &self,
        entity: EntityId,
        value: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<Vec<FilterNode>> {
        one_or_many(value, path)
            .into_iter()
            .map(|(child, child_path)| self.parse_where(entity, child, &child_path, depth))
            .collect()
    }

    fn parse_field(
        &self,
        schema: &EntitySchema,
        name: &str,
        value: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<FilterNode> {
        let field = schema.field(name).ok_or_else(|| {
            ValidationError::unknown_field(
                path.clone(),
                format!("unknown field '{}' on {}", name, schema.name()),
            )
        })?;
        let field_name = name.to_string();

        match &field.field_type {
            FieldType::Scalar(kind) => Ok(FilterNode::Scalar {
                field: field_name,
                filter: self.parse_scalar_filter(kind, field.optional, value, path, depth)?,
            }),
            FieldType::ScalarList(kind) => Ok(FilterNode::List {
                field: field_name,
                filter: self.parse_list_filter(kind, value, path)?,
            }),
            FieldType::Relation(rel) if rel.embedded => Ok(FilterNode::Embedded {
                field: field_name,
                element: rel.target_id(),
                filter: self.parse_embedded_filter(rel, value, path, depth)?,
            }),
            FieldType::Relation(rel) if rel.is_to_many() => Ok(FilterNode::ToMany {
                field: field_name,
                target: rel.target_id(),
                filter: self.parse_to_many_filter(rel, value, path, depth)?,
            }),
            FieldType::Relation(rel) => Ok(FilterNode::ToOne {
                field: field_name,
                target: rel.target_id(),
                filter: self.parse_to_one_filter(rel, value, path, depth)?,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::ErrorKind;
    use crate::schemas::create_schema_registry;
    use serde_json::json;

    fn nested_and(levels: usize) -> Value {
        let mut value = json!({"price": {"gt": 0}});
        for _ in 0..levels {
            value = json!({"AND": [value]});
        }
        value
    }

    #[test]
    fn test_foreign_entity_id_is_rejected() {
        let registry = create_schema_registry().unwrap();
        let parser = FilterParser::new(&registry, EngineConfig::default());
        let foreign = EntityId(registry.len() + 5);
        let err = parser
            .parse(foreign, &json!({"name": "x"}), &FieldPath::new("where"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownEntity);
    }

    #[test]
    fn test_and_requires_every_child() {
        let registry = create_schema_registry().unwrap();
        let parser = FilterParser::new(&registry, EngineConfig::default());
        let product = registry.lookup("Product").unwrap().id();
        let path = FieldPath::new("where");

        assert!(parser.parse(product, &json!({"AND": [{"price": 1}, {"hot": true}]}), &path).is_ok());
        let err = parser
            .parse(product, &json!({"AND": [{"price": 1}, {"warmth": true}]}), &path)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
        assert_eq!(err.path.to_string(), "where.AND[1].warmth");
    }

    #[test]
    fn test_single_object_and_not_are_normalized() {
        let registry = create_schema_registry().unwrap();
        let parser = FilterParser::new(&registry, EngineConfig::default());
        let product = registry.lookup("Product").unwrap().id();
        let filter = parser
            .parse(product, &json!({"NOT": {"hot": true}}), &FieldPath::new("where"))
            .unwrap();
        match filter.node {
            FilterNode::Not(children) => assert_eq!(children.len(), 1),
            other => panic!("expected NOT, got {:?}", other),
        }
    }

    #[test]
    fn test_or_requires_array() {
        let registry = create_schema_registry().unwrap();
        let parser = FilterParser::new(&registry, EngineConfig::default());
        let product = registry.lookup("Product").unwrap().id();
        let err = parser
            .parse(product, &json!({"OR": {"hot": true}}), &FieldPath::new("where"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
    }

    #[test]
    fn test_depth_guard() {
        let registry = create_schema_registry().unwrap();
        let parser = FilterParser::new(&registry, EngineConfig::default());
        let product = registry.lookup("Product").unwrap().id();
        let path = FieldPath::new("where");

        assert!(parser.parse(product, &nested_and(10), &path).is_ok());
        let err = parser.parse(product, &nested_and(100), &path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursionLimitExceeded);
    }
}
