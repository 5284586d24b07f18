// Relation Filter Resolver - some/every/none and is/isNot predicates
// Sub-filters recurse into the full where-object grammar of the related entity

use serde_json::Value;

use crate::core::input::{expect_bool, expect_object};
use crate::core::{EntityId, FieldPath};
use crate::ent_schema::RelationDefinition;
use crate::error::{ValidationError, ValidationResult};
use crate::query::{
    EmbeddedFilter, FilterNode, FilterParser, ToManyFilter, ToOneCondition, ToOneFilter,
};

impl<'r> FilterParser<'r> {
    pub(crate) fn parse_to_many_filter(
        &self,
        rel: &RelationDefinition,
        value: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<ToManyFilter> {
        let object = expect_object(value, path)?;
        let target = rel.target_id();
        let mut filter = ToManyFilter::default();
        for (key, operand) in object {
            let key_path = path.key(key);
            let node = self.parse_where_checked(
                key,
                &["every", "some", "none"],
                target,
                operand,
                &key_path,
                depth,
            )?;
            let node = Some(Box::new(node));
            match key.as_str() {
                "every" => filter.every = node,
                "some" => filter.some = node,
                _ => filter.none = node,
            }
        }
        Ok(filter)
    }

    /// `is` / `isNot`, or a where-object on the target as shorthand for `is`.
    ///
    /// `null` targets an absent relation and is only accepted when the
    /// relation is optional.
    pub(crate) fn parse_to_one_filter(
        &self,
        rel: &RelationDefinition,
        value: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<ToOneFilter> {
        let target = rel.target_id();
        let absence_allowed = |p: &FieldPath| {
            if rel.required {
                Err(ValidationError::schema_violation(
                    p.clone(),
                    format!("relation to {} is required and can never be absent", rel.target),
                ))
            } else {
                Ok(())
            }
        };

        if value.is_null() {
            absence_allowed(path)?;
            return Ok(ToOneFilter {
                conditions: vec![ToOneCondition::IsAbsent],
            });
        }

        let object = expect_object(value, path)?;
        let explicit = !object.is_empty() && object.keys().all(|k| k == "is" || k == "isNot");
        if !explicit {
            let node = self.parse_where(target, value, path, depth)?;
            return Ok(ToOneFilter {
                conditions: vec![ToOneCondition::Is(Box::new(node))],
            });
        }

        let mut filter = ToOneFilter::default();
        for (key, operand) in object {
            let key_path = path.key(key);
            let condition = match (key.as_str(), operand.is_null()) {
                ("is", true) => {
                    absence_allowed(&key_path)?;
                    ToOneCondition::IsAbsent
                }
                ("isNot", true) => {
                    absence_allowed(&key_path)?;
                    ToOneCondition::IsPresent
                }
                ("is", false) => {
                    ToOneCondition::Is(Box::new(self.parse_where(target, operand, &key_path, depth)?))
                }
                _ => ToOneCondition::IsNot(Box::new(self.parse_where(target, operand, &key_path, depth)?)),
            };
            filter.conditions.push(condition);
        }
        Ok(filter)
    }

    /// Predicates over an embedded list, with element filters scoped to the composite schema
    pub(crate) fn parse_embedded_filter(
        &self,
        rel: &RelationDefinition,
        value: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<EmbeddedFilter> {
        let object = expect_object(value, path)?;
        let element = rel.target_id();
        let mut filter = EmbeddedFilter::default();
        for (key, operand) in object {
            let key_path = path.key(key);
            if key == "isEmpty" {
                filter.is_empty = Some(expect_bool(operand, &key_path)?);
                continue;
            }
            let node = Some(Box::new(self.parse_where_checked(
                key,
                &["every", "some", "none"],
                element,
                operand,
                &key_path,
                depth,
            )?));
            match key.as_str() {
                "every" => filter.every = node,
                "some" => filter.some = node,
                _ => filter.none = node,
            }
        }
        Ok(filter)
    }

    fn parse_where_checked(
        &self,
        key: &str,
        allowed: &[&str],
        entity: EntityId,
        operand: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<FilterNode> {
        if !allowed.contains(&key) {
            return Err(ValidationError::unknown_field(
                path.clone(),
                format!("unknown relation filter '{}', expected one of {}", key, allowed.join(", ")),
            ));
        }
        self.parse_where(entity, operand, path, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::ErrorKind;
    use crate::query::EntityFilter;
    use crate::schemas::create_schema_registry;
    use serde_json::json;

    fn parse(entity: &str, value: Value) -> ValidationResult<EntityFilter> {
        let registry = create_schema_registry().unwrap();
        let parser = FilterParser::new(&registry, EngineConfig::default());
        let id = registry.lookup(entity).unwrap().id();
        parser.parse(id, &value, &FieldPath::new("where"))
    }

    #[test]
    fn test_to_many_quantifiers_recurse_into_target() {
        let filter = parse(
            "Company",
            json!({"products": {"every": {"price": {"gt": 0}}, "some": {"hot": true}, "none": {"available": false}}}),
        )
        .unwrap();
        match filter.node {
            FilterNode::ToMany { filter, .. } => {
                assert!(filter.every.is_some() && filter.some.is_some() && filter.none.is_some());
            }
            other => panic!("expected to-many node, got {:?}", other),
        }

        let err = parse("Company", json!({"products": {"every": {"colour": "red"}}})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
        assert_eq!(err.path.to_string(), "where.products.every.colour");

        let err = parse("Company", json!({"products": {"any": {}}})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
    }

    #[test]
    fn test_to_one_is_is_not_and_shorthand() {
        let explicit = parse("Order", json!({"coupon": {"is": {"code": "X"}, "isNot": {"active": false}}})).unwrap();
        let shorthand = parse("Order", json!({"coupon": {"code": "X"}})).unwrap();
        match (explicit.node, shorthand.node) {
            (FilterNode::ToOne { filter: a, .. }, FilterNode::ToOne { filter: b, .. }) => {
                assert_eq!(a.conditions.len(), 2);
                assert!(matches!(b.conditions[0], ToOneCondition::Is(_)));
            }
            other => panic!("expected to-one nodes, got {:?}", other),
        }
    }

    #[test]
    fn test_absence_only_for_optional_relations() {
        let filter = parse("Order", json!({"coupon": {"is": null}})).unwrap();
        match filter.node {
            FilterNode::ToOne { filter, .. } => assert_eq!(filter.conditions, vec![ToOneCondition::IsAbsent]),
            other => panic!("expected to-one node, got {:?}", other),
        }
        let err = parse("Product", json!({"company": null})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);
    }

    #[test]
    fn test_embedded_filters_use_element_schema() {
        assert!(parse("Order", json!({"items": {"some": {"size": "M"}, "isEmpty": false}})).is_ok());
        let err = parse("Order", json!({"items": {"some": {"business": {}}}})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
    }
}
