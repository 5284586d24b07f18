// Embedded Collection Mutator - set / push / updateMany / deleteMany on value-typed lists
//
// Embedded elements have no identity of their own, so none of the relation
// verbs apply. Element payloads and match filters are scoped to the composite schema.

use serde::Serialize;
use serde_json::Value;

use crate::core::input::{expect_keys, expect_object, one_or_many};
use crate::core::{EntityId, FieldPath};
use crate::ent_schema::RelationDefinition;
use crate::error::{ValidationError, ValidationResult};
use crate::mutation::nested::CreateScope;
use crate::mutation::{CreateData, MutationBuilder, UpdateData};
use crate::query::FilterNode;

const EMBEDDED_OPERATIONS: &[&str] = &["set", "push", "updateMany", "deleteMany"];

/// Operations applied, in this order, to an embedded list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EmbeddedOp {
    /// Atomic replacement of the whole list
    Set(Vec<CreateData>),
    /// Append; duplicates allowed
    Push(Vec<CreateData>),
    UpdateMany { filter: FilterNode, patch: UpdateData },
    DeleteMany { filter: FilterNode },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddedMutation {
    pub element: EntityId,
    pub ops: Vec<EmbeddedOp>,
}

impl EmbeddedMutation {
    /// Run the operations against an in-memory copy of the list
    pub fn apply(&self, items: &mut Vec<Value>) {
        for op in &self.ops {
            match op {
                EmbeddedOp::Set(elements) => {
                    *items = elements.iter().map(CreateData::to_document).collect();
                }
                EmbeddedOp::Push(elements) => {
                    items.extend(elements.iter().map(CreateData::to_document));
                }
                EmbeddedOp::UpdateMany { filter, patch } => {
                    for item in items.iter_mut().filter(|item| filter.matches(item)) {
                        if let Value::Object(fields) = item {
                            patch.apply_to(fields);
                        }
                    }
                }
                EmbeddedOp::DeleteMany { filter } => items.retain(|item| !filter.matches(item)),
            }
        }
    }
}

impl<'r> MutationBuilder<'r> {
    /// Elements given at create time: an array or `{set: [...]}`
    pub(crate) fn build_embedded_create(
        &self,
        rel: &RelationDefinition,
        value: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<Vec<CreateData>> {
        match value {
            Value::Array(_) => self.build_elements(rel, value, path, depth),
            Value::Object(object) => {
                if let Some(verb) = object.keys().find(|k| k.as_str() != "set") {
                    return Err(self.unsupported(rel, verb, &["set"], path));
                }
                expect_keys(value, path, &["set"], &["set"])?;
                self.build_elements(rel, &value["set"], &path.key("set"), depth)
            }
            _ => Err(ValidationError::schema_violation(
                path.clone(),
                format!("expected a list of {} values", rel.target),
            )),
        }
    }

    pub(crate) fn build_embedded_update(
        &self,
        rel: &RelationDefinition,
        value: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<EmbeddedMutation> {
        let element = rel.target_id();
        let mut mutation = EmbeddedMutation {
            element,
            ops: Vec::new(),
        };
        if value.is_array() {
            let elements = self.build_elements(rel, value, path, depth)?;
            mutation.ops.push(EmbeddedOp::Set(elements));
            return Ok(mutation);
        }

        let object = expect_object(value, path)?;
        if object.is_empty() {
            return Err(ValidationError::schema_violation(
                path.clone(),
                format!("expected one of {}", EMBEDDED_OPERATIONS.join(", ")),
            ));
        }
        if let Some(verb) = object
            .keys()
            .find(|k| !EMBEDDED_OPERATIONS.contains(&k.as_str()))
        {
            return Err(self.unsupported(rel, verb, EMBEDDED_OPERATIONS, path));
        }

        // Fixed application order regardless of key order in the payload
        for verb in EMBEDDED_OPERATIONS {
            let Some(operand) = object.get(*verb) else {
                continue;
            };
            let verb_path = path.key(verb);
            match *verb {
                "set" => {
                    let elements = self.build_elements(rel, operand, &verb_path, depth)?;
                    mutation.ops.push(EmbeddedOp::Set(elements));
                }
                "push" => {
                    let elements = self.build_elements(rel, operand, &verb_path, depth)?;
                    mutation.ops.push(EmbeddedOp::Push(elements));
                }
                "updateMany" => {
                    let args = expect_keys(operand, &verb_path, &["where", "data"], &["where", "data"])?;
                    mutation.ops.push(EmbeddedOp::UpdateMany {
                        filter: self
                            .filters
                            .parse_where(element, &args["where"], &verb_path.key("where"), depth)?,
                        patch: self.build_update(element, &args["data"], &verb_path.key("data"), depth, None)?,
                    });
                }
                _ => {
                    let args = expect_keys(operand, &verb_path, &["where"], &["where"])?;
                    mutation.ops.push(EmbeddedOp::DeleteMany {
                        filter: self
                            .filters
                            .parse_where(element, &args["where"], &verb_path.key("where"), depth)?,
                    });
                }
            }
        }
        Ok(mutation)
    }

    /// One element or an array of them, each validated as a full composite value
    fn build_elements(
        &self,
        rel: &RelationDefinition,
        value: &Value,
        path: &FieldPath,
        depth: usize,
    ) -> ValidationResult<Vec<CreateData>> {
        one_or_many(value, path)
            .into_iter()
            .map(|(item, p)| self.build_create(rel.target_id(), item, &p, depth, CreateScope::flat(None)))
            .collect()
    }

    fn unsupported(
        &self,
        rel: &RelationDefinition,
        verb: &str,
        allowed: &[&str],
        path: &FieldPath,
    ) -> ValidationError {
        ValidationError::unknown_field(
            path.key(verb),
            format!(
                "'{}' is not supported on embedded {} values, expected one of {}",
                verb,
                rel.target,
                allowed.join(", ")
            ),
        )
    }
}
