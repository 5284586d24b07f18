// Nested Mutation Builder - create/update payloads and relation mutation verbs
//
// Relation payloads recurse into the same builder for the target entity. Every
// nested create, update and filter counts toward the request's depth limit.

use serde_json::Value;
use tracing::trace;

use crate::core::input::{expect_array, expect_bool, expect_keys, expect_object, one_or_many};
use crate::core::{EntityId, FieldPath, ScalarValue};
use crate::ent_schema::{EntitySchema, FieldType, MirrorLink, RelationDefinition, ScalarKind};
use crate::error::{ValidationError, ValidationResult};
use crate::mutation::update_ops::{coerce_elements, parse_list_update, parse_scalar_update};
use crate::mutation::{CreateData, MutationBuilder, RelationMutation, RelationOp, UpdateData};
use crate::query::{coerce_scalar, enter_level, UniqueWhere};

const CREATE_VERBS: &[&str] = &["create", "createMany", "connect", "connectOrCreate"];
const UPDATE_VERBS: &[&str] = &[
    "create",
    "createMany",
    "connect",
    "connectOrCreate",
    "upsert",
    "update",
    "updateMany",
    "delete",
    "deleteMany",
    "set",
    "disconnect",
];
const TO_MANY_ONLY_VERBS: &[&str] = &["createMany", "set", "updateMany", "deleteMany"];

/// Whether relation payloads sit inside a create or an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Context {
    Create,
    Update,
}

/// Where a create payload sits in the request
#[derive(Debug, Clone, Copy)]
pub(crate) struct CreateScope<'a> {
    /// Relation on the created entity that points back at the parent
    back_link: Option<&'a str>,
    allow_relations: bool,
}

impl<'a> CreateScope<'a> {
    pub(crate) fn root() -> Self {
        Self {
            back_link: None,
            allow_relations: true,
        }
    }

    pub(crate) fn nested(back_link: Option<&'a str>) -> Self {
        Self {
            back_link,
            allow_relations: true,
        }
    }

    /// `createMany` records: scalars and embedded values only
    pub(crate) fn flat(back_link: Option<&'a str>) -> Self {
        Self {
            back_link,
            allow_relations: false,
        }
    }
}

fn unknown_field(schema: &EntitySchema, name: &str, path: FieldPath) -> ValidationError {
    ValidationError::unknown_field(
        path,
        format!(
            "unknown field '{}' on {}, expected one of {}",
            name,
            schema.name(),
            schema.field_names()
        ),
    )
}

/// Back-link relation of a nested payload and the foreign key it owns
fn back_link_fields<'s>(schema: &'s EntitySchema, back_link: Option<&'s str>) -> (Option<&'s str>, Option<&'s str>) {
    let fk = back_link
        .and_then(|name| schema.field(name))
        .and_then(|field| field.relation())
        .and_then(|rel| rel.foreign_key.as_deref());
    (back_link, fk)
}

fn mirror_for(schema: &EntitySchema, list: &str) -> Option<MirrorLink> {
    schema
        .fields()
        .iter()
        .filter_map(|field| field.relation())
        .filter_map(|rel| rel.mirror.as_ref())
        .find(|mirror| mirror.local_ids == list)
        .cloned()
}

/// Scalar list in a create: an array or `{set: [...]}`
fn parse_list_create(
    kind: &ScalarKind,
    value: &Value,
    path: &FieldPath,
) -> ValidationResult<Vec<ScalarValue>> {
    let (items, items_path) = match value {
        Value::Object(_) => {
            let args = expect_keys(value, path, &["set"], &["set"])?;
            (&args["set"], path.key("set"))
        }
        _ => (value, path.clone()),
    };
    expect_array(items, &items_path)?;
    coerce_elements(kind, items, &items_path)
}

impl<'r> MutationBuilder<'r> {
    pub(crate) fn build_create(
        &self,
        entity: EntityId,
        value: &Value,
        path: &FieldPath,
        depth: usize,
        scope: CreateScope<'_>,
    ) -> ValidationResult<CreateData> {
        let depth = enter_level(depth, self.max_depth, path)?;
        let schema = self.registry.resolve(entity, path)?;
        let object = expect_object(value, path)?;
        let (back_link, back_fk) = back_link_fields(schema, scope.back_link);

        let mut data = CreateData::empty(entity);
        for (name, raw) in object {
            let field_path = path.key(name);
            if Some(name.as_str()) == back_link || Some(name.as_str()) == back_fk {
                return Err(ValidationError::unknown_field(
                    field_path,
                    format!("'{}' is set by the parent relation", name),
                ));
            }
            let field = schema
                .field(name)
                .ok_or_else(|| unknown_field(schema, name, field_path.clone()))?;

            match &field.field_type {
                FieldType::Scalar(kind) => {
                    let value = coerce_scalar(kind, field.optional, raw, &field_path)?;
                    data.scalars.insert(name.clone(), value);
                }
                FieldType::ScalarList(kind) => {
                    data.lists
                        .insert(name.clone(), parse_list_create(kind, raw, &field_path)?);
                }
                FieldType::Relation(rel) if rel.embedded => {
                    let elements = self.build_embedded_create(rel, raw, &field_path, depth)?;
                    data.embedded.insert(name.clone(), elements);
                }
                FieldType::Relation(rel) => {
                    if !scope.allow_relations {
                        return Err(ValidationError::unknown_field(
                            field_path,
                            format!("relation '{}' is not accepted in createMany records", name),
                        ));
                    }
                    let mutation = self.build_relation(rel, raw, &field_path, depth, Context::Create)?;
                    data.relations.insert(name.clone(), mutation);
                }
            }
        }

        self.complete_create(schema, &mut data, path, back_link, back_fk)?;
        trace!(entity = schema.name(), path = %path, "Validated create payload");
        Ok(data)
    }

    /// Enforce required fields and relations, recording which fields fall back to defaults
    fn complete_create(
        &self,
        schema: &EntitySchema,
        data: &mut CreateData,
        path: &FieldPath,
        back_link: Option<&str>,
        back_fk: Option<&str>,
    ) -> ValidationResult<()> {
        for field in schema.fields() {
            let name = field.name.as_str();
            match &field.field_type {
                FieldType::Scalar(_) => {
                    if data.scalars.contains_key(name) {
                        continue;
                    }
                    if field.default.is_some() {
                        data.defaulted.push(field.name.clone());
                        continue;
                    }
                    if field.optional || Some(name) == back_fk || relation_supplies(schema, data, name) {
                        continue;
                    }
                    return Err(ValidationError::schema_violation(
                        path.key(name),
                        format!("missing required field '{}' on {}", name, schema.name()),
                    ));
                }
                FieldType::ScalarList(_) => {
                    data.lists.entry(field.name.clone()).or_default();
                }
                FieldType::Relation(rel) if rel.embedded => {
                    data.embedded.entry(field.name.clone()).or_default();
                }
                FieldType::Relation(rel) => {
                    let fk_given = rel
                        .foreign_key
                        .as_deref()
                        .and_then(|fk| data.scalars.get(fk))
                        .is_some_and(|v| !v.is_null());
                    let relation_given = data.relations.contains_key(name);
                    if fk_given && relation_given {
                        return Err(ValidationError::schema_violation(
                            path.key(name),
                            format!(
                                "set either '{}' or '{}', not both",
                                name,
                                rel.foreign_key.as_deref().unwrap_or_default()
                            ),
                        ));
                    }
                    if rel.required && !fk_given && !relation_given && Some(name) != back_link {
                        return Err(ValidationError::schema_violation(
                            path.key(name),
                            format!("missing required relation '{}' on {}", name, schema.name()),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn build_update(
        &self,
        entity: EntityId,
        value: &Value,
        path: &FieldPath,
        depth: usize,
        back_link: Option<&str>,
    ) -> ValidationResult<UpdateData> {
        let depth = enter_level(depth, self.max_depth, path)?;
        let schema = self.registry.resolve(entity, path)?;
        let object = expect_object(value, path)?;
        let (back_link, back_fk) = back_link_fields(schema, back_link);

        let mut data = UpdateData::empty(entity);
        for (name, raw) in object {
            let field_path = path.key(name);
            if Some(name.as_str()) == back_link || Some(name.as_str()) == back_fk {
                return Err(ValidationError::unknown_field(
                    field_path,
                    format!("'{}' is set by the parent relation", name),
                ));
            }
            let field = schema
                .field(name)
                .ok_or_else(|| unknown_field(schema, name, field_path.clone()))?;

            match &field.field_type {
                FieldType::Scalar(kind) => {
                    if field.immutable {
                        return Err(ValidationError::schema_violation(
                            field_path,
                            format!("'{}' cannot be changed after creation", name),
                        ));
                    }
                    let update = parse_scalar_update(kind, field.optional, raw, &field_path)?;
                    data.scalars.insert(name.clone(), update);
                }
                FieldType::ScalarList(kind) => {
                    let update = parse_list_update(kind, raw, &field_path, mirror_for(schema, name))?;
                    data.lists.insert(name.clone(), update);
                }
                FieldType::Relation(rel) if rel.embedded => {
                    let mutation = self.build_embedded_update(rel, raw, &field_path, depth)?;
                    data.embedded.insert(name.clone(), mutation);
                }
                FieldType::Relation(rel) => {
                    if let Some(fk) = rel.foreign_key.as_deref().filter(|fk| object.contains_key(*fk)) {
                        return Err(ValidationError::schema_violation(
                            field_path,
                            format!("set either '{}' or '{}', not both", name, fk),
                        ));
                    }
                    let mutation = self.build_relation(rel, raw, &field_path, depth, Context::Update)?;
                    data.relations.insert(name.clone(), mutation);
                }
            }
        }
        trace!(entity = schema.name(), path = %path, "Validated update payload");
        Ok(data)
    }

    fn build_relation(
        &self,
        rel: &RelationDefinition,
        value: &Value,
        path: &FieldPath,
        depth: usize,
        context: Context,
    ) -> ValidationResult<RelationMutation> {
        let object = expect_object(value, path)?;
        if object.is_empty() {
            return Err(ValidationError::schema_violation(
                path.clone(),
                "expected at least one relation operation",
            ));
        }
        if !rel.is_to_many() && object.len() > 1 {
            let verbs: Vec<&str> = object.keys().map(String::as_str).collect();
            return Err(ValidationError::cardinality(
                path.clone(),
                format!(
                    "to-one relation to {} takes a single operation, got {}",
                    rel.target,
                    verbs.join(", ")
                ),
            ));
        }

        let mut mutation = RelationMutation {
            target: rel.target_id(),
            cardinality: rel.cardinality,
            mirror: rel.mirror.clone(),
            ops: Vec::new(),
        };
        for (verb, operand) in object {
            let verb_path = path.key(verb);
            check_verb(rel, verb, operand, context, &verb_path)?;
            self.push_ops(rel, verb, operand, &verb_path, depth, &mut mutation.ops)?;
        }
        Ok(mutation)
    }

    fn push_ops(
        &self,
        rel: &RelationDefinition,
        verb: &str,
        operand: &Value,
        path: &FieldPath,
        depth: usize,
        ops: &mut Vec<RelationOp>,
    ) -> ValidationResult<()> {
        let target = rel.target_id();
        let back_link = rel.inverse.as_deref();
        let to_many = rel.is_to_many();
        let unique = |value: &Value, p: &FieldPath| UniqueWhere::parse(self.registry, target, value, p);

        match verb {
            "create" => {
                for (item, p) in one_or_many(operand, path) {
                    let data = self.build_create(target, item, &p, depth, CreateScope::nested(back_link))?;
                    ops.push(RelationOp::Create(Box::new(data)));
                }
            }
            "createMany" => {
                let args = expect_keys(operand, path, &["data", "skipDuplicates"], &["data"])?;
                let skip_duplicates = match args.get("skipDuplicates") {
                    Some(flag) => expect_bool(flag, &path.key("skipDuplicates"))?,
                    None => false,
                };
                let data = one_or_many(&args["data"], &path.key("data"))
                    .into_iter()
                    .map(|(item, p)| self.build_create(target, item, &p, depth, CreateScope::flat(back_link)))
                    .collect::<ValidationResult<Vec<_>>>()?;
                ops.push(RelationOp::CreateMany { data, skip_duplicates });
            }
            "connect" => {
                for (item, p) in one_or_many(operand, path) {
                    ops.push(RelationOp::Connect(unique(item, &p)?));
                }
            }
            "connectOrCreate" => {
                for (item, p) in one_or_many(operand, path) {
                    let args = expect_keys(item, &p, &["where", "create"], &["where", "create"])?;
                    ops.push(RelationOp::ConnectOrCreate {
                        unique: unique(&args["where"], &p.key("where"))?,
                        create: Box::new(self.build_create(
                            target,
                            &args["create"],
                            &p.key("create"),
                            depth,
                            CreateScope::nested(back_link),
                        )?),
                    });
                }
            }
            "upsert" => {
                for (item, p) in one_or_many(operand, path) {
                    let args = if to_many {
                        expect_keys(item, &p, &["where", "create", "update"], &["where", "create", "update"])?
                    } else {
                        expect_keys(item, &p, &["create", "update"], &["create", "update"])?
                    };
                    let selector = match args.get("where") {
                        Some(w) => Some(unique(w, &p.key("where"))?),
                        None => None,
                    };
                    ops.push(RelationOp::Upsert {
                        unique: selector,
                        create: Box::new(self.build_create(
                            target,
                            &args["create"],
                            &p.key("create"),
                            depth,
                            CreateScope::nested(back_link),
                        )?),
                        update: Box::new(self.build_update(
                            target,
                            &args["update"],
                            &p.key("update"),
                            depth,
                            back_link,
                        )?),
                    });
                }
            }
            "update" if !to_many => {
                let data = self.build_update(target, operand, path, depth, back_link)?;
                ops.push(RelationOp::Update { unique: None, data: Box::new(data) });
            }
            "update" => {
                for (item, p) in one_or_many(operand, path) {
                    let args = expect_keys(item, &p, &["where", "data"], &["where", "data"])?;
                    ops.push(RelationOp::Update {
                        unique: Some(unique(&args["where"], &p.key("where"))?),
                        data: Box::new(self.build_update(target, &args["data"], &p.key("data"), depth, back_link)?),
                    });
                }
            }
            "updateMany" => {
                for (item, p) in one_or_many(operand, path) {
                    let args = expect_keys(item, &p, &["where", "data"], &["where", "data"])?;
                    ops.push(RelationOp::UpdateMany {
                        filter: self.filters.parse_where(target, &args["where"], &p.key("where"), depth)?,
                        data: Box::new(self.build_update(target, &args["data"], &p.key("data"), depth, back_link)?),
                    });
                }
            }
            "delete" | "disconnect" if !to_many => {
                if !expect_bool(operand, path)? {
                    return Ok(());
                }
                if rel.required {
                    return Err(ValidationError::schema_violation(
                        path.clone(),
                        format!("required relation to {} cannot be removed with '{}'", rel.target, verb),
                    ));
                }
                ops.push(if verb == "delete" {
                    RelationOp::Delete(None)
                } else {
                    RelationOp::Disconnect(None)
                });
            }
            "delete" => {
                for (item, p) in one_or_many(operand, path) {
                    ops.push(RelationOp::Delete(Some(unique(item, &p)?)));
                }
            }
            "disconnect" => {
                for (item, p) in one_or_many(operand, path) {
                    ops.push(RelationOp::Disconnect(Some(unique(item, &p)?)));
                }
            }
            "deleteMany" => {
                for (item, p) in one_or_many(operand, path) {
                    ops.push(RelationOp::DeleteMany(self.filters.parse_where(target, item, &p, depth)?));
                }
            }
            "set" => {
                let selectors = one_or_many(operand, path)
                    .into_iter()
                    .map(|(item, p)| unique(item, &p))
                    .collect::<ValidationResult<Vec<_>>>()?;
                ops.push(RelationOp::Set(selectors));
            }
            other => {
                return Err(ValidationError::unknown_field(
                    path.clone(),
                    format!("unknown relation operation '{}'", other),
                ))
            }
        }
        Ok(())
    }
}

/// Reject verbs that are unknown, out of context, or inconsistent with the relation's cardinality
fn check_verb(
    rel: &RelationDefinition,
    verb: &str,
    operand: &Value,
    context: Context,
    path: &FieldPath,
) -> ValidationResult<()> {
    if !UPDATE_VERBS.contains(&verb) {
        return Err(ValidationError::unknown_field(
            path.clone(),
            format!("unknown relation operation '{}'", verb),
        ));
    }
    if context == Context::Create && !CREATE_VERBS.contains(&verb) {
        return Err(ValidationError::unknown_field(
            path.clone(),
            format!("'{}' is only available when updating", verb),
        ));
    }
    if rel.is_to_many() {
        return Ok(());
    }
    if TO_MANY_ONLY_VERBS.contains(&verb) {
        return Err(ValidationError::cardinality(
            path.clone(),
            format!("'{}' requires a to-many relation, but the relation to {} is to-one", verb, rel.target),
        ));
    }
    if operand.is_array() {
        return Err(ValidationError::cardinality(
            path.clone(),
            format!("to-one relation to {} takes a single object for '{}', got an array", rel.target, verb),
        ));
    }
    Ok(())
}

/// Whether `name` is the foreign key of a relation supplied in the same payload
fn relation_supplies(schema: &EntitySchema, data: &CreateData, name: &str) -> bool {
    schema.fields().iter().any(|field| {
        field
            .relation()
            .is_some_and(|rel| rel.foreign_key.as_deref() == Some(name) && data.relations.contains_key(&field.name))
    })
}
