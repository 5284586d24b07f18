// Ent Schema Framework - Declarative entity schemas and the interned schema registry
// Entities are described as data; one generic engine validates requests against them

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::{EntityId, FieldPath};
use crate::error::{AppError, AppResult, ValidationError, ValidationResult};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("identifier pattern is valid")
});

const UNRESOLVED: EntityId = EntityId(usize::MAX);

/// Schema definition trait - one implementation per entity
pub trait EntSchema {
    /// Entity name as it appears in requests
    fn name() -> &'static str
    where
        Self: Sized;

    fn kind() -> EntityKind
    where
        Self: Sized,
    {
        EntityKind::Model
    }

    /// Define fields and relations for this entity, in declaration order
    fn fields() -> Vec<FieldDefinition>
    where
        Self: Sized;
}

/// Whether an entity has its own storage identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    /// Stored record, may be the root of a request
    Model,
    /// Value type embedded in a parent record, no identity of its own
    Composite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDefinition {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumDefinition {
    pub fn new(name: &str, variants: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn contains(&self, variant: &str) -> bool {
        self.variants.iter().any(|v| v == variant)
    }
}

/// Scalar types supported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Bool,
    Date,
    Enum(EnumDefinition),
}

impl ScalarKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Float)
    }

    pub fn type_name(&self) -> &str {
        match self {
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::Bool => "Boolean",
            ScalarKind::Date => "DateTime",
            ScalarKind::Enum(def) => &def.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// Pair of ID-list fields that back a many-to-many relation on both sides.
///
/// The two lists must stay mutually consistent, so the executor receives this
/// link with every mutation touching either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorLink {
    pub local_ids: String,
    pub remote_ids: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationDefinition {
    pub target: String,
    #[serde(skip)]
    target_id: EntityId,
    pub cardinality: Cardinality,
    /// Value-typed list owned by the parent (no connect/disconnect)
    pub embedded: bool,
    /// To-one relation that must always be present
    pub required: bool,
    pub inverse: Option<String>,
    pub foreign_key: Option<String>,
    pub mirror: Option<MirrorLink>,
}

impl RelationDefinition {
    fn new(target: &str, cardinality: Cardinality, embedded: bool) -> Self {
        Self {
            target: target.to_string(),
            target_id: UNRESOLVED,
            cardinality,
            embedded,
            required: false,
            inverse: None,
            foreign_key: None,
            mirror: None,
        }
    }

    /// Arena index of the target schema, resolved when the registry is built
    pub fn target_id(&self) -> EntityId {
        self.target_id
    }

    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::ToMany
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldType {
    Scalar(ScalarKind),
    ScalarList(ScalarKind),
    Relation(RelationDefinition),
}

/// Field default values, applied by the storage layer when a create omits the field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldDefault {
    /// Storage-generated identifier
    Auto,
    /// Current timestamp
    Now,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Enum(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub optional: bool,
    pub unique: bool,
    pub immutable: bool,
    pub default: Option<FieldDefault>,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            optional: false,
            unique: false,
            immutable: false,
            default: None,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, FieldType::Scalar(ScalarKind::String))
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, FieldType::Scalar(ScalarKind::Int))
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldType::Scalar(ScalarKind::Float))
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldType::Scalar(ScalarKind::Bool))
    }

    pub fn date(name: &str) -> Self {
        Self::new(name, FieldType::Scalar(ScalarKind::Date))
    }

    pub fn enumeration(name: &str, definition: EnumDefinition) -> Self {
        Self::new(name, FieldType::Scalar(ScalarKind::Enum(definition)))
    }

    pub fn list(name: &str, element: ScalarKind) -> Self {
        Self::new(name, FieldType::ScalarList(element))
    }

    /// Reference to a single record of `target`
    pub fn to_one(name: &str, target: &str) -> Self {
        Self::new(
            name,
            FieldType::Relation(RelationDefinition::new(target, Cardinality::ToOne, false)),
        )
    }

    /// Reference to many records of `target`
    pub fn to_many(name: &str, target: &str) -> Self {
        Self::new(
            name,
            FieldType::Relation(RelationDefinition::new(target, Cardinality::ToMany, false)),
        )
    }

    /// Embedded list of composite values
    pub fn embedded(name: &str, target: &str) -> Self {
        Self::new(
            name,
            FieldType::Relation(RelationDefinition::new(target, Cardinality::ToMany, true)),
        )
    }

    /// Mark field as optional (nullable, may be absent)
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark field as immutable (can't be updated after creation)
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn default_value(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark a to-one relation as always present
    pub fn required(mut self) -> Self {
        if let FieldType::Relation(rel) = &mut self.field_type {
            rel.required = true;
        }
        self
    }

    /// Name of the back-reference on the target entity
    pub fn inverse(mut self, name: &str) -> Self {
        if let FieldType::Relation(rel) = &mut self.field_type {
            rel.inverse = Some(name.to_string());
        }
        self
    }

    /// Scalar field holding the related record's id
    pub fn foreign_key(mut self, field: &str) -> Self {
        if let FieldType::Relation(rel) = &mut self.field_type {
            rel.foreign_key = Some(field.to_string());
        }
        self
    }

    /// Back this many-to-many relation with mirrored ID lists
    pub fn mirrored(mut self, local_ids: &str, remote_ids: &str) -> Self {
        if let FieldType::Relation(rel) = &mut self.field_type {
            rel.mirror = Some(MirrorLink {
                local_ids: local_ids.to_string(),
                remote_ids: remote_ids.to_string(),
            });
        }
        self
    }

    pub fn relation(&self) -> Option<&RelationDefinition> {
        match &self.field_type {
            FieldType::Relation(rel) => Some(rel),
            _ => None,
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self.field_type, FieldType::Relation(_))
    }
}

/// Interned schema of one entity
#[derive(Debug, Clone, Serialize)]
pub struct EntitySchema {
    id: EntityId,
    name: String,
    kind: EntityKind,
    fields: Vec<FieldDefinition>,
    #[serde(skip)]
    field_index: HashMap<String, usize>,
}

impl EntitySchema {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_model(&self) -> bool {
        self.kind == EntityKind::Model
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.field_index.get(name).map(|&i| &self.fields[i])
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.unique)
    }

    /// Comma-separated field names, used in UnknownField messages
    pub fn field_names(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Immutable catalog of every entity schema, addressed by `EntityId`
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<EntitySchema>,
    by_name: HashMap<String, EntityId>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Find an entity schema by name
    pub fn lookup(&self, name: &str) -> ValidationResult<&EntitySchema> {
        self.by_name
            .get(name)
            .and_then(|&id| self.get(id))
            .ok_or_else(|| ValidationError::unknown_entity(FieldPath::root(), name))
    }

    pub fn get(&self, id: EntityId) -> Option<&EntitySchema> {
        self.schemas.get(id.index())
    }

    /// Resolve an arena index; ids from another registry are `UnknownEntity`
    pub fn resolve(&self, id: EntityId, path: &FieldPath) -> ValidationResult<&EntitySchema> {
        self.get(id)
            .ok_or_else(|| ValidationError::unknown_entity(path.clone(), &id.to_string()))
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|s| s.name())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

struct Declaration {
    name: &'static str,
    kind: EntityKind,
    fields: Vec<FieldDefinition>,
}

/// Collects schema declarations, then interns and validates them in one pass
#[derive(Default)]
pub struct SchemaRegistryBuilder {
    declarations: Vec<Declaration>,
}

impl SchemaRegistryBuilder {
    pub fn register<S: EntSchema>(mut self) -> Self {
        debug!(entity = S::name(), "registering schema");
        self.declarations.push(Declaration {
            name: S::name(),
            kind: S::kind(),
            fields: S::fields(),
        });
        self
    }

    pub fn build(self) -> AppResult<SchemaRegistry> {
        let mut errors = Vec::new();
        let mut by_name = HashMap::new();

        for (index, decl) in self.declarations.iter().enumerate() {
            if !IDENTIFIER.is_match(decl.name) {
                errors.push(format!("invalid entity name '{}'", decl.name));
            }
            if by_name.insert(decl.name.to_string(), EntityId(index)).is_some() {
                errors.push(format!("entity '{}' is declared twice", decl.name));
            }
        }

        let mut schemas = Vec::with_capacity(self.declarations.len());
        for (index, decl) in self.declarations.into_iter().enumerate() {
            let mut field_index = HashMap::new();
            let mut fields = decl.fields;
            for (i, field) in fields.iter_mut().enumerate() {
                if !IDENTIFIER.is_match(&field.name) {
                    errors.push(format!("{}: invalid field name '{}'", decl.name, field.name));
                }
                if field_index.insert(field.name.clone(), i).is_some() {
                    errors.push(format!("{}: field '{}' is declared twice", decl.name, field.name));
                }
                if let FieldType::Relation(rel) = &mut field.field_type {
                    match by_name.get(&rel.target) {
                        Some(&target) => rel.target_id = target,
                        None => errors.push(format!(
                            "{}.{} points to undefined entity '{}'",
                            decl.name, field.name, rel.target
                        )),
                    }
                }
            }
            schemas.push(EntitySchema {
                id: EntityId(index),
                name: decl.name.to_string(),
                kind: decl.kind,
                fields,
                field_index,
            });
        }

        let registry = SchemaRegistry { schemas, by_name };
        registry.validate(&mut errors);

        if errors.is_empty() {
            info!(entities = registry.len(), "schema registry built");
            Ok(registry)
        } else {
            Err(AppError::ConfigurationError(errors.join("; ")))
        }
    }
}

impl SchemaRegistry {
    /// Validate schema consistency across entities
    fn validate(&self, errors: &mut Vec<String>) {
        for schema in &self.schemas {
            if schema.is_model() && schema.unique_fields().next().is_none() {
                errors.push(format!("{} has no unique field", schema.name));
            }
            for field in &schema.fields {
                self.validate_default(schema, field, errors);
                if let FieldType::Relation(rel) = &field.field_type {
                    if rel.target_id != UNRESOLVED {
                        self.validate_relation(schema, field, rel, errors);
                    }
                }
            }
        }
    }

    fn validate_default(&self, schema: &EntitySchema, field: &FieldDefinition, errors: &mut Vec<String>) {
        let (Some(default), FieldType::Scalar(kind)) = (&field.default, &field.field_type) else {
            return;
        };
        let fits = match (default, kind) {
            (FieldDefault::Auto, ScalarKind::String) => true,
            (FieldDefault::Now, ScalarKind::Date) => true,
            (FieldDefault::String(_), ScalarKind::String) => true,
            (FieldDefault::Int(_), ScalarKind::Int) => true,
            (FieldDefault::Float(_), ScalarKind::Float) => true,
            (FieldDefault::Bool(_), ScalarKind::Bool) => true,
            (FieldDefault::Enum(v), ScalarKind::Enum(def)) => def.contains(v),
            _ => false,
        };
        if !fits {
            errors.push(format!(
                "{}.{} has a default that does not fit {}",
                schema.name,
                field.name,
                kind.type_name()
            ));
        }
    }

    fn validate_relation(
        &self,
        schema: &EntitySchema,
        field: &FieldDefinition,
        rel: &RelationDefinition,
        errors: &mut Vec<String>,
    ) {
        let here = format!("{}.{}", schema.name, field.name);
        let Some(target) = self.get(rel.target_id) else {
            return;
        };

        if schema.kind == EntityKind::Composite {
            errors.push(format!("{}: composite types cannot declare relations", here));
            return;
        }
        if rel.embedded {
            if target.kind != EntityKind::Composite {
                errors.push(format!("{}: embedded relation must target a composite type", here));
            }
            return;
        }
        if target.kind != EntityKind::Model {
            errors.push(format!("{}: relation must target a model, '{}' is composite", here, target.name));
            return;
        }

        if rel.required && rel.is_to_many() {
            errors.push(format!("{}: only to-one relations can be required", here));
        }

        if let Some(fk) = &rel.foreign_key {
            if rel.is_to_many() {
                errors.push(format!("{}: foreign keys only apply to to-one relations", here));
            }
            match schema.field(fk).map(|f| &f.field_type) {
                Some(FieldType::Scalar(ScalarKind::String)) => {}
                _ => errors.push(format!("{}: foreign key '{}' is not a String field", here, fk)),
            }
        }

        let inverse = match &rel.inverse {
            Some(name) => match target.field(name).and_then(|f| f.relation()) {
                Some(inverse) if inverse.target_id == schema.id => Some(inverse),
                _ => {
                    errors.push(format!(
                        "{}: inverse '{}' on {} does not point back",
                        here, name, target.name
                    ));
                    None
                }
            },
            None => None,
        };
        if let Some(inverse) = inverse {
            if inverse.inverse.as_deref().is_some_and(|n| n != field.name) {
                errors.push(format!("{}: inverse relation names a different back-reference", here));
            }
        }

        if let Some(mirror) = &rel.mirror {
            if !rel.is_to_many() {
                errors.push(format!("{}: mirrored ID lists require a to-many relation", here));
            }
            let is_id_list = |s: &EntitySchema, name: &str| {
                matches!(
                    s.field(name).map(|f| &f.field_type),
                    Some(FieldType::ScalarList(ScalarKind::String))
                )
            };
            if !is_id_list(schema, &mirror.local_ids) {
                errors.push(format!("{}: '{}' is not a String[] field", here, mirror.local_ids));
            }
            if !is_id_list(target, &mirror.remote_ids) {
                errors.push(format!(
                    "{}: '{}' is not a String[] field on {}",
                    here, mirror.remote_ids, target.name
                ));
            }
            let mirrored_back = inverse
                .and_then(|inv| inv.mirror.as_ref())
                .is_some_and(|m| m.local_ids == mirror.remote_ids && m.remote_ids == mirror.local_ids);
            if !mirrored_back {
                errors.push(format!(
                    "{}: inverse relation must mirror the same ID lists",
                    here
                ));
            }
        }
    }

    /// Names of every relation that participates in a mirrored ID list pair
    pub fn mirrored_relations(&self) -> HashSet<(String, String)> {
        self.schemas
            .iter()
            .flat_map(|s| {
                s.fields.iter().filter_map(move |f| {
                    f.relation()
                        .and_then(|r| r.mirror.as_ref())
                        .map(|_| (s.name.clone(), f.name.clone()))
                })
            })
            .collect()
    }
}
