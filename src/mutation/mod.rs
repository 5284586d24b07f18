// Mutation module - Typed write trees built from untrusted create/update payloads
//
// `MutationBuilder` validates payloads against the registry; nested relation
// filters (updateMany / deleteMany) are delegated to the shared `FilterParser`
// so that one depth count covers the whole request.

pub mod embedded;
pub mod nested;
pub mod update_ops;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::core::{EntityId, FieldPath, ScalarValue};
use crate::ent_schema::{Cardinality, MirrorLink, SchemaRegistry};
use crate::error::ValidationResult;
use crate::query::{FilterNode, FilterParser, UniqueWhere};

pub use embedded::{EmbeddedMutation, EmbeddedOp};
pub use update_ops::{ListUpdate, ScalarUpdate};

/// Validated payload of a create, at the root or nested under a relation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateData {
    pub entity: EntityId,
    pub scalars: BTreeMap<String, ScalarValue>,
    /// Scalar lists; omitted lists are materialized as empty
    pub lists: BTreeMap<String, Vec<ScalarValue>>,
    pub relations: BTreeMap<String, RelationMutation>,
    pub embedded: BTreeMap<String, Vec<CreateData>>,
    /// Omitted fields the storage layer fills from their declared default
    pub defaulted: Vec<String>,
}

impl CreateData {
    pub(crate) fn empty(entity: EntityId) -> Self {
        Self {
            entity,
            scalars: BTreeMap::new(),
            lists: BTreeMap::new(),
            relations: BTreeMap::new(),
            embedded: BTreeMap::new(),
            defaulted: Vec::new(),
        }
    }

    /// Value-level document for this record. Relations are left to the executor.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        for (name, value) in &self.scalars {
            doc.insert(name.clone(), value.to_json());
        }
        for (name, items) in &self.lists {
            doc.insert(
                name.clone(),
                Value::Array(items.iter().map(ScalarValue::to_json).collect()),
            );
        }
        for (name, elements) in &self.embedded {
            doc.insert(
                name.clone(),
                Value::Array(elements.iter().map(CreateData::to_document).collect()),
            );
        }
        Value::Object(doc)
    }
}

/// Validated payload of an update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateData {
    pub entity: EntityId,
    pub scalars: BTreeMap<String, ScalarUpdate>,
    pub lists: BTreeMap<String, ListUpdate>,
    pub relations: BTreeMap<String, RelationMutation>,
    pub embedded: BTreeMap<String, EmbeddedMutation>,
}

impl UpdateData {
    pub(crate) fn empty(entity: EntityId) -> Self {
        Self {
            entity,
            scalars: BTreeMap::new(),
            lists: BTreeMap::new(),
            relations: BTreeMap::new(),
            embedded: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
            && self.lists.is_empty()
            && self.relations.is_empty()
            && self.embedded.is_empty()
    }

    /// Apply the value-level part of the update (scalars, lists, embedded lists) in place
    pub fn apply_to(&self, doc: &mut Map<String, Value>) {
        for (name, update) in &self.scalars {
            match update.apply(doc.get(name)) {
                Some(value) => doc.insert(name.clone(), value),
                None => doc.remove(name),
            };
        }
        for (name, update) in &self.lists {
            let next = update.apply(doc.get(name));
            doc.insert(name.clone(), next);
        }
        for (name, mutation) in &self.embedded {
            let mut items = match doc.remove(name) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            mutation.apply(&mut items);
            doc.insert(name.clone(), Value::Array(items));
        }
    }
}

/// Nested operations on one relation field of a parent create or update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationMutation {
    pub target: EntityId,
    pub cardinality: Cardinality,
    /// ID lists the executor must keep consistent on both sides
    pub mirror: Option<MirrorLink>,
    pub ops: Vec<RelationOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationOp {
    Create(Box<CreateData>),
    CreateMany {
        data: Vec<CreateData>,
        skip_duplicates: bool,
    },
    Connect(UniqueWhere),
    ConnectOrCreate {
        unique: UniqueWhere,
        create: Box<CreateData>,
    },
    /// `unique` is `None` on a to-one relation, which addresses its single record
    Upsert {
        unique: Option<UniqueWhere>,
        create: Box<CreateData>,
        update: Box<UpdateData>,
    },
    Update {
        unique: Option<UniqueWhere>,
        data: Box<UpdateData>,
    },
    UpdateMany {
        filter: FilterNode,
        data: Box<UpdateData>,
    },
    Delete(Option<UniqueWhere>),
    DeleteMany(FilterNode),
    /// Replace the whole related set; empty clears it
    Set(Vec<UniqueWhere>),
    Disconnect(Option<UniqueWhere>),
}

/// Validator for create and update payloads
pub struct MutationBuilder<'r> {
    registry: &'r SchemaRegistry,
    filters: FilterParser<'r>,
    max_depth: usize,
}

impl<'r> MutationBuilder<'r> {
    pub fn new(registry: &'r SchemaRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            filters: FilterParser::new(registry, config),
            max_depth: config.max_depth,
        }
    }

    /// Validate the `data` of a create on `entity`
    pub fn create(&self, entity: EntityId, value: &Value, path: &FieldPath) -> ValidationResult<CreateData> {
        self.build_create(entity, value, path, 0, nested::CreateScope::root())
    }

    /// Validate the `data` of an update on `entity`
    pub fn update(&self, entity: EntityId, value: &Value, path: &FieldPath) -> ValidationResult<UpdateData> {
        self.build_update(entity, value, path, 0, None)
    }

    /// Validate one `createMany` record; relation fields are rejected
    pub fn create_flat(&self, entity: EntityId, value: &Value, path: &FieldPath) -> ValidationResult<CreateData> {
        self.build_create(entity, value, path, 0, nested::CreateScope::flat(None))
    }
}
