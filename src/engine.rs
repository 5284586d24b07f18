// Query Engine - Entry point validating whole operations against the registry
//
// Each call is a pure function of (registry, config, input): no state is kept
// between calls, so one engine can be shared freely across threads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::EngineConfig;
use crate::core::input::{expect_bool, expect_keys, expect_object, one_or_many};
use crate::core::FieldPath;
use crate::ent_schema::{EntitySchema, SchemaRegistry};
use crate::error::{ValidationError, ValidationResult};
use crate::mutation::{CreateData, MutationBuilder, UpdateData};
use crate::query::{EntityFilter, FilterParser, FindManyArgs, UniqueWhere};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    FindMany,
    FindUnique,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::FindMany => "findMany",
            OperationKind::FindUnique => "findUnique",
            OperationKind::Create => "create",
            OperationKind::CreateMany => "createMany",
            OperationKind::Update => "update",
            OperationKind::UpdateMany => "updateMany",
            OperationKind::Upsert => "upsert",
            OperationKind::Delete => "delete",
            OperationKind::DeleteMany => "deleteMany",
        }
    }
}

/// An operation with its untrusted arguments, e.g. `update {where, data}`
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub operation: OperationKind,
    #[serde(default)]
    pub args: Value,
}

impl Operation {
    pub fn new(operation: OperationKind, args: Value) -> Self {
        Self { operation, args }
    }
}

/// Wire envelope: `{"entity": "Product", "operation": "findMany", "args": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub entity: String,
    #[serde(flatten)]
    pub operation: Operation,
}

/// Typed tree handed to the storage executor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum ValidatedOperation {
    FindMany(FindManyArgs),
    FindUnique {
        unique: UniqueWhere,
    },
    Create {
        data: CreateData,
    },
    CreateMany {
        data: Vec<CreateData>,
        skip_duplicates: bool,
    },
    Update {
        unique: UniqueWhere,
        data: UpdateData,
    },
    /// No filter updates every record
    UpdateMany {
        filter: Option<EntityFilter>,
        data: UpdateData,
    },
    Upsert {
        unique: UniqueWhere,
        create: CreateData,
        update: UpdateData,
    },
    Delete {
        unique: UniqueWhere,
    },
    DeleteMany {
        filter: Option<EntityFilter>,
    },
}

pub struct QueryEngine<'r> {
    registry: &'r SchemaRegistry,
    filters: FilterParser<'r>,
    mutations: MutationBuilder<'r>,
}

impl<'r> QueryEngine<'r> {
    pub fn new(registry: &'r SchemaRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            filters: FilterParser::new(registry, config),
            mutations: MutationBuilder::new(registry, config),
        }
    }

    pub fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    /// Requests are rooted at models; composite types only exist inside their parent
    fn root(&self, entity: &str) -> ValidationResult<&'r EntitySchema> {
        let schema = self.registry.lookup(entity)?;
        if !schema.is_model() {
            return Err(ValidationError::unknown_entity(FieldPath::root(), entity));
        }
        Ok(schema)
    }

    pub fn validate_filter(&self, entity: &str, filter: &Value) -> ValidationResult<EntityFilter> {
        let schema = self.root(entity)?;
        self.filters.parse(schema.id(), filter, &FieldPath::new("where"))
    }

    pub fn validate_create(&self, entity: &str, data: &Value) -> ValidationResult<CreateData> {
        let schema = self.root(entity)?;
        self.mutations.create(schema.id(), data, &FieldPath::new("data"))
    }

    pub fn validate_update(&self, entity: &str, data: &Value) -> ValidationResult<UpdateData> {
        let schema = self.root(entity)?;
        self.mutations.update(schema.id(), data, &FieldPath::new("data"))
    }

    pub fn validate_unique(&self, entity: &str, selector: &Value) -> ValidationResult<UniqueWhere> {
        let schema = self.root(entity)?;
        UniqueWhere::parse(self.registry, schema.id(), selector, &FieldPath::new("where"))
    }

    pub fn validate_request(&self, request: &Request) -> ValidationResult<ValidatedOperation> {
        self.validate_operation(&request.entity, &request.operation)
    }

    /// Validate a full operation; all-or-nothing, the first failure is returned
    pub fn validate_operation(
        &self,
        entity: &str,
        operation: &Operation,
    ) -> ValidationResult<ValidatedOperation> {
        let schema = self.root(entity)?;
        let id = schema.id();
        let kind = operation.operation;
        debug!(entity = schema.name(), operation = kind.as_str(), "Validating operation");

        let args = &operation.args;
        let root = FieldPath::root();
        let where_path = root.key("where");
        let data_path = root.key("data");
        let unique = |value: &Value| UniqueWhere::parse(self.registry, id, value, &where_path);
        let optional_filter = |value: Option<&Value>| match value {
            Some(filter) => self.filters.parse(id, filter, &where_path).map(Some),
            None => Ok(None),
        };

        let validated = match kind {
            OperationKind::FindMany => ValidatedOperation::FindMany(self.filters.parse_find_many(id, args, &root)?),
            OperationKind::FindUnique => {
                let args = expect_keys(args, &root, &["where"], &["where"])?;
                ValidatedOperation::FindUnique {
                    unique: unique(&args["where"])?,
                }
            }
            OperationKind::Create => {
                let args = expect_keys(args, &root, &["data"], &["data"])?;
                ValidatedOperation::Create {
                    data: self.mutations.create(id, &args["data"], &data_path)?,
                }
            }
            OperationKind::CreateMany => {
                let args = expect_keys(args, &root, &["data", "skipDuplicates"], &["data"])?;
                let skip_duplicates = match args.get("skipDuplicates") {
                    Some(flag) => expect_bool(flag, &root.key("skipDuplicates"))?,
                    None => false,
                };
                let data = one_or_many(&args["data"], &data_path)
                    .into_iter()
                    .map(|(record, path)| self.mutations.create_flat(id, record, &path))
                    .collect::<ValidationResult<Vec<_>>>()?;
                ValidatedOperation::CreateMany { data, skip_duplicates }
            }
            OperationKind::Update => {
                let args = expect_keys(args, &root, &["where", "data"], &["where", "data"])?;
                ValidatedOperation::Update {
                    unique: unique(&args["where"])?,
                    data: self.mutations.update(id, &args["data"], &data_path)?,
                }
            }
            OperationKind::UpdateMany => {
                let args = expect_keys(args, &root, &["where", "data"], &["data"])?;
                ValidatedOperation::UpdateMany {
                    filter: optional_filter(args.get("where"))?,
                    data: self.mutations.update(id, &args["data"], &data_path)?,
                }
            }
            OperationKind::Upsert => {
                let args = expect_keys(
                    args,
                    &root,
                    &["where", "create", "update"],
                    &["where", "create", "update"],
                )?;
                ValidatedOperation::Upsert {
                    unique: unique(&args["where"])?,
                    create: self.mutations.create(id, &args["create"], &root.key("create"))?,
                    update: self.mutations.update(id, &args["update"], &root.key("update"))?,
                }
            }
            OperationKind::Delete => {
                let args = expect_keys(args, &root, &["where"], &["where"])?;
                ValidatedOperation::Delete {
                    unique: unique(&args["where"])?,
                }
            }
            OperationKind::DeleteMany => {
                let filter = if args.is_null() {
                    None
                } else {
                    let args = expect_object(args, &root)?;
                    if let Some(key) = args.keys().find(|k| k.as_str() != "where") {
                        return Err(ValidationError::unknown_field(
                            root.key(key),
                            format!("unknown deleteMany argument '{}'", key),
                        ));
                    }
                    optional_filter(args.get("where"))?
                };
                ValidatedOperation::DeleteMany { filter }
            }
        };
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schemas::create_schema_registry;
    use serde_json::json;

    #[test]
    fn test_request_envelope() {
        let registry = create_schema_registry().unwrap();
        let engine = QueryEngine::new(&registry, EngineConfig::default());
        let request: Request = serde_json::from_value(json!({
            "entity": "Coupon",
            "operation": "update",
            "args": {"where": {"code": "SPRING"}, "data": {"amount": {"multiply": 2}}}
        }))
        .unwrap();
        let validated = engine.validate_request(&request).unwrap();
        assert!(matches!(validated, ValidatedOperation::Update { .. }));
    }

    #[test]
    fn test_composite_and_unknown_roots() {
        let registry = create_schema_registry().unwrap();
        let engine = QueryEngine::new(&registry, EngineConfig::default());
        let err = engine.validate_filter("OrderItem", &json!({})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownEntity);
        let err = engine.validate_filter("Invoice", &json!({})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownEntity);
    }

    #[test]
    fn test_missing_and_unknown_arguments() {
        let registry = create_schema_registry().unwrap();
        let engine = QueryEngine::new(&registry, EngineConfig::default());

        let op = Operation::new(OperationKind::Update, json!({"data": {"name": "x"}}));
        let err = engine.validate_operation("Worker", &op).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaViolation);

        let op = Operation::new(OperationKind::Delete, json!({"where": {"id": "w1"}, "cascade": true}));
        let err = engine.validate_operation("Worker", &op).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownField);
        assert_eq!(err.path.to_string(), "cascade");

        let op = Operation::new(OperationKind::DeleteMany, Value::Null);
        assert_eq!(
            engine.validate_operation("Worker", &op).unwrap(),
            ValidatedOperation::DeleteMany { filter: None }
        );
    }
}
