// Query module - Typed filter trees built from untrusted where-objects
//
// Validation is split by concern: scalar operators, list operators, logical
// composition and relation predicates. All of them extend `FilterParser`.

pub mod args;
pub mod eval;
pub mod list_filter;
pub mod logical;
pub mod relation_filter;
pub mod scalar_filter;
pub mod unique;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::core::{EntityId, FieldPath, ScalarValue};
use crate::ent_schema::SchemaRegistry;
use crate::error::{ValidationError, ValidationResult};

pub use args::{FindManyArgs, OrderBy, SortOrder};
pub use scalar_filter::{coerce_scalar, parse_date};
pub use unique::UniqueWhere;

/// A validated filter rooted at one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityFilter {
    pub entity: EntityId,
    pub node: FilterNode,
}

impl EntityFilter {
    pub fn matches(&self, doc: &serde_json::Value) -> bool {
        self.node.matches(doc)
    }
}

/// Node of a filter tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterNode {
    And(Vec<FilterNode>),
    /// An empty `Or` matches nothing
    Or(Vec<FilterNode>),
    /// Matches when none of the children match
    Not(Vec<FilterNode>),
    Scalar { field: String, filter: ScalarFilter },
    List { field: String, filter: ListFilter },
    ToMany { field: String, target: EntityId, filter: ToManyFilter },
    ToOne { field: String, target: EntityId, filter: ToOneFilter },
    Embedded { field: String, element: EntityId, filter: EmbeddedFilter },
}

impl FilterNode {
    /// Filter that places no constraint
    pub fn match_all() -> Self {
        FilterNode::And(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryMode {
    #[default]
    Default,
    Insensitive,
}

/// Operators applied to one scalar field; all must hold
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScalarFilter {
    pub conditions: Vec<ScalarCondition>,
    pub mode: QueryMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarCondition {
    Equals(ScalarValue),
    In(Vec<ScalarValue>),
    NotIn(Vec<ScalarValue>),
    Lt(ScalarValue),
    Lte(ScalarValue),
    Gt(ScalarValue),
    Gte(ScalarValue),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Not(Box<ScalarFilter>),
    /// Whether the field is present at all, independent of being null
    IsSet(bool),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListFilter {
    pub conditions: Vec<ListCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListCondition {
    Has(ScalarValue),
    HasEvery(Vec<ScalarValue>),
    HasSome(Vec<ScalarValue>),
    IsEmpty(bool),
    /// Order-sensitive exact match
    Equals(Vec<ScalarValue>),
}

/// Quantified predicates over a to-many relation.
///
/// `every` holds vacuously when the related collection is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToManyFilter {
    pub every: Option<Box<FilterNode>>,
    pub some: Option<Box<FilterNode>>,
    pub none: Option<Box<FilterNode>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToOneFilter {
    pub conditions: Vec<ToOneCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ToOneCondition {
    /// Related record exists and matches
    Is(Box<FilterNode>),
    /// Related record is absent or does not match
    IsNot(Box<FilterNode>),
    IsAbsent,
    IsPresent,
}

/// Predicates over an embedded value list, scoped to the element schema
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmbeddedFilter {
    pub every: Option<Box<FilterNode>>,
    pub some: Option<Box<FilterNode>>,
    pub none: Option<Box<FilterNode>>,
    pub is_empty: Option<bool>,
}

/// Recursive where-object validator bound to one registry
pub struct FilterParser<'r> {
    registry: &'r SchemaRegistry,
    max_depth: usize,
}

impl<'r> FilterParser<'r> {
    pub fn new(registry: &'r SchemaRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            max_depth: config.max_depth,
        }
    }

    pub fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    /// Validate a where-object for `entity`, starting a fresh depth count
    pub fn parse(&self, entity: EntityId, value: &serde_json::Value, path: &FieldPath) -> ValidationResult<EntityFilter> {
        let node = self.parse_where(entity, value, path, 0)?;
        Ok(EntityFilter { entity, node })
    }

    pub(crate) fn enter(&self, depth: usize, path: &FieldPath) -> ValidationResult<usize> {
        enter_level(depth, self.max_depth, path)
    }
}

/// Account for one more nesting level, failing once `max_depth` is exceeded
pub(crate) fn enter_level(depth: usize, max_depth: usize, path: &FieldPath) -> ValidationResult<usize> {
    let depth = depth + 1;
    if depth > max_depth {
        return Err(ValidationError::recursion_limit(path.clone(), max_depth));
    }
    Ok(depth)
}
