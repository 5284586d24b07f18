// Strong Types - Newtypes shared by the registry, filter and mutation trees
// Replaces bare indices and strings with dedicated types for compile-time safety

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an entity schema inside the registry arena.
///
/// Relations refer to their target through this index, so self-referential
/// and mutually-referential schemas never need cyclic ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    /// Get the raw arena index
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One step of a path from the request root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a value inside the request, e.g. `where.products.every.price.gt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Create a path starting at a named root key (`where`, `data`, ...)
    pub fn new(root: &str) -> Self {
        Self(vec![PathSegment::Key(root.to_string())])
    }

    /// Path extended with an object key
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    /// Path extended with an array index
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// A type-checked scalar value taken from untrusted input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScalarValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Enum(String),
    Null,
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Numeric view used by arithmetic update operators and comparisons
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(v) => Some(*v as f64),
            ScalarValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Render back to the JSON shape a document store would hold
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ScalarValue::String(s) | ScalarValue::Enum(s) => serde_json::Value::String(s.clone()),
            ScalarValue::Int(v) => serde_json::Value::from(*v),
            ScalarValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ScalarValue::Bool(v) => serde_json::Value::Bool(*v),
            ScalarValue::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            ScalarValue::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::String(s) => write!(f, "\"{}\"", s),
            ScalarValue::Int(v) => write!(f, "{}", v),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
            ScalarValue::Enum(s) => write!(f, "{}", s),
            ScalarValue::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        let path = FieldPath::new("data").key("items").key("set").index(0).key("price");
        assert_eq!(path.to_string(), "data.items.set[0].price");
        assert_eq!(FieldPath::root().to_string(), "<root>");
    }

    #[test]
    fn test_path_extension_does_not_mutate_parent() {
        let parent = FieldPath::new("where");
        let child = parent.key("name");
        assert_eq!(parent.segments().len(), 1);
        assert_eq!(child.segments().len(), 2);
    }

    #[test]
    fn test_scalar_to_json() {
        assert_eq!(ScalarValue::Int(3).to_json(), serde_json::json!(3));
        assert_eq!(ScalarValue::Enum("ADMIN".into()).to_json(), serde_json::json!("ADMIN"));
        assert!(ScalarValue::Null.to_json().is_null());
    }
}
