// Core types and input helpers shared by every validator

pub mod input;
pub mod strong_types;

// Re-export commonly used types
pub use strong_types::{EntityId, FieldPath, PathSegment, ScalarValue};
