use serde::Serialize;
use serde_json::json;
use std::fmt;

use crate::core::FieldPath;

/// Kinds of rejected input. Each one is a per-request failure, never fatal to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnknownEntity,
    UnknownField,
    SchemaViolation,
    CardinalityViolation,
    AmbiguousUpdateOperator,
    RecursionLimitExceeded,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownEntity => "UnknownEntity",
            ErrorKind::UnknownField => "UnknownField",
            ErrorKind::SchemaViolation => "SchemaViolation",
            ErrorKind::CardinalityViolation => "CardinalityViolation",
            ErrorKind::AmbiguousUpdateOperator => "AmbiguousUpdateOperator",
            ErrorKind::RecursionLimitExceeded => "RecursionLimitExceeded",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured validation failure: kind, full path from the request root, and a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub path: FieldPath,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    pub fn unknown_entity(path: FieldPath, entity: &str) -> Self {
        Self::new(ErrorKind::UnknownEntity, path, format!("unknown entity '{}'", entity))
    }

    pub fn unknown_field(path: FieldPath, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownField, path, message)
    }

    pub fn schema_violation(path: FieldPath, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaViolation, path, message)
    }

    pub fn cardinality(path: FieldPath, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CardinalityViolation, path, message)
    }

    pub fn ambiguous(path: FieldPath, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AmbiguousUpdateOperator, path, message)
    }

    pub fn recursion_limit(path: FieldPath, limit: usize) -> Self {
        Self::new(
            ErrorKind::RecursionLimitExceeded,
            path,
            format!("nesting exceeds the maximum depth of {}", limit),
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    ConfigurationError(String),
    SerializationError(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(err) => write!(f, "Validation error: {}", err),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// HTTP status the upstream request layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(err) => match err.kind {
                ErrorKind::UnknownEntity => 404,
                ErrorKind::RecursionLimitExceeded => 413,
                _ => 400,
            },
            AppError::SerializationError(_) => 400,
            AppError::ConfigurationError(_) | AppError::Internal(_) => 500,
        }
    }

    /// JSON body matching the status code
    pub fn to_response_body(&self) -> serde_json::Value {
        match self {
            AppError::Validation(err) => json!({
                "error": err.message,
                "kind": err.kind,
                "path": err.path.to_string(),
                "status": self.status_code(),
            }),
            AppError::SerializationError(msg) => json!({
                "error": msg,
                "status": self.status_code(),
            }),
            AppError::ConfigurationError(_) | AppError::Internal(_) => json!({
                "error": "Internal server error",
                "status": self.status_code(),
            }),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_includes_path() {
        let err = ValidationError::unknown_field(
            FieldPath::new("where").key("price").key("like"),
            "unknown operator 'like'",
        );
        assert_eq!(
            err.to_string(),
            "UnknownField at where.price.like: unknown operator 'like'"
        );
    }

    #[test]
    fn test_status_codes() {
        let bad = AppError::from(ValidationError::schema_violation(FieldPath::root(), "x"));
        assert_eq!(bad.status_code(), 400);
        let missing = AppError::from(ValidationError::unknown_entity(FieldPath::root(), "Nope"));
        assert_eq!(missing.status_code(), 404);
        assert_eq!(AppError::Internal("boom".into()).status_code(), 500);
        assert_eq!(
            AppError::Internal("boom".into()).to_response_body()["error"],
            "Internal server error"
        );
    }
}
