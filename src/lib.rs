// Market Query - Schema-driven filter and mutation validation

// Core types and primitives
pub mod core;

// Entity schema system and the marketplace entity definitions
pub mod ent_schema;
pub mod schemas;

// Filter trees: scalar, list, logical and relation predicates
pub mod query;

// Mutation trees: update operators, nested relation verbs, embedded lists
pub mod mutation;

// Operation envelope
pub mod engine;

// Common utilities
pub mod config;
pub mod error;

// Re-exports for convenience
pub use config::EngineConfig;
pub use engine::{Operation, OperationKind, QueryEngine, Request, ValidatedOperation};
pub use ent_schema::{EntSchema, SchemaRegistry};
pub use error::{AppError, AppResult, ErrorKind, ValidationError, ValidationResult};
