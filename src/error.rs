//! Error types for schema validation and construction
//!
//! Every variant that concerns a document object carries that object's
//! label: its `@id`, or its kind and name when the `@id` itself is missing.

use thiserror::Error;

/// Result type for Felis operations
pub type Result<T> = std::result::Result<T, FelisError>;

/// Felis validation and construction errors
#[derive(Error, Debug)]
pub enum FelisError {
    #[error("Missing field '{field}' on {object}")]
    MissingField { object: String, field: String },

    #[error("Invalid type for field '{field}' on {object}: expected {expected}")]
    InvalidFieldType {
        object: String,
        field: String,
        expected: String,
    },

    #[error("Incorrect type name '{datatype}' for {object}")]
    InvalidType { object: String, datatype: String },

    #[error("Unknown datatype: {0}")]
    UnknownType(String),

    #[error("Invalid constraint type '{kind}' for {object}")]
    InvalidConstraintType { object: String, kind: String },

    #[error("Conflicting fields on {object}: {reason}")]
    ConflictingFields { object: String, reason: String },

    #[error("Unresolved reference '{reference}' from {object}")]
    UnresolvedReference { object: String, reference: String },

    #[error("Inconsistent use of table names in {object}: {reason}")]
    TableConsistency { object: String, reason: String },

    #[error("Unknown {dialect} type '{type_name}' for {object}")]
    UnknownBackendType {
        object: String,
        dialect: String,
        type_name: String,
    },

    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("Length is required for {datatype} column {object}")]
    MissingLength { object: String, datatype: String },

    #[error("Invalid value for '{field}' on {object}: {reason}")]
    InvalidValue {
        object: String,
        field: String,
        reason: String,
    },

    #[error("Duplicate {kind} name '{name}' in {scope}")]
    DuplicateName {
        kind: String,
        name: String,
        scope: String,
    },

    #[error("Duplication of @id {0}")]
    DuplicateId(String),

    #[error("Redundant {dialect} datatype override '{value}' on {object}: same as the default")]
    RedundantOverride {
        object: String,
        dialect: String,
        value: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl FelisError {
    /// Shorthand for a missing required field
    pub fn missing(object: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            object: object.into(),
            field: field.into(),
        }
    }

    /// Shorthand for a field holding a value of the wrong JSON type
    pub fn field_type(
        object: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidFieldType {
            object: object.into(),
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Shorthand for a well-typed field holding a disallowed value
    pub fn invalid_value(
        object: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            object: object.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for mutually exclusive or jointly required fields
    pub fn conflicting(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConflictingFields {
            object: object.into(),
            reason: reason.into(),
        }
    }
}
