//! Error types for the Gel adapter.

use thiserror::Error;

/// The main error type for adapter operations.
#[derive(Debug, Error)]
pub enum GelError {
    /// The requested model is not part of the supplied schema.
    #[error("[Gel Adapter] Model {0} not found in schema")]
    ModelNotFound(String),

    /// A filter, sort or selection names a field the model does not have.
    #[error("[Gel Adapter] Field '{field}' not found on model {model}")]
    FieldNotFound { model: String, field: String },

    /// Operator tag outside the known set.
    #[error("Unknown operator: '{0}'")]
    UnknownOperator(String),

    /// Operation or operator combination that has no EdgeQL translation.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Malformed identity value (only raised with `strict_ids`).
    #[error("Invalid identity for '{field}': '{value}'")]
    InvalidIdentity { field: String, value: String },

    /// Two fields derive the same enum name from different literal sets.
    #[error("Conflicting scalar enum '{name}': literal sets differ")]
    ConflictingEnum { name: String },

    /// A statement that always yields a row came back empty.
    #[error("No result from {0}")]
    NoResult(String),

    /// The client answered with a value of the wrong shape.
    #[error("Unexpected result from {operation}: {value}")]
    UnexpectedResult { operation: String, value: String },

    /// Failed to parse a compact filter expression.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the database client, passed through as-is.
    #[error(transparent)]
    Driver(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl GelError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a missing field error.
    pub fn field_not_found(model: &str, field: &str) -> Self {
        Self::FieldNotFound {
            model: model.to_string(),
            field: field.to_string(),
        }
    }

    /// Wrap a client error.
    pub fn driver<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Driver(Box::new(err))
    }
}

/// Result type alias for adapter operations.
pub type GelResult<T> = Result<T, GelError>;
