//! Error types for vector storage operations

use thiserror::Error;

/// Result type alias for vector data operations
pub type VectorDataResult<T> = Result<T, VectorDataError>;

/// Errors that can occur during vector storage operations
#[derive(Error, Debug)]
pub enum VectorDataError {
    /// Storage backend is unavailable or connection failed
    #[error("Vector storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Query or stored vector has the wrong dimensionality
    #[error("Vector dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Collection does not exist
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Collection name fails validation
    #[error("Invalid collection name '{name}': {reason}")]
    InvalidCollectionName { name: String, reason: String },

    /// Backend operation failed, with operation context
    #[error("Vector storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl VectorDataError {
    /// Wrap a backend error with the operation it occurred on.
    pub fn storage(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for VectorDataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
