//! Error types for document registry operations

use thiserror::Error;

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors produced by the document registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No document with the given id
    #[error("Document not found: {id}")]
    NotFound { id: String },

    /// A document with the given id is already registered
    #[error("Document already exists: {id}")]
    AlreadyExists { id: String },

    /// Document failed validation
    #[error("Invalid document field '{field}': {reason}")]
    Invalid { field: String, reason: String },

    /// Transport failure against the backing store, with operation context
    #[error("Registry store error during {operation} for '{id}': {message}")]
    Store {
        operation: &'static str,
        id: String,
        message: String,
    },

    /// Record (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    /// Wrap a backend error with the operation and document id it occurred on.
    pub fn store(operation: &'static str, id: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Store {
            operation,
            id: id.into(),
            message: err.to_string(),
        }
    }

    /// Build a validation error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
