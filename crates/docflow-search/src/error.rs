//! Error types for the search path

use thiserror::Error;

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors surfaced by the search service
#[derive(Error, Debug)]
pub enum SearchError {
    /// Request failed validation (bad top_k, collection name, ...)
    #[error("Invalid search request field '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Query embedding failed or returned nothing
    #[error("Query embedding failed: {0}")]
    Embedding(#[from] docflow_processing::ProcessingError),

    /// Vector store failure
    #[error("Vector search failed: {0}")]
    Vector(#[from] docflow_vector_data::VectorDataError),
}

impl SearchError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
