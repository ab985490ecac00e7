//! Error types for job store and queue operations

use thiserror::Error;

use crate::models::JobStatus;

/// Result type alias for job operations
pub type JobResult<T> = Result<T, JobError>;

/// Errors produced by the job store and queues
#[derive(Error, Debug)]
pub enum JobError {
    /// No job with the given id
    #[error("Job not found: {id}")]
    NotFound { id: String },

    /// A job with the given id already exists
    #[error("Job already exists: {id}")]
    AlreadyExists { id: String },

    /// Field-level validation failure
    #[error("Invalid job field '{field}': {reason}")]
    Invalid { field: String, reason: String },

    /// Disallowed status transition
    #[error("Invalid job status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// Transport failure against the backing store, with operation context
    #[error("Job store error during {operation} for '{id}': {message}")]
    Store {
        operation: &'static str,
        id: String,
        message: String,
    },

    /// Record (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JobError {
    /// Wrap a backend error with the operation and job id it occurred on.
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
