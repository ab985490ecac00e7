//! Error types for processing service calls

use thiserror::Error;

/// Result type alias for processing operations
pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Errors from the external parsing/chunking/embedding service
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("Processing transport error during {operation}: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// Service answered with a non-success status
    #[error("Processing service error during {operation} (status {status}): {message}")]
    Service {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Invalid processing response during {operation}: {reason}")]
    InvalidResponse {
        operation: &'static str,
        reason: String,
    },
}

impl ProcessingError {
    pub fn transport(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            operation,
            message: err.to_string(),
        }
    }

    pub fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation,
            reason: reason.into(),
        }
    }
}
