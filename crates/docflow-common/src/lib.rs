//! Shared utilities for the docflow crates
//!
//! Correlation IDs for cross-service tracing, error-context helpers, and
//! process-wide environment initialization.

pub mod correlation;
pub mod error;
pub mod init;

pub use correlation::CorrelationId;
pub use error::ErrorContext;
pub use init::initialize_environment;
