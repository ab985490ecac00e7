//! Error-context helpers shared across docflow crates
//!
//! Each crate defines its own `thiserror` enum; this module only provides the
//! glue for attaching operation context to foreign errors.

use std::fmt;

/// Attach context to an error result, similar to `anyhow::Context` but
/// producing a plain string for crates that wrap transport errors by message.
pub trait ErrorContext<T> {
    /// Add static context to an error.
    fn context<C>(self, context: C) -> Result<T, String>
    where
        C: fmt::Display + Send + Sync + 'static;

    /// Add context computed lazily.
    fn with_context<C, F>(self, f: F) -> Result<T, String>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T, String>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| format!("{context}: {e}"))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, String>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| format!("{}: {}", f(), e))
    }
}
