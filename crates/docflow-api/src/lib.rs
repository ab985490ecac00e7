//! HTTP adapter layer for docflow
//!
//! Thin axum handlers: decode the request, delegate to the core services,
//! map error kinds to HTTP statuses. No business logic lives here.

pub mod bootstrap;
pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::AppState;
