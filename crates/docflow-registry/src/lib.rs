//! Persistent document metadata store
//!
//! Documents are stored as JSON records in a Redis-compatible key-value
//! backend, with set-based secondary indexes by collection and status plus a
//! filename pointer. All multi-key writes run inside a single MULTI/EXEC
//! transaction so the indexes always mirror the records.

pub mod error;
pub mod keys;
pub mod mock;
pub mod models;
pub mod redis_registry;
pub mod traits;

pub use error::{RegistryError, RegistryResult};
pub use mock::MockDocumentRegistry;
pub use models::{Document, DocumentPatch, DocumentStatus, ProcessingOptions};
pub use redis_registry::RedisDocumentRegistry;
pub use traits::DocumentRegistry;
