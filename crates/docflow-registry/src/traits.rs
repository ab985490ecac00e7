//! Document registry trait for dependency injection and testing

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;

use crate::error::RegistryResult;
use crate::models::{Document, DocumentPatch, DocumentStatus};

/// Capability set for the document metadata store
///
/// Backed by Redis in production and by an in-memory map in tests. All
/// mutations keep the secondary indexes (collection, status, filename)
/// consistent with the records.
#[async_trait]
pub trait DocumentRegistry: Send + Sync {
    /// Register a new document. Rejects duplicates with `AlreadyExists`.
    async fn register(&self, doc: Document) -> RegistryResult<Document>;

    /// Fetch a document by id or `NotFound`.
    async fn get(&self, id: &str) -> RegistryResult<Document>;

    /// Apply a partial update; moves index memberships when collection or
    /// status change and re-validates the result.
    async fn update(&self, id: &str, patch: DocumentPatch) -> RegistryResult<Document>;

    /// Remove the record and all its index memberships in one transaction.
    async fn delete(&self, id: &str) -> RegistryResult<()>;

    /// All registered documents.
    async fn list(&self) -> RegistryResult<Vec<Document>>;

    /// Documents in a collection.
    async fn list_by_collection(&self, collection: &str) -> RegistryResult<Vec<Document>>;

    /// Documents in a status.
    async fn list_by_status(&self, status: DocumentStatus) -> RegistryResult<Vec<Document>>;

    /// Resolve a filename pointer to its document, if any.
    async fn find_by_filename(&self, filename: &str) -> RegistryResult<Option<Document>>;

    /// Full scan filtered by exact metadata equality.
    async fn filter_by_metadata(
        &self,
        filters: &HashMap<String, serde_json::Value>,
    ) -> RegistryResult<Vec<Document>>;

    /// Delete documents with status `deleted` created more than `older_than`
    /// ago. Returns the number removed.
    async fn cleanup(&self, older_than: Duration) -> RegistryResult<usize>;
}
