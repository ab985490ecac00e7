//! In-memory `DocumentRegistry` for testing

// Allow test-specific patterns in mock implementation
#![allow(clippy::unwrap_used)] // Mocks can panic on lock poisoning
#![allow(clippy::arithmetic_side_effects)] // Test counters can overflow

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{RegistryError, RegistryResult};
use crate::models::{Document, DocumentPatch, DocumentStatus};
use crate::traits::DocumentRegistry;

type DocumentMap = Arc<Mutex<HashMap<String, Document>>>;

/// Mock registry for tests; same semantics as the Redis implementation but
/// over a plain map, plus behavior toggles for error-path testing.
#[derive(Clone, Default)]
pub struct MockDocumentRegistry {
    documents: DocumentMap,
    fail_next: Arc<Mutex<Option<String>>>,
}

impl MockDocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation fail with a store error.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    /// Number of stored documents (for test assertions).
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    /// Whether the registry holds no documents.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn is_empty(&self) -> bool {
        self.documents.lock().unwrap().is_empty()
    }

    fn check_fail(&self, operation: &'static str, id: &str) -> RegistryResult<()> {
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(RegistryError::Store {
                operation,
                id: id.to_string(),
                message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentRegistry for MockDocumentRegistry {
    async fn register(&self, mut doc: Document) -> RegistryResult<Document> {
        self.check_fail("register", &doc.id)?;
        doc.validate()?;
        let now = Utc::now();
        doc.created_at = now;
        doc.updated_at = now;

        let mut docs = self.documents.lock().unwrap();
        if docs.contains_key(&doc.id) {
            return Err(RegistryError::AlreadyExists { id: doc.id });
        }
        docs.insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }

    async fn get(&self, id: &str) -> RegistryResult<Document> {
        self.check_fail("get", id)?;
        self.documents
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    async fn update(&self, id: &str, patch: DocumentPatch) -> RegistryResult<Document> {
        self.check_fail("update", id)?;
        let mut docs = self.documents.lock().unwrap();
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
        let mut updated = doc.clone();
        patch.apply(&mut updated);
        updated.validate()?;
        *doc = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> RegistryResult<()> {
        self.check_fail("delete", id)?;
        self.documents
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    async fn list(&self) -> RegistryResult<Vec<Document>> {
        self.check_fail("list", "*")?;
        Ok(self.documents.lock().unwrap().values().cloned().collect())
    }

    async fn list_by_collection(&self, collection: &str) -> RegistryResult<Vec<Document>> {
        self.check_fail("list_by_collection", collection)?;
        Ok(self
            .documents
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.collection == collection)
            .cloned()
            .collect())
    }

    async fn list_by_status(&self, status: DocumentStatus) -> RegistryResult<Vec<Document>> {
        self.check_fail("list_by_status", "*")?;
        Ok(self
            .documents
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.status == status)
            .cloned()
            .collect())
    }

    async fn find_by_filename(&self, filename: &str) -> RegistryResult<Option<Document>> {
        self.check_fail("find_by_filename", filename)?;
        Ok(self
            .documents
            .lock()
            .unwrap()
            .values()
            .find(|d| d.filename == filename)
            .cloned())
    }

    async fn filter_by_metadata(
        &self,
        filters: &HashMap<String, serde_json::Value>,
    ) -> RegistryResult<Vec<Document>> {
        self.check_fail("filter_by_metadata", "*")?;
        Ok(self
            .documents
            .lock()
            .unwrap()
            .values()
            .filter(|doc| {
                doc.metadata.as_ref().is_some_and(|meta| {
                    filters.iter().all(|(k, v)| meta.get(k) == Some(v))
                })
            })
            .cloned()
            .collect())
    }

    async fn cleanup(&self, older_than: Duration) -> RegistryResult<usize> {
        self.check_fail("cleanup", "*")?;
        let cutoff = Utc::now() - older_than;
        let mut docs = self.documents.lock().unwrap();
        let before = docs.len();
        docs.retain(|_, d| !(d.status == DocumentStatus::Deleted && d.created_at < cutoff));
        Ok(before - docs.len())
    }
}
