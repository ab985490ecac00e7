//! Vector repository trait
//!
//! Abstracts the vector database so implementations (Qdrant in production,
//! in-memory for tests) are interchangeable behind `Arc<dyn VectorRepository>`.

use async_trait::async_trait;
use docflow_common::CorrelationId;
use std::collections::HashMap;

use crate::error::VectorDataResult;
use crate::models::{ChunkRecord, CollectionStats, DocumentChunk, DocumentSummary, SearchHit};

/// Capability set over the vector database
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Create a collection if it does not already exist (idempotent).
    async fn create_collection(&self, name: &str) -> VectorDataResult<()>;

    /// Drop a collection. Returns false if it did not exist.
    async fn delete_collection(&self, name: &str) -> VectorDataResult<bool>;

    /// Whether the collection exists.
    async fn collection_exists(&self, name: &str) -> VectorDataResult<bool>;

    /// Names of all collections.
    async fn list_collections(&self) -> VectorDataResult<Vec<String>>;

    /// Vector count and dimensionality for a collection.
    async fn collection_stats(&self, name: &str) -> VectorDataResult<CollectionStats>;

    /// Bulk-upsert chunks. Point ids derive from the deterministic chunk ids,
    /// so storing the same chunks twice leaves one copy. Metadata must
    /// already be flattened to scalars (see
    /// [`crate::models::flatten_metadata`]). Returns the chunk ids stored.
    async fn store_chunks(
        &self,
        collection: &str,
        chunks: &[DocumentChunk],
        correlation_id: &CorrelationId,
    ) -> VectorDataResult<Vec<String>>;

    /// Nearest-neighbor search. `filter` is exact equality over payload
    /// fields. Results are ranked by ascending cosine distance with
    /// `score = 1 - distance`.
    async fn search_chunks(
        &self,
        collection: &str,
        query_embedding: Vec<f32>,
        top_k: usize,
        filter: Option<&HashMap<String, serde_json::Value>>,
        correlation_id: &CorrelationId,
    ) -> VectorDataResult<Vec<SearchHit>>;

    /// Delete every chunk of a document. Returns the number deleted.
    async fn delete_document(&self, collection: &str, document_id: &str)
    -> VectorDataResult<usize>;

    /// Paginated chunk retrieval for one document, sorted by chunk index.
    async fn get_document_chunks(
        &self,
        collection: &str,
        document_id: &str,
        limit: usize,
        offset: usize,
    ) -> VectorDataResult<Vec<ChunkRecord>>;

    /// Distinct documents in the collection with per-document chunk counts.
    async fn list_documents(&self, collection: &str) -> VectorDataResult<Vec<DocumentSummary>>;
}
