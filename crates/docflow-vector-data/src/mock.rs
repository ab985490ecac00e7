//! In-memory `VectorRepository` for testing
//!
//! Stores chunks per collection and ranks searches with real cosine
//! similarity, so ordering assertions behave like the production backend.

// Allow test-specific patterns in mock implementation
#![allow(clippy::unwrap_used)] // Mocks can panic on lock poisoning
#![allow(clippy::arithmetic_side_effects)] // Test counters can overflow

use async_trait::async_trait;
use docflow_common::CorrelationId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{VectorDataError, VectorDataResult};
use crate::models::{
    ChunkRecord, CollectionStats, DocumentChunk, DocumentSummary, SearchHit, flatten_metadata,
};
use crate::traits::VectorRepository;

type CollectionMap = Arc<Mutex<HashMap<String, Vec<DocumentChunk>>>>;

/// Mock vector repository for tests
#[derive(Clone, Default)]
pub struct MockVectorRepository {
    collections: CollectionMap,
    fail_on_store: bool,
    fail_on_search: bool,
}

impl MockVectorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure store operations to fail (for error-path testing).
    pub const fn with_store_failure(mut self) -> Self {
        self.fail_on_store = true;
        self
    }

    /// Configure search operations to fail (for error-path testing).
    pub const fn with_search_failure(mut self) -> Self {
        self.fail_on_search = true;
        self
    }

    /// Stored chunks of a collection, in insertion order (for assertions).
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn chunks(&self, collection: &str) -> Vec<DocumentChunk> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn require_collection(
        map: &HashMap<String, Vec<DocumentChunk>>,
        name: &str,
    ) -> VectorDataResult<()> {
        if map.contains_key(name) {
            Ok(())
        } else {
            Err(VectorDataError::CollectionNotFound(name.to_string()))
        }
    }

    fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        1.0 - dot / (norm_a * norm_b)
    }

    fn matches_filter(
        chunk: &DocumentChunk,
        filter: Option<&HashMap<String, serde_json::Value>>,
    ) -> bool {
        let Some(filter) = filter else {
            return true;
        };
        let flat = flatten_metadata(&chunk.metadata);
        filter.iter().all(|(key, value)| match key.as_str() {
            "document_id" => chunk.document_id == value.as_str().unwrap_or_default(),
            "chunk_id" => chunk.id == value.as_str().unwrap_or_default(),
            _ => flat.get(key) == Some(value),
        })
    }
}

#[async_trait]
impl VectorRepository for MockVectorRepository {
    async fn create_collection(&self, name: &str) -> VectorDataResult<()> {
        self.collections
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> VectorDataResult<bool> {
        Ok(self.collections.lock().unwrap().remove(name).is_some())
    }

    async fn collection_exists(&self, name: &str) -> VectorDataResult<bool> {
        Ok(self.collections.lock().unwrap().contains_key(name))
    }

    async fn list_collections(&self) -> VectorDataResult<Vec<String>> {
        let mut names: Vec<String> = self.collections.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn collection_stats(&self, name: &str) -> VectorDataResult<CollectionStats> {
        let map = self.collections.lock().unwrap();
        Self::require_collection(&map, name)?;
        let chunks = map.get(name).map(Vec::as_slice).unwrap_or_default();
        Ok(CollectionStats {
            name: name.to_string(),
            vector_count: chunks.len(),
            dimension: chunks.first().map_or(0, |c| c.embedding.len()),
        })
    }

    async fn store_chunks(
        &self,
        collection: &str,
        chunks: &[DocumentChunk],
        _correlation_id: &CorrelationId,
    ) -> VectorDataResult<Vec<String>> {
        if self.fail_on_store {
            return Err(VectorDataError::storage(
                "store_chunks",
                "mock configured to fail",
            ));
        }

        let mut map = self.collections.lock().unwrap();
        let stored = map.entry(collection.to_string()).or_default();
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            ids.push(chunk.id.clone());
            // Upsert by deterministic chunk id
            if let Some(existing) = stored.iter_mut().find(|c| c.id == chunk.id) {
                *existing = chunk.clone();
            } else {
                stored.push(chunk.clone());
            }
        }
        Ok(ids)
    }

    async fn search_chunks(
        &self,
        collection: &str,
        query_embedding: Vec<f32>,
        top_k: usize,
        filter: Option<&HashMap<String, serde_json::Value>>,
        _correlation_id: &CorrelationId,
    ) -> VectorDataResult<Vec<SearchHit>> {
        if self.fail_on_search {
            return Err(VectorDataError::storage(
                "search_chunks",
                "mock configured to fail",
            ));
        }

        let map = self.collections.lock().unwrap();
        let chunks = map.get(collection).map(Vec::as_slice).unwrap_or_default();

        let mut hits: Vec<SearchHit> = chunks
            .iter()
            .filter(|chunk| Self::matches_filter(chunk, filter))
            .map(|chunk| {
                let distance = Self::cosine_distance(&query_embedding, &chunk.embedding);
                SearchHit {
                    chunk_id: chunk.id.clone(),
                    document_id: chunk.document_id.clone(),
                    text: chunk.text.clone(),
                    distance,
                    score: 1.0 - distance,
                    metadata: flatten_metadata(&chunk.metadata),
                }
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> VectorDataResult<usize> {
        let mut map = self.collections.lock().unwrap();
        let Some(chunks) = map.get_mut(collection) else {
            return Ok(0);
        };
        let before = chunks.len();
        chunks.retain(|c| c.document_id != document_id);
        Ok(before - chunks.len())
    }

    async fn get_document_chunks(
        &self,
        collection: &str,
        document_id: &str,
        limit: usize,
        offset: usize,
    ) -> VectorDataResult<Vec<ChunkRecord>> {
        let map = self.collections.lock().unwrap();
        let chunks = map.get(collection).map(Vec::as_slice).unwrap_or_default();

        let mut records: Vec<ChunkRecord> = chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .map(|c| ChunkRecord {
                chunk_id: c.id.clone(),
                document_id: c.document_id.clone(),
                index: c.index,
                text: c.text.clone(),
                metadata: flatten_metadata(&c.metadata),
            })
            .collect();
        records.sort_by_key(|r| r.index);
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn list_documents(&self, collection: &str) -> VectorDataResult<Vec<DocumentSummary>> {
        let map = self.collections.lock().unwrap();
        let chunks = map.get(collection).map(Vec::as_slice).unwrap_or_default();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for chunk in chunks {
            *counts.entry(chunk.document_id.as_str()).or_default() += 1;
        }
        let mut summaries: Vec<DocumentSummary> = counts
            .into_iter()
            .map(|(document_id, chunk_count)| DocumentSummary {
                document_id: document_id.to_string(),
                chunk_count,
            })
            .collect();
        summaries.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunk_id;
    use serde_json::json;

    fn chunk(document_id: &str, index: usize, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            id: chunk_id(document_id, index),
            document_id: document_id.to_string(),
            index,
            text: format!("text {index}"),
            embedding,
            metadata: HashMap::from([
                ("document_id".to_string(), json!(document_id)),
                ("filename".to_string(), json!("a.pdf")),
                ("chunk_index".to_string(), json!(index)),
            ]),
        }
    }

    #[tokio::test]
    async fn store_is_an_upsert_by_chunk_id() {
        let repo = MockVectorRepository::new();
        let correlation_id = CorrelationId::new();
        repo.create_collection("c1").await.unwrap();

        let chunks = vec![chunk("d1", 0, vec![1.0, 0.0]), chunk("d1", 1, vec![0.0, 1.0])];
        repo.store_chunks("c1", &chunks, &correlation_id).await.unwrap();
        repo.store_chunks("c1", &chunks, &correlation_id).await.unwrap();

        assert_eq!(repo.chunks("c1").len(), 2);
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_distance() {
        let repo = MockVectorRepository::new();
        let correlation_id = CorrelationId::new();
        repo.create_collection("c1").await.unwrap();
        repo.store_chunks(
            "c1",
            &[chunk("d1", 0, vec![1.0, 0.0]), chunk("d1", 1, vec![0.0, 1.0])],
            &correlation_id,
        )
        .await
        .unwrap();

        let hits = repo
            .search_chunks("c1", vec![0.9, 0.1], 10, None, &correlation_id)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        let first = hits.first().unwrap();
        assert_eq!(first.chunk_id, "d1-chunk-0");
        assert!((first.score - (1.0 - first.distance)).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn filters_are_exact_equality() {
        let repo = MockVectorRepository::new();
        let correlation_id = CorrelationId::new();
        repo.create_collection("c1").await.unwrap();
        repo.store_chunks(
            "c1",
            &[chunk("d1", 0, vec![1.0, 0.0]), chunk("d2", 0, vec![1.0, 0.0])],
            &correlation_id,
        )
        .await
        .unwrap();

        let filter = HashMap::from([("document_id".to_string(), json!("d2"))]);
        let hits = repo
            .search_chunks("c1", vec![1.0, 0.0], 10, Some(&filter), &correlation_id)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits.first().unwrap().document_id, "d2");
    }

    #[tokio::test]
    async fn delete_document_reports_count_and_cascades() {
        let repo = MockVectorRepository::new();
        let correlation_id = CorrelationId::new();
        repo.create_collection("c1").await.unwrap();
        repo.store_chunks(
            "c1",
            &[
                chunk("d1", 0, vec![1.0, 0.0]),
                chunk("d1", 1, vec![0.0, 1.0]),
                chunk("d2", 0, vec![1.0, 1.0]),
            ],
            &correlation_id,
        )
        .await
        .unwrap();

        assert_eq!(repo.delete_document("c1", "d1").await.unwrap(), 2);
        assert_eq!(repo.delete_document("c1", "d1").await.unwrap(), 0);
        assert_eq!(
            repo.list_documents("c1").await.unwrap(),
            vec![DocumentSummary {
                document_id: "d2".to_string(),
                chunk_count: 1
            }]
        );
    }

    #[tokio::test]
    async fn document_chunks_paginate_in_index_order() {
        let repo = MockVectorRepository::new();
        let correlation_id = CorrelationId::new();
        repo.create_collection("c1").await.unwrap();
        // Insert out of order
        repo.store_chunks(
            "c1",
            &[
                chunk("d1", 2, vec![1.0, 0.0]),
                chunk("d1", 0, vec![1.0, 0.0]),
                chunk("d1", 1, vec![1.0, 0.0]),
            ],
            &correlation_id,
        )
        .await
        .unwrap();

        let page = repo.get_document_chunks("c1", "d1", 2, 1).await.unwrap();
        let indices: Vec<usize> = page.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }
}
