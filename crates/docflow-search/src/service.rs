//! Search service: validate, consult cache, embed, search, enrich

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use docflow_common::CorrelationId;
use docflow_processing::ProcessingClient;
use docflow_vector_data::{VectorRepository, validate_collection_name};

use crate::cache::SearchCache;
use crate::error::{SearchError, SearchResult};
use crate::models::{SearchMatch, SearchOptions, SearchRequest};

/// Semantic search over a collection of embedded chunks
pub struct SearchService {
    processing: Arc<dyn ProcessingClient>,
    vector_repo: Arc<dyn VectorRepository>,
    cache: SearchCache,
    options: SearchOptions,
}

impl SearchService {
    pub fn new(
        processing: Arc<dyn ProcessingClient>,
        vector_repo: Arc<dyn VectorRepository>,
        options: SearchOptions,
    ) -> Self {
        Self {
            processing,
            vector_repo,
            cache: SearchCache::new(options.cache_capacity, options.cache_ttl),
            options,
        }
    }

    /// Validate the request and resolve the effective top_k.
    fn validate(&self, request: &SearchRequest) -> SearchResult<usize> {
        if request.query.trim().is_empty() {
            return Err(SearchError::validation("query", "must not be empty"));
        }
        validate_collection_name(&request.collection)
            .map_err(|e| SearchError::validation("collection", e.to_string()))?;

        let top_k = if request.top_k <= 0 {
            self.options.default_top_k
        } else {
            let requested = request.top_k as usize;
            if requested > self.options.max_top_k {
                return Err(SearchError::validation(
                    "top_k",
                    format!("must not exceed {}", self.options.max_top_k),
                ));
            }
            requested
        };
        Ok(top_k)
    }

    /// Fingerprint the request for the cache: every parameter that changes
    /// the result set participates.
    fn cache_key(request: &SearchRequest, top_k: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.collection.as_bytes());
        hasher.update([0]);
        hasher.update(request.query.as_bytes());
        hasher.update([0]);
        hasher.update(top_k.to_le_bytes());
        if let Some(filter) = &request.filter {
            // BTreeMap for a stable key order
            let ordered: BTreeMap<&String, &serde_json::Value> = filter.iter().collect();
            for (key, value) in ordered {
                hasher.update(key.as_bytes());
                hasher.update([0]);
                hasher.update(value.to_string().as_bytes());
                hasher.update([0]);
            }
        }
        if let Some(min_score) = request.min_score {
            hasher.update(min_score.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Run a search request.
    ///
    /// # Errors
    /// `SearchError::Validation` for bad input; embedding and vector-store
    /// failures pass through with their own kinds.
    #[tracing::instrument(skip(self, request), fields(collection = %request.collection, correlation_id, cached = false))]
    pub async fn search(&self, request: SearchRequest) -> SearchResult<Vec<SearchMatch>> {
        let correlation_id = CorrelationId::new();
        tracing::Span::current().record("correlation_id", correlation_id.to_string());

        let top_k = self.validate(&request)?;
        let cache_key = Self::cache_key(&request, top_k);

        if request.use_cache {
            if let Some(cached) = self.cache.get(&cache_key) {
                tracing::Span::current().record("cached", true);
                tracing::debug!(collection = %request.collection, "Search cache hit");
                return Ok(cached);
            }
        }

        let embeddings = self
            .processing
            .embed(std::slice::from_ref(&request.query))
            .await?;
        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| {
                SearchError::Embedding(docflow_processing::ProcessingError::invalid(
                    "embed",
                    "no embedding returned for query",
                ))
            })?;

        let hits = self
            .vector_repo
            .search_chunks(
                &request.collection,
                query_embedding,
                top_k,
                request.filter.as_ref(),
                &correlation_id,
            )
            .await?;

        let min_score = request.min_score.unwrap_or(f32::MIN);
        let results: Vec<SearchMatch> = hits
            .into_iter()
            .filter(|hit| hit.score >= min_score)
            .map(|hit| {
                let filename = hit
                    .metadata
                    .get("filename")
                    .and_then(|v| v.as_str())
                    .map(ToString::to_string);
                SearchMatch {
                    chunk_id: hit.chunk_id,
                    document_id: hit.document_id,
                    text: hit.text,
                    score: hit.score,
                    distance: hit.distance,
                    filename,
                    collection: request.collection.clone(),
                    metadata: hit.metadata,
                }
            })
            .collect();

        if request.use_cache {
            self.cache.put(cache_key, results.clone());
        }

        tracing::debug!(
            collection = %request.collection,
            result_count = results.len(),
            "Search completed"
        );
        Ok(results)
    }
}

/// Equality filter type used by the adapter layer
pub type SearchFilter = HashMap<String, serde_json::Value>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use docflow_processing::MockProcessingClient;
    use docflow_vector_data::{DocumentChunk, MockVectorRepository, chunk_id};
    use serde_json::json;
    use std::time::Duration;

    fn chunk(document_id: &str, index: usize, text: &str, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            id: chunk_id(document_id, index),
            document_id: document_id.to_string(),
            index,
            text: text.to_string(),
            embedding,
            metadata: HashMap::from([
                ("document_id".to_string(), json!(document_id)),
                ("filename".to_string(), json!("a.pdf")),
                ("chunk_index".to_string(), json!(index)),
                ("total_chunks".to_string(), json!(2)),
            ]),
        }
    }

    async fn seeded_repo() -> Arc<MockVectorRepository> {
        let repo = Arc::new(MockVectorRepository::new());
        let correlation_id = CorrelationId::new();
        repo.create_collection("c1").await.unwrap();
        repo.store_chunks(
            "c1",
            &[
                chunk("d1", 0, "alpha", vec![1.0, 0.0, 0.0, 1.0]),
                chunk("d1", 1, "beta", vec![0.0, 1.0, 0.0, 1.0]),
            ],
            &correlation_id,
        )
        .await
        .unwrap();
        repo
    }

    fn service(
        processing: &Arc<MockProcessingClient>,
        repo: &Arc<MockVectorRepository>,
        options: SearchOptions,
    ) -> SearchService {
        SearchService::new(
            Arc::clone(processing) as Arc<dyn ProcessingClient>,
            Arc::clone(repo) as Arc<dyn VectorRepository>,
            options,
        )
    }

    #[tokio::test]
    async fn nonpositive_top_k_falls_back_to_default() {
        let processing = Arc::new(MockProcessingClient::new());
        let repo = seeded_repo().await;
        let svc = service(&processing, &repo, SearchOptions::default());

        let results = svc
            .search(SearchRequest::new("c1", "alpha").with_top_k(0))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);

        let results = svc
            .search(SearchRequest::new("c1", "alpha").with_top_k(-5))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn oversized_top_k_is_a_validation_error() {
        let processing = Arc::new(MockProcessingClient::new());
        let repo = seeded_repo().await;
        let svc = service(&processing, &repo, SearchOptions::default());

        let err = svc
            .search(SearchRequest::new("c1", "alpha").with_top_k(101))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Validation { field, .. } if field == "top_k"));
    }

    #[tokio::test]
    async fn bad_collection_names_are_rejected() {
        let processing = Arc::new(MockProcessingClient::new());
        let repo = seeded_repo().await;
        let svc = service(&processing, &repo, SearchOptions::default());

        for name in ["", "ab", "bad name", "dots.bad"] {
            let err = svc
                .search(SearchRequest::new(name, "alpha"))
                .await
                .unwrap_err();
            assert!(
                matches!(err, SearchError::Validation { ref field, .. } if field == "collection"),
                "expected rejection for {name:?}"
            );
        }
    }

    #[tokio::test]
    async fn identical_requests_embed_once_and_share_results() {
        let processing = Arc::new(MockProcessingClient::new());
        let repo = seeded_repo().await;
        let svc = service(&processing, &repo, SearchOptions::default());

        let request = SearchRequest::new("c1", "alpha").with_top_k(5);
        let first = svc.search(request.clone()).await.unwrap();
        let second = svc.search(request).await.unwrap();

        assert_eq!(processing.embed_calls(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn ttl_expiry_re_invokes_the_embedder() {
        let processing = Arc::new(MockProcessingClient::new());
        let repo = seeded_repo().await;
        let options = SearchOptions {
            cache_ttl: Duration::from_millis(30),
            ..SearchOptions::default()
        };
        let svc = service(&processing, &repo, options);

        let request = SearchRequest::new("c1", "alpha").with_top_k(5);
        svc.search(request.clone()).await.unwrap();
        svc.search(request.clone()).await.unwrap();
        assert_eq!(processing.embed_calls(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        svc.search(request).await.unwrap();
        assert_eq!(processing.embed_calls(), 2);
    }

    #[tokio::test]
    async fn disabling_the_cache_always_embeds() {
        let processing = Arc::new(MockProcessingClient::new());
        let repo = seeded_repo().await;
        let svc = service(&processing, &repo, SearchOptions::default());

        let request = SearchRequest::new("c1", "alpha").without_cache();
        svc.search(request.clone()).await.unwrap();
        svc.search(request).await.unwrap();
        assert_eq!(processing.embed_calls(), 2);
    }

    #[tokio::test]
    async fn min_score_drops_weak_hits() {
        let processing = Arc::new(MockProcessingClient::new());
        let repo = seeded_repo().await;
        let svc = service(&processing, &repo, SearchOptions::default());

        let all = svc.search(SearchRequest::new("c1", "alpha")).await.unwrap();
        assert_eq!(all.len(), 2);
        let best_score = all.first().unwrap().score;

        let strict = svc
            .search(SearchRequest::new("c1", "alpha").with_min_score(best_score))
            .await
            .unwrap();
        assert_eq!(strict.len(), 1);
    }

    #[tokio::test]
    async fn results_are_enriched_with_filename_and_collection() {
        let processing = Arc::new(MockProcessingClient::new());
        let repo = seeded_repo().await;
        let svc = service(&processing, &repo, SearchOptions::default());

        let results = svc.search(SearchRequest::new("c1", "alpha")).await.unwrap();
        let top = results.first().unwrap();
        assert_eq!(top.filename.as_deref(), Some("a.pdf"));
        assert_eq!(top.collection, "c1");
    }

    #[tokio::test]
    async fn different_filters_use_different_cache_slots() {
        let processing = Arc::new(MockProcessingClient::new());
        let repo = seeded_repo().await;
        let svc = service(&processing, &repo, SearchOptions::default());

        svc.search(SearchRequest::new("c1", "alpha")).await.unwrap();
        svc.search(
            SearchRequest::new("c1", "alpha")
                .with_filter(HashMap::from([("document_id".to_string(), json!("d1"))])),
        )
        .await
        .unwrap();
        assert_eq!(processing.embed_calls(), 2);
    }
}
