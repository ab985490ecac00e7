//! Search request/response types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A search request from the adapter layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub collection: String,
    /// Values <= 0 fall back to the configured default; values above the
    /// configured maximum are rejected
    #[serde(default)]
    pub top_k: i64,
    /// Exact-equality predicate over chunk metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<HashMap<String, serde_json::Value>>,
    /// Drop hits scoring below this threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

const fn default_use_cache() -> bool {
    true
}

impl SearchRequest {
    pub fn new(collection: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            collection: collection.into(),
            top_k: 0,
            filter: None,
            min_score: None,
            use_cache: true,
        }
    }

    pub const fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: HashMap<String, serde_json::Value>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub const fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub const fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

/// A ranked, enriched search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchMatch {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub score: f32,
    pub distance: f32,
    /// From chunk metadata, when the ingest recorded it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub collection: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Tuning for the search service and its cache
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub default_top_k: usize,
    pub max_top_k: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            cache_ttl: Duration::from_secs(300),
            default_top_k: 10,
            max_top_k: 100,
        }
    }
}
