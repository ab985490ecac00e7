//! Chunk and collection models for the vector store

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{VectorDataError, VectorDataResult};

// Collection names: 3-63 chars of [A-Za-z0-9_-]
#[allow(clippy::unwrap_used)] // literal pattern, checked by tests
static COLLECTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,63}$").unwrap());

/// Build the deterministic chunk id for a document ordinal.
pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{document_id}-chunk-{index}")
}

/// An embedded slice of a document, the unit of vector search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// `{document_id}-chunk-{index}`
    pub id: String,
    pub document_id: String,
    pub index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
    /// Carries document_id, filename, chunk_index, total_chunks, and any
    /// extracted metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl DocumentChunk {
    /// Deterministic point id for the backend: UUIDv5 of the chunk id, so
    /// re-storing the same chunk is an upsert, not a duplicate.
    pub fn point_id(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.id.as_bytes())
    }
}

/// Chunk data returned from paginated retrieval (no embedding)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub document_id: String,
    pub index: usize,
    pub text: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A ranked search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    /// Cosine distance to the query
    pub distance: f32,
    /// `1 - distance`
    pub score: f32,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Statistics for one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub vector_count: usize,
    pub dimension: usize,
}

/// Per-document chunk count within a collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSummary {
    pub document_id: String,
    pub chunk_count: usize,
}

/// Validate a collection name: 3-63 characters of `[A-Za-z0-9_-]`.
///
/// # Errors
/// Returns `VectorDataError::InvalidCollectionName` with the reason.
pub fn validate_collection_name(name: &str) -> VectorDataResult<()> {
    if name.is_empty() {
        return Err(VectorDataError::InvalidCollectionName {
            name: name.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if !COLLECTION_NAME.is_match(name) {
        return Err(VectorDataError::InvalidCollectionName {
            name: name.to_string(),
            reason: "must be 3-63 characters of [A-Za-z0-9_-]".to_string(),
        });
    }
    Ok(())
}

/// Flatten metadata for the vector backend, which accepts only scalar
/// payload values: arrays and nested maps are serialized to JSON strings,
/// scalars pass through.
pub fn flatten_metadata(
    metadata: &HashMap<String, serde_json::Value>,
) -> HashMap<String, serde_json::Value> {
    metadata
        .iter()
        .map(|(key, value)| {
            let flat = match value {
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    serde_json::Value::String(value.to_string())
                }
                scalar => scalar.clone(),
            };
            (key.clone(), flat)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chunk_ids_are_deterministic() {
        assert_eq!(chunk_id("d1", 0), "d1-chunk-0");
        assert_eq!(chunk_id("d1", 12), "d1-chunk-12");
    }

    #[test]
    fn point_ids_are_stable_across_instances() {
        let a = DocumentChunk {
            id: chunk_id("d1", 0),
            document_id: "d1".to_string(),
            index: 0,
            text: "x".to_string(),
            embedding: vec![0.1],
            metadata: HashMap::new(),
        };
        let mut b = a.clone();
        b.text = "different text, same identity".to_string();
        assert_eq!(a.point_id(), b.point_id());
    }

    #[test]
    fn collection_names_follow_the_charset_and_length_rules() {
        assert!(validate_collection_name("my-docs_01").is_ok());
        assert!(validate_collection_name("abc").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("ab").is_err());
        assert!(validate_collection_name("has space").is_err());
        assert!(validate_collection_name("dots.bad").is_err());
        assert!(validate_collection_name(&"x".repeat(64)).is_err());
    }

    #[test]
    fn flatten_serializes_arrays_and_maps_to_json_strings() {
        let meta = HashMap::from([
            ("keywords".to_string(), json!(["a", "b"])),
            ("nested".to_string(), json!({"k": 1})),
            ("title".to_string(), json!("intro")),
            ("pages".to_string(), json!(3)),
        ]);
        let flat = flatten_metadata(&meta);
        assert_eq!(flat.get("title"), Some(&json!("intro")));
        assert_eq!(flat.get("pages"), Some(&json!(3)));
        assert_eq!(flat.get("keywords"), Some(&json!("[\"a\",\"b\"]")));
        assert_eq!(flat.get("nested"), Some(&json!("{\"k\":1}")));
    }
}
