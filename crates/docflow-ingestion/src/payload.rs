//! Upload job payload

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use docflow_processing::ChunkingStrategy;
use docflow_registry::ProcessingOptions;

use crate::error::PipelineError;

/// Parsed `document_upload` payload
///
/// The adapter writes this map into the job; the worker parses it back
/// before running the pipeline. A payload that fails to parse is
/// structurally broken and dead-letters the job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadPayload {
    pub document_id: String,
    pub filename: String,
    pub file_path: String,
    #[serde(default)]
    pub file_size: u64,
    pub collection: String,
    #[serde(default = "default_strategy")]
    pub chunking_strategy: ChunkingStrategy,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub extract_metadata: bool,
    #[serde(default)]
    pub num_questions: u32,
    #[serde(default)]
    pub max_pages: u32,
}

const fn default_strategy() -> ChunkingStrategy {
    ChunkingStrategy::Sentence
}

const fn default_chunk_size() -> usize {
    512
}

const fn default_chunk_overlap() -> usize {
    50
}

impl UploadPayload {
    /// Parse the opaque job payload map.
    ///
    /// # Errors
    /// `PipelineError::Payload` when required fields (document_id, filename,
    /// file_path, collection) are missing, empty, or of the wrong type.
    pub fn from_job_payload(
        payload: &HashMap<String, serde_json::Value>,
    ) -> Result<Self, PipelineError> {
        let value = serde_json::Value::Object(
            payload
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        let parsed: Self =
            serde_json::from_value(value).map_err(|e| PipelineError::payload(e.to_string()))?;

        for (field, value) in [
            ("document_id", &parsed.document_id),
            ("filename", &parsed.filename),
            ("file_path", &parsed.file_path),
            ("collection", &parsed.collection),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::payload(format!("{field} must not be empty")));
            }
        }
        Ok(parsed)
    }

    /// Serialize into the opaque job payload map (adapter side).
    ///
    /// # Panics
    /// Never panics; the type serializes to a JSON object by construction.
    pub fn to_job_payload(&self) -> HashMap<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => HashMap::new(),
        }
    }

    /// Processing options for the registered document record.
    pub fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions {
            chunking_strategy: self.chunking_strategy.to_string(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            extract_metadata: self.extract_metadata,
            num_questions: self.num_questions,
            max_pages: self.max_pages,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_payload() -> HashMap<String, serde_json::Value> {
        HashMap::from([
            ("document_id".to_string(), json!("d1")),
            ("filename".to_string(), json!("a.pdf")),
            ("file_path".to_string(), json!("/tmp/a.pdf")),
            ("file_size".to_string(), json!(1024)),
            ("collection".to_string(), json!("c1")),
            ("chunking_strategy".to_string(), json!("sentence")),
            ("chunk_size".to_string(), json!(512)),
            ("chunk_overlap".to_string(), json!(50)),
            ("extract_metadata".to_string(), json!(false)),
            ("num_questions".to_string(), json!(0)),
            ("max_pages".to_string(), json!(0)),
        ])
    }

    #[test]
    fn full_payload_parses() {
        let parsed = UploadPayload::from_job_payload(&full_payload()).unwrap();
        assert_eq!(parsed.document_id, "d1");
        assert_eq!(parsed.chunking_strategy, ChunkingStrategy::Sentence);
        assert_eq!(parsed.chunk_size, 512);
    }

    #[test]
    fn missing_file_path_is_a_payload_error() {
        let mut payload = full_payload();
        payload.remove("file_path");
        let err = UploadPayload::from_job_payload(&payload).unwrap_err();
        assert!(matches!(err, PipelineError::Payload { .. }));
        assert!(err.is_permanent());
    }

    #[test]
    fn empty_collection_is_a_payload_error() {
        let mut payload = full_payload();
        payload.insert("collection".to_string(), json!(""));
        assert!(UploadPayload::from_job_payload(&payload).is_err());
    }

    #[test]
    fn optional_fields_take_defaults() {
        let payload = HashMap::from([
            ("document_id".to_string(), json!("d1")),
            ("filename".to_string(), json!("a.pdf")),
            ("file_path".to_string(), json!("/tmp/a.pdf")),
            ("collection".to_string(), json!("c1")),
        ]);
        let parsed = UploadPayload::from_job_payload(&payload).unwrap();
        assert_eq!(parsed.chunk_size, 512);
        assert_eq!(parsed.chunk_overlap, 50);
        assert!(!parsed.extract_metadata);
        assert_eq!(parsed.max_pages, 0);
    }

    #[test]
    fn round_trips_through_the_job_payload_map() {
        let parsed = UploadPayload::from_job_payload(&full_payload()).unwrap();
        let reparsed = UploadPayload::from_job_payload(&parsed.to_job_payload()).unwrap();
        assert_eq!(parsed, reparsed);
    }
}
