//! Domain models for registered documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{RegistryError, RegistryResult};

/// Lifecycle status of a registered document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Deleted,
}

impl DocumentStatus {
    /// All statuses, used for index scans.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
        Self::Deleted,
    ];
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "deleted" => Ok(Self::Deleted),
            _ => Err(format!("Invalid document status: {s}")),
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        };
        write!(f, "{status}")
    }
}

/// Processing configuration carried by a document through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingOptions {
    /// Chunking strategy name understood by the processing service
    pub chunking_strategy: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Ask the processing service for LLM-extracted chunk metadata
    pub extract_metadata: bool,
    /// Number of synthetic questions per chunk when extracting metadata
    pub num_questions: u32,
    /// Page cap for parsing; 0 means unlimited
    pub max_pages: u32,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            chunking_strategy: "sentence".to_string(),
            chunk_size: 512,
            chunk_overlap: 50,
            extract_metadata: false,
            num_questions: 0,
            max_pages: 0,
        }
    }
}

/// A registered document and its ingestion state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub collection: String,
    pub file_size: u64,
    pub chunk_count: usize,
    pub status: DocumentStatus,
    pub stored_in_vector_db: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processing: ProcessingOptions,
    /// Opaque metadata from parsing (title, author, page count, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Document {
    /// Create a pending document ready for registration.
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            filename: filename.into(),
            collection: collection.into(),
            file_size: 0,
            chunk_count: 0,
            status: DocumentStatus::Pending,
            stored_in_vector_db: false,
            created_at: now,
            updated_at: now,
            processing: ProcessingOptions::default(),
            metadata: None,
        }
    }

    /// Validate the document invariants.
    ///
    /// # Errors
    /// Returns `RegistryError::Invalid` naming the first offending field.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.id.trim().is_empty() {
            return Err(RegistryError::invalid("id", "must not be empty"));
        }
        if self.filename.trim().is_empty() {
            return Err(RegistryError::invalid("filename", "must not be empty"));
        }
        if self.collection.trim().is_empty() {
            return Err(RegistryError::invalid("collection", "must not be empty"));
        }
        Ok(())
    }
}

/// Partial update of the whitelisted document fields
///
/// Absent fields are left untouched; the registry re-validates the patched
/// document and moves index memberships when collection or status change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub filename: Option<String>,
    pub collection: Option<String>,
    pub status: Option<DocumentStatus>,
    pub file_size: Option<u64>,
    pub chunk_count: Option<usize>,
    pub stored_in_vector_db: Option<bool>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn chunk_count(mut self, count: usize) -> Self {
        self.chunk_count = Some(count);
        self
    }

    pub fn stored_in_vector_db(mut self, stored: bool) -> Self {
        self.stored_in_vector_db = Some(stored);
        self
    }

    pub fn metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Apply this patch to a document, bumping `updated_at`.
    pub fn apply(self, doc: &mut Document) {
        if let Some(filename) = self.filename {
            doc.filename = filename;
        }
        if let Some(collection) = self.collection {
            doc.collection = collection;
        }
        if let Some(status) = self.status {
            doc.status = status;
        }
        if let Some(file_size) = self.file_size {
            doc.file_size = file_size;
        }
        if let Some(chunk_count) = self.chunk_count {
            doc.chunk_count = chunk_count;
        }
        if let Some(stored) = self.stored_in_vector_db {
            doc.stored_in_vector_db = stored;
        }
        if let Some(metadata) = self.metadata {
            doc.metadata = Some(metadata);
        }
        doc.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in DocumentStatus::ALL {
            let parsed: DocumentStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("bogus".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn new_document_is_pending_and_valid() {
        let doc = Document::new("d1", "a.pdf", "c1");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(!doc.stored_in_vector_db);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn empty_fields_fail_validation() {
        let mut doc = Document::new("d1", "a.pdf", "c1");
        doc.filename = String::new();
        assert!(matches!(
            doc.validate(),
            Err(RegistryError::Invalid { field, .. }) if field == "filename"
        ));
    }

    #[test]
    fn patch_moves_status_and_bumps_updated_at() {
        let mut doc = Document::new("d1", "a.pdf", "c1");
        let before = doc.updated_at;
        let patch = DocumentPatch::new()
            .status(DocumentStatus::Completed)
            .chunk_count(3)
            .stored_in_vector_db(true);
        patch.apply(&mut doc);
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(doc.chunk_count, 3);
        assert!(doc.stored_in_vector_db);
        assert!(doc.updated_at >= before);
    }
}
