//! Staged ingestion pipeline
//!
//! Stateless: one invocation per job attempt. Stage order is fixed
//! (register, parse, chunk, embed, persist, finalize) with advisory progress
//! milestones reported after each stage. Stages 1-3 leave no persistent
//! state; stage 4 is an upsert keyed by deterministic chunk ids, so a retry
//! after a partial failure re-stores the same points instead of duplicating
//! them. Removal of the spooled upload file is best-effort and the only
//! non-idempotent step.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use docflow_common::CorrelationId;
use docflow_jobs::JobStore;
use docflow_processing::{ChunkRequest, ParseRequest, ProcessingClient};
use docflow_registry::{Document, DocumentPatch, DocumentRegistry, DocumentStatus, RegistryError};
use docflow_vector_data::{DocumentChunk, VectorRepository, chunk_id};

use crate::error::PipelineError;
use crate::payload::UploadPayload;

/// Progress milestones reported after each stage
const PROGRESS_REGISTERED: u8 = 5;
const PROGRESS_PARSED: u8 = 20;
const PROGRESS_CHUNKED: u8 = 50;
const PROGRESS_EMBEDDED: u8 = 70;
const PROGRESS_PERSISTED: u8 = 85;
const PROGRESS_FINALIZED: u8 = 100;

/// Result of a successful pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub document_id: String,
    pub chunk_count: usize,
    pub collection: String,
}

/// The staged document ingestion pipeline
pub struct IngestionPipeline {
    registry: Arc<dyn DocumentRegistry>,
    vector_repo: Arc<dyn VectorRepository>,
    processing: Arc<dyn ProcessingClient>,
    store: Arc<dyn JobStore>,
}

impl IngestionPipeline {
    pub fn new(
        registry: Arc<dyn DocumentRegistry>,
        vector_repo: Arc<dyn VectorRepository>,
        processing: Arc<dyn ProcessingClient>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            registry,
            vector_repo,
            processing,
            store,
        }
    }

    /// Progress is advisory; a reporting failure must not fail the stage.
    async fn report_progress(&self, job_id: &str, progress: u8, message: &str) {
        if let Err(e) = self.store.set_progress(job_id, progress, message).await {
            tracing::warn!(job_id, progress, error = %e, "Progress report failed");
        }
    }

    /// Run the pipeline for one job attempt.
    ///
    /// # Errors
    /// Any stage failure surfaces as a typed [`PipelineError`]; the caller
    /// decides retry vs dead-letter from [`PipelineError::is_permanent`].
    #[tracing::instrument(skip(self, payload, cancel), fields(job_id, document_id = %payload.document_id, collection = %payload.collection))]
    pub async fn run(
        &self,
        job_id: &str,
        payload: &UploadPayload,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let correlation_id = CorrelationId::new();

        // Stage 0: register the document, tolerating a record left behind by
        // an earlier attempt.
        self.register_document(payload).await?;
        self.report_progress(job_id, PROGRESS_REGISTERED, "Document registered")
            .await;

        // Stage 1: parse. The upload file must still be spooled on disk; a
        // missing file can never succeed on retry.
        if tokio::fs::metadata(&payload.file_path).await.is_err() {
            return Err(PipelineError::MissingUploadFile {
                path: payload.file_path.clone(),
            });
        }
        let parsed = guard(cancel, self.processing.parse(ParseRequest {
            file_path: payload.file_path.clone(),
            extract_metadata: payload.extract_metadata,
            num_questions: payload.num_questions,
            max_pages: payload.max_pages,
        }))
        .await?;
        self.report_progress(job_id, PROGRESS_PARSED, "Document parsed")
            .await;

        // Stage 2: chunk
        let chunked = guard(cancel, self.processing.chunk(ChunkRequest {
            text: parsed.text,
            strategy: payload.chunking_strategy,
            chunk_size: payload.chunk_size,
            chunk_overlap: payload.chunk_overlap,
            extract_metadata: payload.extract_metadata,
            num_questions: payload.num_questions,
        }))
        .await?;
        if chunked.chunks.is_empty() {
            return Err(PipelineError::NoChunksGenerated);
        }
        self.report_progress(
            job_id,
            PROGRESS_CHUNKED,
            &format!("Split into {} chunks", chunked.chunks.len()),
        )
        .await;

        // Stage 3: embed
        let embeddings = guard(cancel, self.processing.embed(&chunked.chunks)).await?;
        if embeddings.len() != chunked.chunks.len() {
            return Err(PipelineError::EmbeddingCountMismatch {
                chunks: chunked.chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        self.report_progress(job_id, PROGRESS_EMBEDDED, "Embeddings generated")
            .await;

        // Stage 4: persist chunks, then drop the spooled file (best-effort)
        let chunks = build_chunks(payload, &chunked.chunks, embeddings, chunked.metadata);
        let chunk_count = chunks.len();

        guard(cancel, async {
            self.vector_repo
                .create_collection(&payload.collection)
                .await?;
            self.vector_repo
                .store_chunks(&payload.collection, &chunks, &correlation_id)
                .await
        })
        .await?;

        if let Err(e) = tokio::fs::remove_file(&payload.file_path).await {
            tracing::warn!(
                file_path = %payload.file_path,
                error = %e,
                "Failed to remove upload file"
            );
        }
        self.report_progress(job_id, PROGRESS_PERSISTED, "Chunks stored")
            .await;

        // Stage 5: finalize the registry record
        let mut patch = DocumentPatch::new()
            .status(DocumentStatus::Completed)
            .chunk_count(chunk_count)
            .stored_in_vector_db(true);
        if let Some(metadata) = parsed.metadata {
            patch = patch.metadata(metadata);
        }
        self.registry.update(&payload.document_id, patch).await?;
        self.report_progress(job_id, PROGRESS_FINALIZED, "Ingestion complete")
            .await;

        tracing::info!(
            correlation_id = %correlation_id,
            document_id = %payload.document_id,
            chunk_count,
            "Document ingested"
        );

        Ok(PipelineOutcome {
            document_id: payload.document_id.clone(),
            chunk_count,
            collection: payload.collection.clone(),
        })
    }

    /// Register the document as processing; patch an existing record instead
    /// of failing when this is a re-processing attempt.
    async fn register_document(&self, payload: &UploadPayload) -> Result<(), PipelineError> {
        let mut doc = Document::new(
            &payload.document_id,
            &payload.filename,
            &payload.collection,
        );
        doc.file_size = payload.file_size;
        doc.status = DocumentStatus::Processing;
        doc.processing = payload.processing_options();

        match self.registry.register(doc).await {
            Ok(_) => Ok(()),
            Err(RegistryError::AlreadyExists { .. }) => {
                self.registry
                    .update(
                        &payload.document_id,
                        DocumentPatch::new().status(DocumentStatus::Processing),
                    )
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Race a pipeline stage against cancellation. Biased so cancellation wins
/// when both branches are ready: a stage future that resolves on its first
/// poll must not slip past an already-cancelled token.
async fn guard<T, E>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, PipelineError>
where
    PipelineError: From<E>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(PipelineError::Cancelled),
        result = fut => result.map_err(PipelineError::from),
    }
}

/// Assemble chunk records with deterministic ids and the identity metadata
/// every chunk carries. Extracted per-chunk metadata (a prefix of the chunk
/// list, when present) is merged in; identity fields win on conflict.
fn build_chunks(
    payload: &UploadPayload,
    texts: &[String],
    embeddings: Vec<Vec<f32>>,
    extracted: Option<Vec<HashMap<String, serde_json::Value>>>,
) -> Vec<DocumentChunk> {
    let total = texts.len();
    let extracted = extracted.unwrap_or_default();

    texts
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(index, (text, embedding))| {
            let mut metadata = extracted.get(index).cloned().unwrap_or_default();
            metadata.insert(
                "document_id".to_string(),
                serde_json::Value::String(payload.document_id.clone()),
            );
            metadata.insert(
                "filename".to_string(),
                serde_json::Value::String(payload.filename.clone()),
            );
            metadata.insert("chunk_index".to_string(), serde_json::Value::from(index));
            metadata.insert("total_chunks".to_string(), serde_json::Value::from(total));

            DocumentChunk {
                id: chunk_id(&payload.document_id, index),
                document_id: payload.document_id.clone(),
                index,
                text: text.clone(),
                embedding,
                metadata,
            }
        })
        .collect()
}
