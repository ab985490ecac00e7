//! Document delete cascade
//!
//! Deleting a document removes its chunks from the vector store, marks the
//! registry record `deleted` (the record itself is reaped later by
//! `cleanup`), and cancels any non-terminal job still referencing the
//! document. Terminal jobs are left alone as history.

use std::sync::Arc;

use docflow_jobs::{Job, JobQueue, JobStatus, JobStore};
use docflow_registry::{DocumentPatch, DocumentRegistry, DocumentStatus};
use docflow_vector_data::VectorRepository;

use crate::error::IngestionResult;

/// What the cascade touched
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeleteOutcome {
    pub document_id: String,
    pub chunks_deleted: usize,
    pub jobs_cancelled: usize,
}

fn references_document(job: &Job, document_id: &str) -> bool {
    job.payload
        .get("document_id")
        .and_then(|v| v.as_str())
        .is_some_and(|id| id == document_id)
}

/// Cancel one job, walking retrying jobs through queued first since
/// `retrying` has no direct edge to `cancelled`. Drops the queue entry
/// best-effort and returns the cancelled job.
///
/// # Errors
/// Job store failures and illegal transitions (e.g. the job is already
/// terminal) propagate.
pub async fn cancel_job(
    store: &Arc<dyn JobStore>,
    queue: &Arc<dyn JobQueue>,
    job_id: &str,
    message: &str,
) -> IngestionResult<Job> {
    let job = store.get(job_id).await?;
    if job.status == JobStatus::Retrying {
        store
            .update_status(job_id, JobStatus::Queued, None, None)
            .await?;
    }
    let cancelled = store
        .update_status(job_id, JobStatus::Cancelled, None, Some(message))
        .await?;
    if let Err(e) = queue.remove(&cancelled).await {
        tracing::warn!(job_id, error = %e, "Could not drop cancelled job from queue");
    }
    Ok(cancelled)
}

/// Run the delete cascade for one document.
///
/// # Errors
/// Registry and vector-store failures propagate; job cancellation is
/// best-effort and only logged.
#[tracing::instrument(skip(registry, vector_repo, store, queue))]
pub async fn delete_document(
    registry: &Arc<dyn DocumentRegistry>,
    vector_repo: &Arc<dyn VectorRepository>,
    store: &Arc<dyn JobStore>,
    queue: &Arc<dyn JobQueue>,
    document_id: &str,
) -> IngestionResult<DeleteOutcome> {
    let doc = registry.get(document_id).await?;

    let chunks_deleted = vector_repo
        .delete_document(&doc.collection, document_id)
        .await?;

    let mut jobs_cancelled = 0usize;
    for job in store.get_active().await? {
        if !references_document(&job, document_id) {
            continue;
        }
        match cancel_job(store, queue, &job.id, "Document deleted").await {
            Ok(_) => jobs_cancelled = jobs_cancelled.saturating_add(1),
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Could not cancel job");
            }
        }
    }

    registry
        .update(
            document_id,
            DocumentPatch::new()
                .status(DocumentStatus::Deleted)
                .stored_in_vector_db(false),
        )
        .await?;

    tracing::info!(document_id, chunks_deleted, jobs_cancelled, "Document deleted");
    Ok(DeleteOutcome {
        document_id: document_id.to_string(),
        chunks_deleted,
        jobs_cancelled,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use docflow_common::CorrelationId;
    use docflow_jobs::{InMemoryJobQueue, JobType, MockJobStore};
    use docflow_registry::{Document, MockDocumentRegistry};
    use docflow_vector_data::{DocumentChunk, MockVectorRepository, chunk_id};
    use std::collections::HashMap;

    async fn seeded() -> (
        Arc<dyn DocumentRegistry>,
        Arc<dyn VectorRepository>,
        Arc<dyn JobStore>,
        Arc<dyn JobQueue>,
        Arc<MockJobStore>,
    ) {
        let registry = Arc::new(MockDocumentRegistry::new());
        let vector_repo = Arc::new(MockVectorRepository::new());
        let mock_store = Arc::new(MockJobStore::new());
        let store = Arc::clone(&mock_store) as Arc<dyn JobStore>;
        let queue = Arc::new(InMemoryJobQueue::new(Arc::clone(&store))) as Arc<dyn JobQueue>;

        registry.register(Document::new("d1", "a.pdf", "c1")).await.unwrap();

        let correlation_id = CorrelationId::new();
        vector_repo.create_collection("c1").await.unwrap();
        vector_repo
            .store_chunks(
                "c1",
                &[
                    DocumentChunk {
                        id: chunk_id("d1", 0),
                        document_id: "d1".to_string(),
                        index: 0,
                        text: "x".to_string(),
                        embedding: vec![1.0, 0.0],
                        metadata: HashMap::new(),
                    },
                    DocumentChunk {
                        id: chunk_id("d1", 1),
                        document_id: "d1".to_string(),
                        index: 1,
                        text: "y".to_string(),
                        embedding: vec![0.0, 1.0],
                        metadata: HashMap::new(),
                    },
                ],
                &correlation_id,
            )
            .await
            .unwrap();

        (
            registry as Arc<dyn DocumentRegistry>,
            vector_repo as Arc<dyn VectorRepository>,
            store,
            queue,
            mock_store,
        )
    }

    fn upload_job_for(document_id: &str) -> Job {
        Job::new(
            JobType::DocumentUpload,
            HashMap::from([(
                "document_id".to_string(),
                serde_json::Value::String(document_id.to_string()),
            )]),
        )
    }

    #[tokio::test]
    async fn cascade_deletes_chunks_and_marks_document_deleted() {
        let (registry, vector_repo, store, queue, _mock) = seeded().await;

        let outcome = delete_document(&registry, &vector_repo, &store, &queue, "d1")
            .await
            .unwrap();
        assert_eq!(outcome.chunks_deleted, 2);

        let doc = registry.get("d1").await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Deleted);
        assert!(!doc.stored_in_vector_db);
        assert!(vector_repo.list_documents("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn active_jobs_are_cancelled_but_terminal_jobs_survive() {
        let (registry, vector_repo, store, queue, mock) = seeded().await;

        // Queued job for d1: should be cancelled
        let queued = mock.create(upload_job_for("d1")).await.unwrap();
        queue.enqueue(&queued).await.unwrap();

        // Completed job for d1: history, must remain untouched
        let done = mock.create(upload_job_for("d1")).await.unwrap();
        mock.update_status(&done.id, JobStatus::Queued, None, None).await.unwrap();
        mock.update_status(&done.id, JobStatus::Processing, None, None).await.unwrap();
        mock.update_status(&done.id, JobStatus::Completed, None, None).await.unwrap();

        // Active job for another document: unrelated
        let other = mock.create(upload_job_for("d2")).await.unwrap();
        queue.enqueue(&other).await.unwrap();

        let outcome = delete_document(&registry, &vector_repo, &store, &queue, "d1")
            .await
            .unwrap();
        assert_eq!(outcome.jobs_cancelled, 1);

        assert_eq!(mock.get(&queued.id).await.unwrap().status, JobStatus::Cancelled);
        assert_eq!(mock.get(&done.id).await.unwrap().status, JobStatus::Completed);
        assert_eq!(mock.get(&other.id).await.unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn cancel_job_handles_retrying_jobs_directly() {
        let (_registry, _vector_repo, store, queue, mock) = seeded().await;

        let job = mock.create(upload_job_for("d1")).await.unwrap();
        mock.update_status(&job.id, JobStatus::Queued, None, None).await.unwrap();
        mock.update_status(&job.id, JobStatus::Processing, None, None).await.unwrap();
        mock.update_status(&job.id, JobStatus::Retrying, None, None).await.unwrap();

        let cancelled = cancel_job(&store, &queue, &job.id, "Cancelled by user")
            .await
            .unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert_eq!(cancelled.message, "Cancelled by user");
        assert!(cancelled.completed_at.is_some());
    }

    #[tokio::test]
    async fn cancel_job_rejects_terminal_jobs() {
        let (_registry, _vector_repo, store, queue, mock) = seeded().await;

        let job = mock.create(upload_job_for("d1")).await.unwrap();
        mock.update_status(&job.id, JobStatus::Queued, None, None).await.unwrap();
        mock.update_status(&job.id, JobStatus::Processing, None, None).await.unwrap();
        mock.update_status(&job.id, JobStatus::Completed, None, None).await.unwrap();

        let err = cancel_job(&store, &queue, &job.id, "too late").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::IngestionError::Job(docflow_jobs::JobError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn retrying_jobs_are_walked_through_queued_to_cancelled() {
        let (registry, vector_repo, store, queue, mock) = seeded().await;

        let job = mock.create(upload_job_for("d1")).await.unwrap();
        mock.update_status(&job.id, JobStatus::Queued, None, None).await.unwrap();
        mock.update_status(&job.id, JobStatus::Processing, None, None).await.unwrap();
        mock.update_status(&job.id, JobStatus::Retrying, None, None).await.unwrap();

        delete_document(&registry, &vector_repo, &store, &queue, "d1")
            .await
            .unwrap();
        assert_eq!(mock.get(&job.id).await.unwrap().status, JobStatus::Cancelled);
    }
}
