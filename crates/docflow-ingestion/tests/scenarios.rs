//! End-to-end ingestion scenarios against in-memory backends
//!
//! The real worker and pipeline run here; only the edges (registry, job
//! store, queue, vector store, processing service) are in-memory doubles.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use docflow_config::WorkerConfig;
use docflow_ingestion::{IngestionPipeline, UploadPayload, UploadWorker, Worker};
use docflow_jobs::{InMemoryJobQueue, Job, JobQueue, JobStatus, JobStore, JobType, MockJobStore};
use docflow_processing::{
    ChunkRequest, ChunkedText, EmbedScript, MockProcessingClient, ParseRequest, ParsedDocument,
    ProcessingClient, ProcessingResult,
};
use docflow_registry::{DocumentRegistry, DocumentStatus, MockDocumentRegistry};
use docflow_vector_data::{MockVectorRepository, VectorRepository};

struct TestEnv {
    registry: Arc<MockDocumentRegistry>,
    vector_repo: Arc<MockVectorRepository>,
    processing: Arc<MockProcessingClient>,
    store: Arc<MockJobStore>,
    queue: Arc<InMemoryJobQueue>,
    worker: Arc<UploadWorker>,
    _upload_dir: tempfile::TempDir,
    upload_path: std::path::PathBuf,
}

fn worker_config(concurrency: usize) -> WorkerConfig {
    WorkerConfig {
        name: "test-upload-worker".to_string(),
        concurrency,
        poll_interval_ms: 10,
        shutdown_timeout_seconds: 5,
        max_retries: 3,
        retry_delay_ms: 10,
        enable_recovery: true,
    }
}

fn build_env(processing: Arc<dyn ProcessingClient>, concurrency: usize) -> TestEnv {
    let registry = Arc::new(MockDocumentRegistry::new());
    let vector_repo = Arc::new(MockVectorRepository::new());
    let mock_processing = Arc::new(MockProcessingClient::new());
    let store = Arc::new(MockJobStore::new());
    let queue = Arc::new(InMemoryJobQueue::new(
        Arc::clone(&store) as Arc<dyn JobStore>
    ));

    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&registry) as Arc<dyn DocumentRegistry>,
        Arc::clone(&vector_repo) as Arc<dyn VectorRepository>,
        processing,
        Arc::clone(&store) as Arc<dyn JobStore>,
    ));

    let worker = Arc::new(UploadWorker::new(
        worker_config(concurrency),
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::clone(&queue) as Arc<dyn JobQueue>,
        Arc::clone(&registry) as Arc<dyn DocumentRegistry>,
        pipeline,
    ));

    let upload_dir = tempfile::tempdir().unwrap();
    let upload_path = upload_dir.path().join("a.pdf");
    std::fs::write(&upload_path, b"raw upload bytes").unwrap();

    TestEnv {
        registry,
        vector_repo,
        processing: mock_processing,
        store,
        queue,
        worker,
        _upload_dir: upload_dir,
        upload_path,
    }
}

fn env(concurrency: usize) -> TestEnv {
    let processing = Arc::new(MockProcessingClient::new());
    let mut e = build_env(Arc::clone(&processing) as Arc<dyn ProcessingClient>, concurrency);
    e.processing = processing;
    e
}

fn upload_payload(env: &TestEnv) -> UploadPayload {
    UploadPayload {
        document_id: "d1".to_string(),
        filename: "a.pdf".to_string(),
        file_path: env.upload_path.to_string_lossy().into_owned(),
        file_size: 16,
        collection: "c1".to_string(),
        chunking_strategy: docflow_processing::ChunkingStrategy::Sentence,
        chunk_size: 512,
        chunk_overlap: 50,
        extract_metadata: false,
        num_questions: 0,
        max_pages: 0,
    }
}

async fn enqueue_upload(env: &TestEnv, payload: HashMap<String, serde_json::Value>) -> Job {
    let job = env
        .store
        .create(Job::new(JobType::DocumentUpload, payload))
        .await
        .unwrap();
    env.queue.enqueue(&job).await.unwrap();
    job
}

async fn wait_for_terminal(store: &Arc<MockJobStore>, job_id: &str) -> Job {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let job = store.get(job_id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        assert!(
            Instant::now() < deadline,
            "job {job_id} did not reach a terminal state (last: {})",
            job.status
        );
        sleep(Duration::from_millis(10)).await;
    }
}

// S1: a clean upload lands three chunks, completes the job, and finalizes
// the document record.
#[tokio::test]
async fn happy_path_ingest() {
    let env = env(1);
    env.processing.set_parse_text("x");
    env.processing.set_chunks(&["x1", "x2", "x3"]);

    env.worker.start().await.unwrap();
    let job = enqueue_upload(&env, upload_payload(&env).to_job_payload()).await;

    let finished = wait_for_terminal(&env.store, &job.id).await;
    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.progress, 100);
    assert_eq!(finished.message, "Upload completed successfully");
    assert_eq!(finished.result.get("chunk_count"), Some(&serde_json::json!(3)));
    assert_eq!(finished.result.get("success"), Some(&serde_json::json!(true)));
    assert_eq!(
        finished.worker_id.as_deref(),
        Some("test-upload-worker")
    );
    assert!(finished.started_at.is_some());
    assert!(finished.completed_at.is_some());

    let doc = env.registry.get("d1").await.unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert!(doc.stored_in_vector_db);
    assert_eq!(doc.chunk_count, 3);

    let chunks = env.vector_repo.chunks("c1");
    let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["d1-chunk-0", "d1-chunk-1", "d1-chunk-2"]);

    env.worker.stop(Duration::from_secs(5)).await.unwrap();

    let stats = env.worker.stats();
    assert_eq!(stats.jobs_processed, 1);
    assert_eq!(stats.jobs_succeeded, 1);
    assert_eq!(stats.jobs_failed, 0);
}

// S2: the embedder returns the wrong cardinality once; the job retries once
// and then completes.
#[tokio::test]
async fn embedding_mismatch_retries_once_then_completes() {
    let env = env(1);
    env.processing.set_parse_text("x");
    env.processing.set_chunks(&["x1", "x2", "x3"]);
    env.processing.push_embed_script(EmbedScript::Vectors(2));

    env.worker.start().await.unwrap();
    let job = enqueue_upload(&env, upload_payload(&env).to_job_payload()).await;

    let finished = wait_for_terminal(&env.store, &job.id).await;
    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.retry_count, 1);
    assert_eq!(env.processing.embed_calls(), 2);

    let doc = env.registry.get("d1").await.unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert_eq!(doc.chunk_count, 3);

    env.worker.stop(Duration::from_secs(5)).await.unwrap();
}

// S3: a payload without file_path is structurally broken: the job fails
// immediately, skips the retry path, and leaves the queue empty.
#[tokio::test]
async fn missing_file_path_dead_letters_without_retry() {
    let env = env(1);
    env.worker.start().await.unwrap();

    let payload = HashMap::from([
        ("document_id".to_string(), serde_json::json!("d1")),
        ("filename".to_string(), serde_json::json!("a.pdf")),
        ("collection".to_string(), serde_json::json!("c1")),
    ]);
    let job = enqueue_upload(&env, payload).await;

    let finished = wait_for_terminal(&env.store, &job.id).await;
    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.retry_count, 0, "dead-letter path must bypass retry");
    assert!(finished.error.unwrap().contains("file_path"));

    // No processing was attempted and no document row appeared
    assert_eq!(env.processing.parse_calls(), 0);
    assert!(env.registry.is_empty());
    assert_eq!(
        env.queue.queue_length(JobType::DocumentUpload).await.unwrap(),
        0
    );

    env.worker.stop(Duration::from_secs(5)).await.unwrap();
}

// S3 variant: the document row already exists, so dead-lettering patches it
// to failed.
#[tokio::test]
async fn dead_letter_marks_existing_document_failed() {
    let env = env(1);
    env.registry
        .register(docflow_registry::Document::new("d1", "a.pdf", "c1"))
        .await
        .unwrap();

    env.worker.start().await.unwrap();
    let mut payload = upload_payload(&env);
    payload.file_path = "/nonexistent/docflow/spool/a.pdf".to_string();
    let job = enqueue_upload(&env, payload.to_job_payload()).await;

    let finished = wait_for_terminal(&env.store, &job.id).await;
    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.retry_count, 0);

    let doc = env.registry.get("d1").await.unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);

    env.worker.stop(Duration::from_secs(5)).await.unwrap();
}

// S4: strict priority order across mixed enqueues.
#[tokio::test]
async fn priority_ordering_across_dequeues() {
    let env = env(1);
    let mut ids = Vec::new();
    for priority in [1_i64, 10, 5] {
        let job = env
            .store
            .create(Job::new(JobType::DocumentUpload, HashMap::new()).with_priority(priority))
            .await
            .unwrap();
        env.queue.enqueue(&job).await.unwrap();
        ids.push((priority, job.id));
    }

    let mut order = Vec::new();
    while let Some(job) = env.queue.dequeue(JobType::DocumentUpload, "w").await.unwrap() {
        order.push(job.priority);
    }
    assert_eq!(order, vec![10, 5, 1]);
}

// S6: one job, two concurrent poll loops; exactly one processes it.
#[tokio::test]
async fn concurrent_slots_process_each_job_exactly_once() {
    let env = env(2);
    env.processing.set_chunks(&["x1", "x2"]);

    env.worker.start().await.unwrap();
    let job = enqueue_upload(&env, upload_payload(&env).to_job_payload()).await;

    let finished = wait_for_terminal(&env.store, &job.id).await;
    assert_eq!(finished.status, JobStatus::Completed);

    // Give the second slot time to observe the (empty) queue
    sleep(Duration::from_millis(50)).await;
    env.worker.stop(Duration::from_secs(5)).await.unwrap();

    let stats = env.worker.stats();
    assert_eq!(stats.jobs_processed, 1, "exactly one slot may claim the job");
    assert_eq!(env.vector_repo.chunks("c1").len(), 2);
}

// Retries exhaust after max_retries transient failures and the document is
// marked failed.
#[tokio::test]
async fn transient_failures_exhaust_retries_into_terminal_failed() {
    let env = env(1);
    env.processing.set_parse_text("x");
    env.processing.set_chunks(&["x1"]);
    // Initial attempt + 3 retries, all mismatched
    for _ in 0..4 {
        env.processing.push_embed_script(EmbedScript::Vectors(0));
    }

    env.worker.start().await.unwrap();
    let job = enqueue_upload(&env, upload_payload(&env).to_job_payload()).await;

    let finished = wait_for_terminal(&env.store, &job.id).await;
    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.retry_count, 4);
    assert!(finished.message.contains("Failed permanently"));

    let doc = env.registry.get("d1").await.unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);

    env.worker.stop(Duration::from_secs(5)).await.unwrap();
    assert_eq!(env.worker.stats().jobs_failed, 4);
}

/// Processing client whose first parse call panics, then delegates.
struct PanicOnceClient {
    inner: MockProcessingClient,
    panicked: std::sync::atomic::AtomicBool,
}

#[async_trait::async_trait]
impl ProcessingClient for PanicOnceClient {
    async fn parse(&self, request: ParseRequest) -> ProcessingResult<ParsedDocument> {
        if !self.panicked.swap(true, std::sync::atomic::Ordering::SeqCst) {
            panic!("parser exploded");
        }
        self.inner.parse(request).await
    }

    async fn chunk(&self, request: ChunkRequest) -> ProcessingResult<ChunkedText> {
        self.inner.chunk(request).await
    }

    async fn embed(&self, texts: &[String]) -> ProcessingResult<Vec<Vec<f32>>> {
        self.inner.embed(texts).await
    }
}

// A panic inside the pipeline is converted to a single failure; the poll
// loop survives and the retry completes the job.
#[tokio::test]
async fn pipeline_panic_is_recovered_and_retried() {
    let inner = MockProcessingClient::new();
    inner.set_chunks(&["x1", "x2"]);
    let panicking = Arc::new(PanicOnceClient {
        inner,
        panicked: std::sync::atomic::AtomicBool::new(false),
    });
    let env = build_env(panicking as Arc<dyn ProcessingClient>, 1);

    env.worker.start().await.unwrap();
    let job = enqueue_upload(&env, upload_payload(&env).to_job_payload()).await;

    let finished = wait_for_terminal(&env.store, &job.id).await;
    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.retry_count, 1);
    assert!(env.worker.is_running(), "a panic must not kill the poll loop");

    env.worker.stop(Duration::from_secs(5)).await.unwrap();
}

// Stopping the pool mid-idle returns promptly and flips is_running.
#[tokio::test]
async fn worker_stops_within_timeout_when_idle() {
    let env = env(2);
    env.worker.start().await.unwrap();
    assert!(env.worker.is_running());

    env.worker.stop(Duration::from_secs(5)).await.unwrap();
    assert!(!env.worker.is_running());

    let stats = env.worker.stats();
    assert_eq!(stats.jobs_processed, 0);
    assert_eq!(stats.name, "test-upload-worker");
}
