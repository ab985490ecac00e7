//! Polling upload worker
//!
//! Runs `concurrency` independent poll loops against the `document_upload`
//! queue. Each dequeued job goes through the pipeline; success and failure
//! bookkeeping happens here, not in the pipeline:
//!
//! - retryable failures refresh the job from the store, bump the retry
//!   counter, and re-enqueue after `retry_delay`, up to `max_retries`;
//! - permanent failures (malformed payload, missing upload file) dead-letter
//!   the job: terminal `failed`, queue entry dropped, one error log;
//! - with `enable_recovery` the pipeline runs in its own task so a panic is
//!   converted into a failure instead of killing the poll loop.
//!
//! The failure path itself never propagates errors; a broken Redis during
//! failure handling is logged and the loop keeps polling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use docflow_config::WorkerConfig;
use docflow_jobs::{Job, JobQueue, JobStatus, JobStore, JobType};
use docflow_registry::{DocumentPatch, DocumentRegistry, DocumentStatus};

use crate::error::{IngestionError, IngestionResult, PipelineError};
use crate::payload::UploadPayload;
use crate::pipeline::{IngestionPipeline, PipelineOutcome};
use crate::pool::Worker;

/// Point-in-time snapshot of a worker's counters
#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkerStats {
    pub name: String,
    pub is_running: bool,
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub total_process_time_ms: u64,
    pub average_process_time_ms: f64,
    pub last_job_time: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
}

#[derive(Default)]
struct StatsInner {
    jobs_processed: u64,
    jobs_succeeded: u64,
    jobs_failed: u64,
    total_process_time_ms: u64,
    last_job_time: Option<DateTime<Utc>>,
    started_at: Option<Instant>,
}

/// Everything a poll loop needs, cloneable per concurrency slot
#[derive(Clone)]
struct SlotContext {
    name: String,
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    registry: Arc<dyn DocumentRegistry>,
    pipeline: Arc<IngestionPipeline>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    stats: Arc<RwLock<StatsInner>>,
}

/// Worker for `document_upload` jobs
pub struct UploadWorker {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    registry: Arc<dyn DocumentRegistry>,
    pipeline: Arc<IngestionPipeline>,
    running: Arc<AtomicBool>,
    cancel: Mutex<CancellationToken>,
    stats: Arc<RwLock<StatsInner>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl UploadWorker {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        registry: Arc<dyn DocumentRegistry>,
        pipeline: Arc<IngestionPipeline>,
    ) -> Self {
        Self {
            config,
            store,
            queue,
            registry,
            pipeline,
            running: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(CancellationToken::new()),
            stats: Arc::new(RwLock::new(StatsInner::default())),
            handles: Mutex::new(Vec::new()),
        }
    }

    fn slot_context(&self, cancel: CancellationToken) -> SlotContext {
        SlotContext {
            name: self.config.name.clone(),
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
            registry: Arc::clone(&self.registry),
            pipeline: Arc::clone(&self.pipeline),
            running: Arc::clone(&self.running),
            cancel,
            stats: Arc::clone(&self.stats),
        }
    }
}

#[async_trait]
impl Worker for UploadWorker {
    fn name(&self) -> &str {
        &self.config.name
    }

    #[allow(clippy::unwrap_used)] // lock poisoning is unrecoverable
    async fn start(&self) -> IngestionResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(IngestionError::AlreadyRunning {
                name: self.config.name.clone(),
            });
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap() = cancel.clone();
        {
            let mut stats = self.stats.write().unwrap();
            *stats = StatsInner::default();
            stats.started_at = Some(Instant::now());
        }

        let mut handles = self.handles.lock().unwrap();
        for slot in 0..self.config.concurrency {
            let ctx = self.slot_context(cancel.clone());
            handles.push(tokio::spawn(async move {
                poll_loop(ctx, slot).await;
            }));
        }

        tracing::info!(
            worker = %self.config.name,
            concurrency = self.config.concurrency,
            "Upload worker started"
        );
        Ok(())
    }

    #[allow(clippy::unwrap_used)]
    async fn stop(&self, timeout: Duration) -> IngestionResult<()> {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.lock().unwrap().cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock().unwrap());
        let drain = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(worker = %self.config.name, error = %e, "Poll loop task failed");
                }
            }
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(()) => {
                tracing::info!(worker = %self.config.name, "Upload worker stopped");
                Ok(())
            }
            Err(_) => Err(IngestionError::ShutdownTimeout {
                name: self.config.name.clone(),
            }),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    #[allow(clippy::unwrap_used)]
    fn stats(&self) -> WorkerStats {
        let stats = self.stats.read().unwrap();
        let average = if stats.jobs_processed > 0 {
            stats.total_process_time_ms as f64 / stats.jobs_processed as f64
        } else {
            0.0
        };
        WorkerStats {
            name: self.config.name.clone(),
            is_running: self.is_running(),
            jobs_processed: stats.jobs_processed,
            jobs_succeeded: stats.jobs_succeeded,
            jobs_failed: stats.jobs_failed,
            total_process_time_ms: stats.total_process_time_ms,
            average_process_time_ms: average,
            last_job_time: stats.last_job_time,
            uptime_seconds: stats
                .started_at
                .map_or(0, |t| t.elapsed().as_secs()),
        }
    }
}

/// One poll loop; `concurrency` of these run per worker.
async fn poll_loop(ctx: SlotContext, slot: usize) {
    tracing::debug!(worker = %ctx.name, slot, "Poll loop starting");

    loop {
        if !ctx.running.load(Ordering::SeqCst) {
            break;
        }

        match ctx.queue.dequeue(JobType::DocumentUpload, &ctx.name).await {
            Ok(Some(job)) => process_job(&ctx, job).await,
            Ok(None) => {
                tokio::select! {
                    () = ctx.cancel.cancelled() => break,
                    () = sleep(ctx.config.poll_interval()) => {}
                }
            }
            Err(e) => {
                tracing::error!(worker = %ctx.name, slot, error = %e, "Dequeue failed");
                tokio::select! {
                    () = ctx.cancel.cancelled() => break,
                    () = sleep(ctx.config.poll_interval().saturating_mul(5)) => {}
                }
            }
        }
    }

    tracing::debug!(worker = %ctx.name, slot, "Poll loop stopped");
}

/// Drive one dequeued job to a terminal outcome for this attempt.
#[tracing::instrument(skip(ctx, job), fields(worker = %ctx.name, job_id = %job.id))]
async fn process_job(ctx: &SlotContext, job: Job) {
    let started = Instant::now();

    let payload = match UploadPayload::from_job_payload(&job.payload) {
        Ok(payload) => payload,
        Err(e) => {
            dead_letter(ctx, &job, None, &e).await;
            record_outcome(ctx, started, false);
            return;
        }
    };

    match run_pipeline(ctx, &job, &payload).await {
        Ok(outcome) => {
            handle_success(ctx, &job, &outcome, started).await;
            record_outcome(ctx, started, true);
        }
        Err(e) if e.is_permanent() => {
            dead_letter(ctx, &job, Some(&payload), &e).await;
            record_outcome(ctx, started, false);
        }
        Err(e) => {
            handle_failure(ctx, &job, &payload, &e).await;
            record_outcome(ctx, started, false);
        }
    }
}

/// Run the pipeline, optionally behind a panic barrier.
async fn run_pipeline(
    ctx: &SlotContext,
    job: &Job,
    payload: &UploadPayload,
) -> Result<PipelineOutcome, PipelineError> {
    if !ctx.config.enable_recovery {
        return ctx.pipeline.run(&job.id, payload, &ctx.cancel).await;
    }

    let pipeline = Arc::clone(&ctx.pipeline);
    let job_id = job.id.clone();
    let payload = payload.clone();
    let cancel = ctx.cancel.clone();

    let handle =
        tokio::spawn(async move { pipeline.run(&job_id, &payload, &cancel).await });
    match handle.await {
        Ok(result) => result,
        Err(join_err) => {
            let message = if join_err.is_panic() {
                let cause = join_err.into_panic();
                cause
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string())
            } else {
                join_err.to_string()
            };
            Err(PipelineError::WorkerPanic { message })
        }
    }
}

async fn handle_success(
    ctx: &SlotContext,
    job: &Job,
    outcome: &PipelineOutcome,
    started: Instant,
) {
    let elapsed_ms = started.elapsed().as_millis();

    if let Err(e) = ctx
        .store
        .update_status(
            &job.id,
            JobStatus::Completed,
            Some(100),
            Some("Upload completed successfully"),
        )
        .await
    {
        tracing::error!(job_id = %job.id, error = %e, "Failed to mark job completed");
    }

    let result = HashMap::from([
        (
            "document_id".to_string(),
            serde_json::Value::String(outcome.document_id.clone()),
        ),
        (
            "chunk_count".to_string(),
            serde_json::Value::from(outcome.chunk_count),
        ),
        (
            "collection".to_string(),
            serde_json::Value::String(outcome.collection.clone()),
        ),
        (
            "processing_time_ms".to_string(),
            serde_json::Value::from(elapsed_ms as u64),
        ),
        ("success".to_string(), serde_json::Value::Bool(true)),
    ]);
    if let Err(e) = ctx.store.update_result(&job.id, result).await {
        tracing::error!(job_id = %job.id, error = %e, "Failed to write job result");
    }

    tracing::info!(
        job_id = %job.id,
        document_id = %outcome.document_id,
        chunk_count = outcome.chunk_count,
        elapsed_ms = elapsed_ms as u64,
        "Upload job completed"
    );
}

/// Retryable-failure path. Refreshes the job from the store before touching
/// counters so a concurrent mutation is not clobbered. Never propagates its
/// own errors.
async fn handle_failure(ctx: &SlotContext, job: &Job, payload: &UploadPayload, error: &PipelineError) {
    let mut refreshed = match ctx.store.get(&job.id).await {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(job_id = %job.id, error = %e, "Failed to refresh job for retry decision");
            return;
        }
    };

    refreshed.retry_count = refreshed.retry_count.saturating_add(1);
    refreshed.error = Some(error.to_string());

    if refreshed.retry_count <= ctx.config.max_retries {
        refreshed.message = format!(
            "Retry {}/{} after error: {error}",
            refreshed.retry_count, ctx.config.max_retries
        );
        if let Err(e) = refreshed.transition(JobStatus::Retrying) {
            tracing::error!(job_id = %job.id, error = %e, "Job no longer retryable");
            return;
        }
        let updated = match ctx.store.update(refreshed).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to persist retry state");
                return;
            }
        };

        tracing::warn!(
            job_id = %job.id,
            retry = updated.retry_count,
            max_retries = ctx.config.max_retries,
            error = %error,
            "Upload failed, requeueing"
        );

        // Bounded backoff before the job becomes runnable again
        tokio::select! {
            () = ctx.cancel.cancelled() => {}
            () = sleep(ctx.config.retry_delay()) => {}
        }
        if let Err(e) = ctx.queue.enqueue(&updated).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to re-enqueue job");
        }
    } else {
        refreshed.message = format!(
            "Failed permanently after {} retries: {error}",
            refreshed.retry_count.saturating_sub(1)
        );
        if let Err(e) = refreshed.transition(JobStatus::Failed) {
            tracing::error!(job_id = %job.id, error = %e, "Could not mark job failed");
            return;
        }
        if let Err(e) = ctx.store.update(refreshed).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to persist terminal failure");
        }
        mark_document_failed(ctx, &payload.document_id).await;

        tracing::error!(
            job_id = %job.id,
            document_id = %payload.document_id,
            error = %error,
            "Upload failed permanently, retries exhausted"
        );
    }
}

/// Dead-letter path for structurally broken jobs and other permanent
/// failures: terminal `failed`, queue entry removed, one error log.
async fn dead_letter(
    ctx: &SlotContext,
    job: &Job,
    payload: Option<&UploadPayload>,
    error: &PipelineError,
) {
    let mut refreshed = match ctx.store.get(&job.id).await {
        Ok(job) => job,
        Err(_) => job.clone(),
    };
    refreshed.error = Some(error.to_string());
    refreshed.message = format!("Permanent failure: {error}");

    if refreshed.transition(JobStatus::Failed).is_ok() {
        if let Err(e) = ctx.store.update(refreshed.clone()).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to persist dead-letter state");
        }
    }
    if let Err(e) = ctx.queue.remove(&refreshed).await {
        tracing::error!(job_id = %job.id, error = %e, "Failed to drop dead-lettered job from queue");
    }

    // Best-effort document patch; fall back to whatever document id the raw
    // payload still carries when parsing failed.
    let document_id = payload.map_or_else(
        || {
            job.payload
                .get("document_id")
                .and_then(|v| v.as_str())
                .map(ToString::to_string)
        },
        |p| Some(p.document_id.clone()),
    );
    if let Some(document_id) = document_id {
        mark_document_failed(ctx, &document_id).await;
    }

    tracing::error!(
        job_id = %job.id,
        error = %error,
        "Job dead-lettered"
    );
}

async fn mark_document_failed(ctx: &SlotContext, document_id: &str) {
    let patch = DocumentPatch::new().status(DocumentStatus::Failed);
    match ctx.registry.update(document_id, patch).await {
        Ok(_) => {}
        Err(docflow_registry::RegistryError::NotFound { .. }) => {}
        Err(e) => {
            tracing::warn!(document_id, error = %e, "Failed to mark document failed");
        }
    }
}

#[allow(clippy::unwrap_used)]
fn record_outcome(ctx: &SlotContext, started: Instant, success: bool) {
    let mut stats = ctx.stats.write().unwrap();
    stats.jobs_processed = stats.jobs_processed.saturating_add(1);
    if success {
        stats.jobs_succeeded = stats.jobs_succeeded.saturating_add(1);
    } else {
        stats.jobs_failed = stats.jobs_failed.saturating_add(1);
    }
    stats.total_process_time_ms = stats
        .total_process_time_ms
        .saturating_add(started.elapsed().as_millis() as u64);
    stats.last_job_time = Some(Utc::now());
}
