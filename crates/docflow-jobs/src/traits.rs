//! Job store and queue traits for dependency injection and testing

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;

use crate::error::JobResult;
use crate::models::{Job, JobStats, JobStatus, JobType};

/// Capability set for the persistent job store
///
/// All mutations are serialized through the store so status-index membership
/// always matches record state; status changes respect the state machine in
/// [`JobStatus::can_transition_to`].
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job. Rejects duplicate ids with `AlreadyExists`.
    async fn create(&self, job: Job) -> JobResult<Job>;

    /// Fetch a job by id or `NotFound`.
    async fn get(&self, id: &str) -> JobResult<Job>;

    /// Overwrite the full job record, moving indexes where status, type, or
    /// user changed. `updated_at` is stamped.
    async fn update(&self, job: Job) -> JobResult<Job>;

    /// Transition a job's status with optional progress/message refresh.
    async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        progress: Option<u8>,
        message: Option<&str>,
    ) -> JobResult<Job>;

    /// Replace the job's result map.
    async fn update_result(
        &self,
        id: &str,
        result: HashMap<String, serde_json::Value>,
    ) -> JobResult<()>;

    /// Update advisory progress. Rejects values above 100.
    async fn set_progress(&self, id: &str, progress: u8, message: &str) -> JobResult<()>;

    /// Remove the record and its index memberships.
    async fn delete(&self, id: &str) -> JobResult<()>;

    /// Jobs in a status.
    async fn list_by_status(&self, status: JobStatus) -> JobResult<Vec<Job>>;

    /// Jobs of a type.
    async fn list_by_type(&self, job_type: JobType) -> JobResult<Vec<Job>>;

    /// Jobs owned by a user.
    async fn list_by_user(&self, user_id: &str) -> JobResult<Vec<Job>>;

    /// Jobs in queued, processing, or retrying.
    async fn get_active(&self) -> JobResult<Vec<Job>>;

    /// Delete completed jobs finished more than `older_than` ago.
    async fn cleanup_completed(&self, older_than: Duration) -> JobResult<usize>;

    /// Delete failed jobs finished more than `older_than` ago whose retries
    /// are exhausted (`retry_count >= max_retries`).
    async fn cleanup_failed(&self, older_than: Duration, max_retries: u32) -> JobResult<usize>;

    /// Aggregate counts, durations, success rate, and active workers.
    async fn get_stats(&self) -> JobResult<JobStats>;
}

/// Per-type priority queue layered over a [`JobStore`]
///
/// Scores follow the job's priority; priority-0 jobs score by enqueue time.
/// Dequeue delivers each job to exactly one caller.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Mark the job queued and add it to its type's queue. Re-enqueueing an
    /// already-queued job is idempotent.
    async fn enqueue(&self, job: &Job) -> JobResult<()>;

    /// Pop the highest-priority job of a type, transition it to processing,
    /// and stamp the worker id. Returns `None` on an empty queue. Orphaned
    /// ids (queue entry without a record) are skipped with one retry.
    async fn dequeue(&self, job_type: JobType, worker_id: &str) -> JobResult<Option<Job>>;

    /// Number of queued entries for a type.
    async fn queue_length(&self, job_type: JobType) -> JobResult<usize>;

    /// Remove a job's queue entry without touching the record (dead-letter).
    async fn remove(&self, job: &Job) -> JobResult<()>;

    /// Re-enqueue failed jobs with remaining retry budget: bump retry_count,
    /// reset progress to 0, note the attempt in the message, and queue them
    /// again. Returns the number requeued.
    async fn requeue_failed(&self, max_retries: u32) -> JobResult<usize>;
}
