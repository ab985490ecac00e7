//! In-memory `JobStore` for testing

// Allow test-specific patterns in mock implementation
#![allow(clippy::unwrap_used)] // Mocks can panic on lock poisoning
#![allow(clippy::arithmetic_side_effects)] // Test counters can overflow

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{JobError, JobResult};
use crate::models::{Job, JobStats, JobStatus, JobType};
use crate::traits::JobStore;

type JobMap = Arc<Mutex<HashMap<String, Job>>>;

/// Mock job store for tests; enforces the same state machine and timestamp
/// rules as the Redis implementation.
#[derive(Clone, Default)]
pub struct MockJobStore {
    jobs: JobMap,
    fail_next: Arc<Mutex<Option<String>>>,
}

impl MockJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation fail with a store error.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    /// Number of stored jobs (for test assertions).
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Whether the store holds no jobs.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().unwrap().is_empty()
    }

    fn check_fail(&self, operation: &'static str, id: &str) -> JobResult<()> {
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(JobError::Store {
                operation,
                id: id.to_string(),
                message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MockJobStore {
    async fn create(&self, mut job: Job) -> JobResult<Job> {
        self.check_fail("create", &job.id)?;
        job.validate()?;
        job.updated_at = Utc::now();

        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(JobError::AlreadyExists { id: job.id });
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get(&self, id: &str) -> JobResult<Job> {
        self.check_fail("get", id)?;
        self.jobs
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound { id: id.to_string() })
    }

    async fn update(&self, mut job: Job) -> JobResult<Job> {
        self.check_fail("update", &job.id)?;
        job.validate()?;
        let mut jobs = self.jobs.lock().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(JobError::NotFound { id: job.id });
        }
        job.updated_at = Utc::now();
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        progress: Option<u8>,
        message: Option<&str>,
    ) -> JobResult<Job> {
        self.check_fail("update_status", id)?;
        if progress.is_some_and(|p| p > 100) {
            return Err(JobError::invalid("progress", "must be within 0..=100"));
        }
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound { id: id.to_string() })?;
        job.transition(status)?;
        if let Some(progress) = progress {
            job.progress = progress;
        }
        if let Some(message) = message {
            job.message = message.to_string();
        }
        Ok(job.clone())
    }

    async fn update_result(
        &self,
        id: &str,
        result: HashMap<String, serde_json::Value>,
    ) -> JobResult<()> {
        self.check_fail("update_result", id)?;
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound { id: id.to_string() })?;
        job.result = result;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn set_progress(&self, id: &str, progress: u8, message: &str) -> JobResult<()> {
        self.check_fail("set_progress", id)?;
        if progress > 100 {
            return Err(JobError::invalid("progress", "must be within 0..=100"));
        }
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound { id: id.to_string() })?;
        job.progress = progress;
        job.message = message.to_string();
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &str) -> JobResult<()> {
        self.check_fail("delete", id)?;
        self.jobs
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| JobError::NotFound { id: id.to_string() })
    }

    async fn list_by_status(&self, status: JobStatus) -> JobResult<Vec<Job>> {
        self.check_fail("list_by_status", "*")?;
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect())
    }

    async fn list_by_type(&self, job_type: JobType) -> JobResult<Vec<Job>> {
        self.check_fail("list_by_type", "*")?;
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.job_type == job_type)
            .cloned()
            .collect())
    }

    async fn list_by_user(&self, user_id: &str) -> JobResult<Vec<Job>> {
        self.check_fail("list_by_user", user_id)?;
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn get_active(&self) -> JobResult<Vec<Job>> {
        self.check_fail("get_active", "*")?;
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| JobStatus::ACTIVE.contains(&j.status))
            .cloned()
            .collect())
    }

    async fn cleanup_completed(&self, older_than: Duration) -> JobResult<usize> {
        self.check_fail("cleanup_completed", "*")?;
        let cutoff = Utc::now() - older_than;
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, j| {
            !(j.status == JobStatus::Completed && j.completed_at.is_some_and(|t| t < cutoff))
        });
        Ok(before - jobs.len())
    }

    async fn cleanup_failed(&self, older_than: Duration, max_retries: u32) -> JobResult<usize> {
        self.check_fail("cleanup_failed", "*")?;
        let cutoff = Utc::now() - older_than;
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, j| {
            !(j.status == JobStatus::Failed
                && j.retry_count >= max_retries
                && j.completed_at.is_some_and(|t| t < cutoff))
        });
        Ok(before - jobs.len())
    }

    async fn get_stats(&self) -> JobResult<JobStats> {
        self.check_fail("get_stats", "*")?;
        let jobs: Vec<Job> = self.jobs.lock().unwrap().values().cloned().collect();
        Ok(JobStats::from_jobs(&jobs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = MockJobStore::new();
        let job = Job::new(JobType::DocumentUpload, HashMap::new());
        let created = store.create(job.clone()).await.unwrap();
        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn update_status_rejects_invalid_transitions() {
        let store = MockJobStore::new();
        let job = store
            .create(Job::new(JobType::DocumentUpload, HashMap::new()))
            .await
            .unwrap();
        // pending -> processing skips queued and must be rejected
        let err = store
            .update_status(&job.id, JobStatus::Processing, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn set_progress_rejects_out_of_range() {
        let store = MockJobStore::new();
        let job = store
            .create(Job::new(JobType::DocumentUpload, HashMap::new()))
            .await
            .unwrap();
        assert!(matches!(
            store.set_progress(&job.id, 101, "too far").await,
            Err(JobError::Invalid { .. })
        ));
        store.set_progress(&job.id, 100, "done").await.unwrap();
        assert_eq!(store.get(&job.id).await.unwrap().progress, 100);
    }

    #[tokio::test]
    async fn get_active_spans_queued_processing_retrying() {
        let store = MockJobStore::new();
        let a = store
            .create(Job::new(JobType::DocumentUpload, HashMap::new()))
            .await
            .unwrap();
        store.update_status(&a.id, JobStatus::Queued, None, None).await.unwrap();

        let b = store
            .create(Job::new(JobType::DocumentDelete, HashMap::new()))
            .await
            .unwrap();
        store.update_status(&b.id, JobStatus::Queued, None, None).await.unwrap();
        store.update_status(&b.id, JobStatus::Processing, None, None).await.unwrap();

        let c = store
            .create(Job::new(JobType::Maintenance, HashMap::new()))
            .await
            .unwrap();
        store.update_status(&c.id, JobStatus::Cancelled, None, None).await.unwrap();

        let active = store.get_active().await.unwrap();
        assert_eq!(active.len(), 2);
    }

    #[tokio::test]
    async fn cleanup_failed_only_removes_exhausted_jobs() {
        let store = MockJobStore::new();
        let mut job = Job::new(JobType::DocumentUpload, HashMap::new());
        job.retry_count = 3;
        job.max_retries = 3;
        let job = store.create(job).await.unwrap();
        store.update_status(&job.id, JobStatus::Queued, None, None).await.unwrap();
        store.update_status(&job.id, JobStatus::Processing, None, None).await.unwrap();
        store.update_status(&job.id, JobStatus::Failed, None, None).await.unwrap();

        // Finished just now, so an hour-old threshold keeps it
        assert_eq!(store.cleanup_failed(Duration::hours(1), 3).await.unwrap(), 0);
        assert_eq!(store.cleanup_failed(Duration::zero(), 3).await.unwrap(), 1);
        assert!(store.is_empty());
    }
}
