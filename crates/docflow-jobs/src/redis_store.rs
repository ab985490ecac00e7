//! Redis-backed job store
//!
//! Same layout discipline as the document registry: JSON records plus set
//! indexes, every multi-key mutation in one atomic pipeline. Status changes
//! go through [`Job::transition`] so the state machine and timestamp rules
//! hold no matter which store method performed the write.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;

use crate::error::{JobError, JobResult};
use crate::keys;
use crate::models::{Job, JobStats, JobStatus, JobType};
use crate::traits::JobStore;

/// Job store over a shared Redis connection manager
#[derive(Clone)]
pub struct RedisJobStore {
    conn: ConnectionManager,
}

impl RedisJobStore {
    /// Wrap an existing connection manager.
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to the given Redis URL.
    ///
    /// # Errors
    /// Returns `JobError::Store` if the connection cannot be established.
    pub async fn connect(url: &str) -> JobResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| JobError::store("connect", url, e))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| JobError::store("connect", url, e))?;
        Ok(Self::new(conn))
    }

    async fn batch_get(&self, ids: Vec<String>) -> JobResult<Vec<Job>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let record_keys: Vec<String> = ids.iter().map(|id| keys::job(id)).collect();
        let raw: Vec<Option<String>> = conn
            .mget(&record_keys)
            .await
            .map_err(|e| JobError::store("batch_get", ids.join(","), e))?;

        let mut jobs = Vec::with_capacity(raw.len());
        for json in raw.into_iter().flatten() {
            jobs.push(serde_json::from_str(&json)?);
        }
        Ok(jobs)
    }

    async fn scan_index(&self, index_key: &str) -> JobResult<Vec<Job>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .smembers(index_key)
            .await
            .map_err(|e| JobError::store("scan_index", index_key, e))?;
        self.batch_get(ids).await
    }

    /// Write the record and fix up index membership diffs in one transaction.
    async fn write(&self, operation: &'static str, old: &Job, new: &Job) -> JobResult<()> {
        let record = serde_json::to_string(new)?;
        let mut pipe = redis::pipe();
        pipe.atomic().set(keys::job(&new.id), &record);

        if old.status != new.status {
            pipe.srem(keys::by_status(old.status), &new.id)
                .sadd(keys::by_status(new.status), &new.id);
        }
        if old.job_type != new.job_type {
            pipe.srem(keys::by_type(old.job_type), &new.id)
                .sadd(keys::by_type(new.job_type), &new.id);
        }
        if old.user_id != new.user_id {
            if let Some(user) = old.user_id.as_deref() {
                pipe.srem(keys::by_user(user), &new.id);
            }
            if let Some(user) = new.user_id.as_deref() {
                pipe.sadd(keys::by_user(user), &new.id);
            }
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| JobError::store(operation, &new.id, e))?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type))]
    async fn create(&self, mut job: Job) -> JobResult<Job> {
        job.validate()?;
        job.updated_at = Utc::now();
        let record = serde_json::to_string(&job)?;

        let mut conn = self.conn.clone();
        let created: bool = conn
            .set_nx(keys::job(&job.id), &record)
            .await
            .map_err(|e| JobError::store("create", &job.id, e))?;
        if !created {
            return Err(JobError::AlreadyExists { id: job.id });
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .sadd(keys::JOBS_INDEX, &job.id)
            .sadd(keys::by_type(job.job_type), &job.id)
            .sadd(keys::by_status(job.status), &job.id);
        if let Some(user) = job.user_id.as_deref() {
            pipe.sadd(keys::by_user(user), &job.id);
        }
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| JobError::store("create", &job.id, e))?;

        tracing::debug!(job_id = %job.id, "Job created");
        Ok(job)
    }

    async fn get(&self, id: &str) -> JobResult<Job> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn
            .get(keys::job(id))
            .await
            .map_err(|e| JobError::store("get", id, e))?;
        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(JobError::NotFound { id: id.to_string() }),
        }
    }

    async fn update(&self, mut job: Job) -> JobResult<Job> {
        job.validate()?;
        let old = self.get(&job.id).await?;
        job.updated_at = Utc::now();
        self.write("update", &old, &job).await?;
        Ok(job)
    }

    #[tracing::instrument(skip(self), fields(job_id = %id))]
    async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        progress: Option<u8>,
        message: Option<&str>,
    ) -> JobResult<Job> {
        let old = self.get(id).await?;
        let mut job = old.clone();
        job.transition(status)?;
        if let Some(progress) = progress {
            if progress > 100 {
                return Err(JobError::invalid("progress", "must be within 0..=100"));
            }
            job.progress = progress;
        }
        if let Some(message) = message {
            job.message = message.to_string();
        }
        self.write("update_status", &old, &job).await?;
        Ok(job)
    }

    async fn update_result(
        &self,
        id: &str,
        result: HashMap<String, serde_json::Value>,
    ) -> JobResult<()> {
        let old = self.get(id).await?;
        let mut job = old.clone();
        job.result = result;
        job.updated_at = Utc::now();
        self.write("update_result", &old, &job).await
    }

    async fn set_progress(&self, id: &str, progress: u8, message: &str) -> JobResult<()> {
        if progress > 100 {
            return Err(JobError::invalid("progress", "must be within 0..=100"));
        }
        let old = self.get(id).await?;
        let mut job = old.clone();
        job.progress = progress;
        job.message = message.to_string();
        job.updated_at = Utc::now();
        self.write("set_progress", &old, &job).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> JobResult<()> {
        let job = self.get(id).await?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(keys::job(id))
            .srem(keys::JOBS_INDEX, id)
            .srem(keys::by_type(job.job_type), id)
            .srem(keys::by_status(job.status), id);
        if let Some(user) = job.user_id.as_deref() {
            pipe.srem(keys::by_user(user), id);
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| JobError::store("delete", id, e))?;
        Ok(())
    }

    async fn list_by_status(&self, status: JobStatus) -> JobResult<Vec<Job>> {
        self.scan_index(&keys::by_status(status)).await
    }

    async fn list_by_type(&self, job_type: JobType) -> JobResult<Vec<Job>> {
        self.scan_index(&keys::by_type(job_type)).await
    }

    async fn list_by_user(&self, user_id: &str) -> JobResult<Vec<Job>> {
        self.scan_index(&keys::by_user(user_id)).await
    }

    async fn get_active(&self) -> JobResult<Vec<Job>> {
        let mut active = Vec::new();
        for status in JobStatus::ACTIVE {
            active.extend(self.list_by_status(status).await?);
        }
        Ok(active)
    }

    async fn cleanup_completed(&self, older_than: Duration) -> JobResult<usize> {
        let cutoff = Utc::now() - older_than;
        let mut removed = 0usize;
        for job in self.list_by_status(JobStatus::Completed).await? {
            if job.completed_at.is_some_and(|t| t < cutoff) {
                self.delete(&job.id).await?;
                removed = removed.saturating_add(1);
            }
        }
        Ok(removed)
    }

    async fn cleanup_failed(&self, older_than: Duration, max_retries: u32) -> JobResult<usize> {
        let cutoff = Utc::now() - older_than;
        let mut removed = 0usize;
        for job in self.list_by_status(JobStatus::Failed).await? {
            let exhausted = job.retry_count >= max_retries;
            if exhausted && job.completed_at.is_some_and(|t| t < cutoff) {
                self.delete(&job.id).await?;
                removed = removed.saturating_add(1);
            }
        }
        Ok(removed)
    }

    async fn get_stats(&self) -> JobResult<JobStats> {
        let jobs = self.scan_index(keys::JOBS_INDEX).await?;
        Ok(JobStats::from_jobs(&jobs))
    }
}

/// Compute the queue score for a job: its priority, or the current wall-clock
/// second when the priority is 0.
pub(crate) fn queue_score(job: &Job) -> f64 {
    if job.priority > 0 {
        job.priority as f64
    } else {
        Utc::now().timestamp() as f64
    }
}

/// Shared helper: apply the requeue bookkeeping to one failed job.
pub(crate) fn prepare_retry(job: &mut Job) -> JobResult<()> {
    job.retry_count = job.retry_count.saturating_add(1);
    job.progress = 0;
    job.message = format!("Retrying ({}/{})", job.retry_count, job.max_retries);
    job.transition(JobStatus::Retrying)
}
