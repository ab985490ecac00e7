//! Per-type priority queues layered over the job store
//!
//! The Redis implementation keeps one sorted set per job type; ZPOPMAX gives
//! atomic highest-score-first delivery, so each queued job reaches exactly
//! one of any number of concurrent dequeuers. The in-memory implementation
//! mirrors the same ordered-set semantics for tests.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{JobError, JobResult};
use crate::keys;
use crate::models::{Job, JobStatus, JobType};
use crate::redis_store::{prepare_retry, queue_score};
use crate::traits::{JobQueue, JobStore};

/// Redis sorted-set queue over a [`JobStore`]
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
    store: Arc<dyn JobStore>,
}

impl RedisJobQueue {
    pub fn new(conn: ConnectionManager, store: Arc<dyn JobStore>) -> Self {
        Self { conn, store }
    }

    /// Claim a popped id: load the record and move it to processing.
    ///
    /// Returns `Ok(None)` when the id should be skipped (orphaned entry or a
    /// job that was cancelled while sitting in the queue).
    async fn claim(&self, id: &str, worker_id: &str) -> JobResult<Option<Job>> {
        let mut job = match self.store.get(id).await {
            Ok(job) => job,
            Err(JobError::NotFound { .. }) => {
                tracing::warn!(job_id = %id, "Skipping orphaned queue entry");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        job.worker_id = Some(worker_id.to_string());
        if let Err(JobError::InvalidTransition { from, to }) = job.transition(JobStatus::Processing)
        {
            tracing::warn!(job_id = %id, %from, %to, "Skipping undeliverable queue entry");
            return Ok(None);
        }
        let job = self.store.update(job).await?;
        Ok(Some(job))
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type))]
    async fn enqueue(&self, job: &Job) -> JobResult<()> {
        let job = self
            .store
            .update_status(&job.id, JobStatus::Queued, None, None)
            .await?;

        // ZADD overwrites the score of an existing member, so re-enqueueing
        // an already-queued job is a no-op apart from score refresh.
        let mut conn = self.conn.clone();
        let _: () = conn
            .zadd(keys::queue(job.job_type), &job.id, queue_score(&job))
            .await
            .map_err(|e| JobError::store("enqueue", &job.id, e))?;
        Ok(())
    }

    async fn dequeue(&self, job_type: JobType, worker_id: &str) -> JobResult<Option<Job>> {
        let queue_key = keys::queue(job_type);

        // One extra round to step over an orphaned entry.
        for _ in 0..2 {
            let mut conn = self.conn.clone();
            let popped: Vec<(String, f64)> = conn
                .zpopmax(&queue_key, 1)
                .await
                .map_err(|e| JobError::store("dequeue", &queue_key, e))?;

            let Some((id, _score)) = popped.into_iter().next() else {
                return Ok(None);
            };
            if let Some(job) = self.claim(&id, worker_id).await? {
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    async fn queue_length(&self, job_type: JobType) -> JobResult<usize> {
        let mut conn = self.conn.clone();
        let len: usize = conn
            .zcard(keys::queue(job_type))
            .await
            .map_err(|e| JobError::store("queue_length", keys::queue(job_type), e))?;
        Ok(len)
    }

    async fn remove(&self, job: &Job) -> JobResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .zrem(keys::queue(job.job_type), &job.id)
            .await
            .map_err(|e| JobError::store("remove", &job.id, e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn requeue_failed(&self, max_retries: u32) -> JobResult<usize> {
        let failed = self.store.list_by_status(JobStatus::Failed).await?;
        let mut requeued = 0usize;
        for mut job in failed {
            if job.retry_count >= max_retries {
                continue;
            }
            prepare_retry(&mut job)?;
            let job = self.store.update(job).await?;
            self.enqueue(&job).await?;
            requeued = requeued.saturating_add(1);
        }
        if requeued > 0 {
            tracing::info!(requeued, "Requeued failed jobs");
        }
        Ok(requeued)
    }
}

type QueueMap = Arc<Mutex<HashMap<JobType, Vec<(f64, String)>>>>;

/// In-memory queue with the same ordering semantics, for tests
#[derive(Clone)]
pub struct InMemoryJobQueue {
    store: Arc<dyn JobStore>,
    queues: QueueMap,
}

impl InMemoryJobQueue {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Pop the entry with the highest score; ties break toward the
    /// lexicographically greatest id, matching ZPOPMAX.
    #[allow(clippy::unwrap_used)] // lock poisoning is unrecoverable in tests
    fn pop_max(&self, job_type: JobType) -> Option<String> {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.get_mut(&job_type)?;
        let best = queue
            .iter()
            .enumerate()
            .max_by(|(_, (sa, ia)), (_, (sb, ib))| {
                sa.total_cmp(sb).then_with(|| ia.cmp(ib))
            })
            .map(|(i, _)| i)?;
        Some(queue.swap_remove(best).1)
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    #[allow(clippy::unwrap_used)]
    async fn enqueue(&self, job: &Job) -> JobResult<()> {
        let job = self
            .store
            .update_status(&job.id, JobStatus::Queued, None, None)
            .await?;
        let score = queue_score(&job);

        let mut queues = self.queues.lock().unwrap();
        let queue = queues.entry(job.job_type).or_default();
        if let Some(entry) = queue.iter_mut().find(|(_, id)| *id == job.id) {
            entry.0 = score;
        } else {
            queue.push((score, job.id));
        }
        Ok(())
    }

    async fn dequeue(&self, job_type: JobType, worker_id: &str) -> JobResult<Option<Job>> {
        for _ in 0..2 {
            let Some(id) = self.pop_max(job_type) else {
                return Ok(None);
            };
            let mut job = match self.store.get(&id).await {
                Ok(job) => job,
                Err(JobError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            job.worker_id = Some(worker_id.to_string());
            if job.transition(JobStatus::Processing).is_err() {
                continue;
            }
            let job = self.store.update(job).await?;
            return Ok(Some(job));
        }
        Ok(None)
    }

    #[allow(clippy::unwrap_used)]
    async fn queue_length(&self, job_type: JobType) -> JobResult<usize> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get(&job_type)
            .map_or(0, Vec::len))
    }

    #[allow(clippy::unwrap_used)]
    async fn remove(&self, job: &Job) -> JobResult<()> {
        if let Some(queue) = self.queues.lock().unwrap().get_mut(&job.job_type) {
            queue.retain(|(_, id)| *id != job.id);
        }
        Ok(())
    }

    async fn requeue_failed(&self, max_retries: u32) -> JobResult<usize> {
        let failed = self.store.list_by_status(JobStatus::Failed).await?;
        let mut requeued = 0usize;
        for mut job in failed {
            if job.retry_count >= max_retries {
                continue;
            }
            prepare_retry(&mut job)?;
            let job = self.store.update(job).await?;
            self.enqueue(&job).await?;
            requeued = requeued.saturating_add(1);
        }
        Ok(requeued)
    }
}
