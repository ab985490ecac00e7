//! Job domain model and status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{JobError, JobResult};

/// Kind of asynchronous work a job represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    DocumentUpload,
    DocumentDelete,
    CollectionReindex,
    Maintenance,
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document_upload" => Ok(Self::DocumentUpload),
            "document_delete" => Ok(Self::DocumentDelete),
            "collection_reindex" => Ok(Self::CollectionReindex),
            "maintenance" => Ok(Self::Maintenance),
            _ => Err(format!("Invalid job type: {s}")),
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DocumentUpload => "document_upload",
            Self::DocumentDelete => "document_delete",
            Self::CollectionReindex => "collection_reindex",
            Self::Maintenance => "maintenance",
        };
        write!(f, "{name}")
    }
}

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Retrying,
}

impl JobStatus {
    /// All statuses, used for index scans.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Queued,
        Self::Processing,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
        Self::Retrying,
    ];

    /// Statuses counted as active work.
    pub const ACTIVE: [Self; 3] = [Self::Queued, Self::Processing, Self::Retrying];

    /// Whether the status is an end state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a transition from `self` to `to` is allowed.
    ///
    /// Same-status transitions are permitted so progress/message refreshes
    /// can reuse the status-update path.
    pub fn can_transition_to(self, to: Self) -> bool {
        if self == to {
            return true;
        }
        match self {
            Self::Pending => matches!(to, Self::Queued | Self::Cancelled),
            Self::Queued => matches!(to, Self::Processing | Self::Cancelled),
            Self::Processing => matches!(
                to,
                Self::Completed | Self::Failed | Self::Retrying | Self::Cancelled
            ),
            Self::Retrying => matches!(to, Self::Queued),
            Self::Failed => matches!(to, Self::Retrying),
            Self::Completed | Self::Cancelled => false,
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "retrying" => Ok(Self::Retrying),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Retrying => "retrying",
        };
        write!(f, "{status}")
    }
}

/// A persisted unit of asynchronous work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Higher priority dequeues sooner; 0 means FIFO by enqueue time
    pub priority: i64,
    /// Advisory completion percentage in [0, 100]
    pub progress: u8,
    pub message: String,
    pub payload: HashMap<String, serde_json::Value>,
    pub result: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Job {
    /// Create a pending job with a fresh id and default retry policy.
    pub fn new(job_type: JobType, payload: HashMap<String, serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            job_type,
            status: JobStatus::Pending,
            priority: 0,
            progress: 0,
            message: String::new(),
            payload,
            result: HashMap::new(),
            error: None,
            retry_count: 0,
            max_retries: 3,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
            worker_id: None,
            user_id: None,
            tags: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Validate field-level invariants.
    ///
    /// # Errors
    /// Returns `JobError::Invalid` naming the offending field.
    pub fn validate(&self) -> JobResult<()> {
        if self.id.trim().is_empty() {
            return Err(JobError::invalid("id", "must not be empty"));
        }
        if self.progress > 100 {
            return Err(JobError::invalid("progress", "must be within 0..=100"));
        }
        Ok(())
    }

    /// Move the job to a new status, enforcing the state machine and the
    /// timestamp rules: `started_at` is stamped on the first entry to
    /// processing, `completed_at` on the first entry to a terminal state.
    ///
    /// # Errors
    /// Returns `JobError::InvalidTransition` for disallowed moves.
    pub fn transition(&mut self, to: JobStatus) -> JobResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        let now = Utc::now();
        if to == JobStatus::Processing && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if to.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Duration between start and completion, if both are known.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Aggregate statistics over all stored jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    pub total: usize,
    pub by_status: HashMap<String, usize>,
    pub by_type: HashMap<String, usize>,
    /// Mean wall-clock duration of completed jobs, milliseconds
    pub average_duration_ms: Option<f64>,
    /// completed / (completed + failed), or 0.0 with no finished jobs
    pub success_rate: f64,
    /// Distinct worker ids currently in processing
    pub active_workers: usize,
}

impl JobStats {
    /// Aggregate stats from a full job scan.
    pub fn from_jobs(jobs: &[Job]) -> Self {
        let mut by_status: HashMap<String, usize> = HashMap::new();
        let mut by_type: HashMap<String, usize> = HashMap::new();
        let mut durations: Vec<i64> = Vec::new();
        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut workers: std::collections::HashSet<&str> = std::collections::HashSet::new();

        for job in jobs {
            *by_status.entry(job.status.to_string()).or_default() += 1;
            *by_type.entry(job.job_type.to_string()).or_default() += 1;
            match job.status {
                JobStatus::Completed => {
                    completed += 1;
                    if let Some(ms) = job.duration_ms() {
                        durations.push(ms);
                    }
                }
                JobStatus::Failed => failed += 1,
                JobStatus::Processing => {
                    if let Some(worker) = job.worker_id.as_deref() {
                        workers.insert(worker);
                    }
                }
                _ => {}
            }
        }

        let average_duration_ms = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
        };
        let finished = completed + failed;
        let success_rate = if finished > 0 {
            completed as f64 / finished as f64
        } else {
            0.0
        };

        Self {
            total: jobs.len(),
            by_status,
            by_type,
            average_duration_ms,
            success_rate,
            active_workers: workers.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(JobType::DocumentUpload, HashMap::new())
    }

    #[test]
    fn happy_path_transitions_stamp_timestamps() {
        let mut j = job();
        j.transition(JobStatus::Queued).unwrap();
        assert!(j.started_at.is_none());

        j.transition(JobStatus::Processing).unwrap();
        let started = j.started_at.unwrap();

        j.transition(JobStatus::Completed).unwrap();
        assert!(j.completed_at.is_some());
        // started_at is stamped once
        assert_eq!(j.started_at.unwrap(), started);
    }

    #[test]
    fn terminal_states_accept_no_transitions() {
        let mut j = job();
        j.transition(JobStatus::Queued).unwrap();
        j.transition(JobStatus::Cancelled).unwrap();
        assert!(matches!(
            j.transition(JobStatus::Queued),
            Err(JobError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn failed_can_only_move_to_retrying() {
        let mut j = job();
        j.transition(JobStatus::Queued).unwrap();
        j.transition(JobStatus::Processing).unwrap();
        j.transition(JobStatus::Failed).unwrap();
        assert!(j.completed_at.is_some());

        assert!(matches!(
            j.transition(JobStatus::Processing),
            Err(JobError::InvalidTransition { .. })
        ));
        j.transition(JobStatus::Retrying).unwrap();
        j.transition(JobStatus::Queued).unwrap();
    }

    #[test]
    fn retry_cycle_does_not_restamp_started_at() {
        let mut j = job();
        j.transition(JobStatus::Queued).unwrap();
        j.transition(JobStatus::Processing).unwrap();
        let first_start = j.started_at.unwrap();

        j.transition(JobStatus::Retrying).unwrap();
        j.transition(JobStatus::Queued).unwrap();
        j.transition(JobStatus::Processing).unwrap();
        assert_eq!(j.started_at.unwrap(), first_start);
    }

    #[test]
    fn out_of_range_progress_fails_validation() {
        let mut j = job();
        j.progress = 101;
        assert!(matches!(
            j.validate(),
            Err(JobError::Invalid { field, .. }) if field == "progress"
        ));
    }

    #[test]
    fn stats_aggregate_status_counts_and_success_rate() {
        let mut completed = job();
        completed.transition(JobStatus::Queued).unwrap();
        completed.transition(JobStatus::Processing).unwrap();
        completed.transition(JobStatus::Completed).unwrap();

        let mut failed = job();
        failed.transition(JobStatus::Queued).unwrap();
        failed.transition(JobStatus::Processing).unwrap();
        failed.transition(JobStatus::Failed).unwrap();

        let mut processing = job();
        processing.worker_id = Some("worker-1".to_string());
        processing.transition(JobStatus::Queued).unwrap();
        processing.transition(JobStatus::Processing).unwrap();

        let stats = JobStats::from_jobs(&[completed, failed, processing]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status.get("completed"), Some(&1));
        assert_eq!(stats.by_status.get("failed"), Some(&1));
        assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.active_workers, 1);
        assert!(stats.average_duration_ms.is_some());
    }
}
