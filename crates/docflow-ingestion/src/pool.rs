//! Worker pool: uniform lifecycle over a set of workers
//!
//! Start is sequential and short-circuits on the first failure (workers that
//! already started keep running; the caller decides whether to stop them).
//! Stop fans out in parallel, waits for every worker, and returns the first
//! error observed.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{IngestionError, IngestionResult};
use crate::worker::WorkerStats;

/// Uniform worker lifecycle, implemented by [`crate::UploadWorker`] and any
/// future worker types (delete, reindex, maintenance).
#[async_trait]
pub trait Worker: Send + Sync {
    /// Stable name; also stamped on jobs this worker claims.
    fn name(&self) -> &str;

    /// Spawn the poll loops. Returns without blocking.
    async fn start(&self) -> IngestionResult<()>;

    /// Signal shutdown, cancel in-flight work, and wait up to `timeout` for
    /// the poll loops to drain.
    async fn stop(&self, timeout: Duration) -> IngestionResult<()>;

    fn is_running(&self) -> bool;

    fn stats(&self) -> WorkerStats;
}

/// Lifecycle manager for a set of workers
#[derive(Default)]
pub struct WorkerPool {
    workers: DashMap<String, Arc<dyn Worker>>,
    /// Registration order, which is also the start order
    order: Mutex<Vec<String>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker. Replaces any worker with the same name.
    #[allow(clippy::unwrap_used)] // lock poisoning is unrecoverable
    pub fn add(&self, worker: Arc<dyn Worker>) {
        let name = worker.name().to_string();
        let mut order = self.order.lock().unwrap();
        if !order.contains(&name) {
            order.push(name.clone());
        }
        self.workers.insert(name, worker);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(name).map(|w| Arc::clone(w.value()))
    }

    #[allow(clippy::unwrap_used)]
    pub fn list(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.workers.len()
    }

    #[allow(clippy::unwrap_used)]
    fn ordered_workers(&self) -> Vec<Arc<dyn Worker>> {
        self.order
            .lock()
            .unwrap()
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    /// Start every worker in registration order. The first failure
    /// short-circuits; already-started workers remain running.
    ///
    /// # Errors
    /// The failing worker's error.
    pub async fn start_all(&self) -> IngestionResult<()> {
        for worker in self.ordered_workers() {
            worker.start().await.inspect_err(|e| {
                tracing::error!(worker = worker.name(), error = %e, "Worker failed to start");
            })?;
        }
        tracing::info!(count = self.count(), "Worker pool started");
        Ok(())
    }

    /// Stop every worker in parallel, each with the given shutdown timeout.
    /// Waits for all; returns the first error observed.
    ///
    /// # Errors
    /// The first worker error, after all workers have been waited on.
    pub async fn stop_all(&self, timeout: Duration) -> IngestionResult<()> {
        let workers = self.ordered_workers();
        let results = join_all(workers.iter().map(|w| w.stop(timeout))).await;

        let mut first_error: Option<IngestionError> = None;
        for (worker, result) in workers.iter().zip(results) {
            if let Err(e) = result {
                tracing::error!(worker = worker.name(), error = %e, "Worker failed to stop");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("Worker pool stopped");
                Ok(())
            }
        }
    }

    /// Stats fan-in across all workers.
    pub fn all_stats(&self) -> Vec<WorkerStats> {
        self.ordered_workers().iter().map(|w| w.stats()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeWorker {
        name: String,
        running: AtomicBool,
        fail_start: bool,
        fail_stop: bool,
        starts: Arc<AtomicUsize>,
    }

    impl FakeWorker {
        fn new(name: &str, starts: &Arc<AtomicUsize>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                running: AtomicBool::new(false),
                fail_start: false,
                fail_stop: false,
                starts: Arc::clone(starts),
            })
        }

        fn failing_start(name: &str, starts: &Arc<AtomicUsize>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                running: AtomicBool::new(false),
                fail_start: true,
                fail_stop: false,
                starts: Arc::clone(starts),
            })
        }

        fn failing_stop(name: &str, starts: &Arc<AtomicUsize>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                running: AtomicBool::new(false),
                fail_start: false,
                fail_stop: true,
                starts: Arc::clone(starts),
            })
        }
    }

    #[async_trait]
    impl Worker for FakeWorker {
        fn name(&self) -> &str {
            &self.name
        }

        async fn start(&self) -> IngestionResult<()> {
            if self.fail_start {
                return Err(IngestionError::AlreadyRunning {
                    name: self.name.clone(),
                });
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self, _timeout: Duration) -> IngestionResult<()> {
            self.running.store(false, Ordering::SeqCst);
            if self.fail_stop {
                return Err(IngestionError::ShutdownTimeout {
                    name: self.name.clone(),
                });
            }
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn stats(&self) -> WorkerStats {
            WorkerStats {
                name: self.name.clone(),
                is_running: self.is_running(),
                jobs_processed: 0,
                jobs_succeeded: 0,
                jobs_failed: 0,
                total_process_time_ms: 0,
                average_process_time_ms: 0.0,
                last_job_time: None,
                uptime_seconds: 0,
            }
        }
    }

    #[tokio::test]
    async fn start_all_is_ordered_and_short_circuits() {
        let starts = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new();
        let first = FakeWorker::new("first", &starts);
        let broken = FakeWorker::failing_start("broken", &starts);
        let never = FakeWorker::new("never", &starts);
        pool.add(first.clone());
        pool.add(broken);
        pool.add(never.clone());

        assert!(pool.start_all().await.is_err());
        // "first" started and stays running; "never" was never reached
        assert!(first.is_running());
        assert!(!never.is_running());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_all_waits_for_everyone_and_reports_first_error() {
        let starts = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new();
        let a = FakeWorker::new("a", &starts);
        let bad = FakeWorker::failing_stop("bad", &starts);
        let c = FakeWorker::new("c", &starts);
        pool.add(a.clone());
        pool.add(bad);
        pool.add(c.clone());

        pool.start_all().await.unwrap();
        let err = pool.stop_all(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, IngestionError::ShutdownTimeout { .. }));
        // The healthy workers were still stopped
        assert!(!a.is_running());
        assert!(!c.is_running());
    }

    #[tokio::test]
    async fn lookup_listing_and_stats_fan_in() {
        let starts = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new();
        pool.add(FakeWorker::new("upload", &starts));
        pool.add(FakeWorker::new("delete", &starts));

        assert_eq!(pool.count(), 2);
        assert_eq!(pool.list(), vec!["upload".to_string(), "delete".to_string()]);
        assert!(pool.get("upload").is_some());
        assert!(pool.get("missing").is_none());

        let stats = pool.all_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.first().unwrap().name, "upload");
    }
}
