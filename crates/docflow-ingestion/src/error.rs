//! Error types for the ingestion pipeline and workers

use thiserror::Error;

use docflow_jobs::JobError;
use docflow_processing::ProcessingError;
use docflow_registry::RegistryError;
use docflow_vector_data::VectorDataError;

/// Result type alias for worker/pool operations
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Failures of one pipeline run
///
/// The worker consults [`PipelineError::is_permanent`] to decide between the
/// retry path and the dead-letter path.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Job payload is structurally broken (missing/invalid required field).
    /// Permanent: retrying cannot fix a malformed record.
    #[error("Invalid upload payload: {reason}")]
    Payload { reason: String },

    /// The spooled upload file is gone; the pipeline cannot re-read it.
    /// Permanent for the same reason.
    #[error("Upload file missing: {path}")]
    MissingUploadFile { path: String },

    /// Chunking produced nothing to index
    #[error("Chunking produced no chunks")]
    NoChunksGenerated,

    /// Embedding cardinality does not match the chunk count
    #[error("Embedding count mismatch: {chunks} chunks but {embeddings} embeddings")]
    EmbeddingCountMismatch { chunks: usize, embeddings: usize },

    /// Document registry failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Vector store failure
    #[error(transparent)]
    Vector(#[from] VectorDataError),

    /// Processing service failure
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// Job store failure while reporting progress
    #[error(transparent)]
    Job(#[from] JobError),

    /// The pipeline task terminated abnormally
    #[error("Worker panic: {message}")]
    WorkerPanic { message: String },

    /// The run was cancelled during shutdown
    #[error("Pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Permanent failures bypass retry and dead-letter the job.
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Payload { .. } | Self::MissingUploadFile { .. })
    }

    pub fn payload(reason: impl Into<String>) -> Self {
        Self::Payload {
            reason: reason.into(),
        }
    }
}

/// Errors from worker and pool lifecycle management
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Worker '{name}' is already running")]
    AlreadyRunning { name: String },

    #[error("Worker '{name}' did not stop within the shutdown timeout")]
    ShutdownTimeout { name: String },

    #[error("No worker named '{name}'")]
    UnknownWorker { name: String },

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Vector(#[from] VectorDataError),
}
