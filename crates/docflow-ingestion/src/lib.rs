//! Asynchronous document ingestion
//!
//! The heart of the system: a polling [`UploadWorker`] dequeues
//! `document_upload` jobs and drives each through the staged
//! [`IngestionPipeline`] (parse, chunk, embed, persist, finalize) with
//! progress reporting, retry with bounded backoff, dead-lettering of
//! malformed payloads, and panic recovery. A [`WorkerPool`] manages worker
//! lifecycles with ordered start and parallel stop.

pub mod delete;
pub mod error;
pub mod payload;
pub mod pipeline;
pub mod pool;
pub mod worker;

pub use delete::{DeleteOutcome, cancel_job, delete_document};
pub use error::{IngestionError, IngestionResult, PipelineError};
pub use payload::UploadPayload;
pub use pipeline::{IngestionPipeline, PipelineOutcome};
pub use pool::{Worker, WorkerPool};
pub use worker::{UploadWorker, WorkerStats};
