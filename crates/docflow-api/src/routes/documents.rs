//! Document endpoints: upload, listing, retrieval, deletion
//!
//! Upload is the async entry point of the ingestion flow: spool the bytes to
//! the upload directory, register a pending document, enqueue the
//! `document_upload` job, and answer immediately with both ids.

use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use docflow_ingestion::{DeleteOutcome, UploadPayload, delete_document};
use docflow_jobs::{Job, JobType};
use docflow_processing::ChunkingStrategy;
use docflow_registry::{Document, DocumentStatus};
use docflow_vector_data::{ChunkRecord, validate_collection_name};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", post(upload).get(list))
        .route("/documents/{id}", get(get_document).delete(remove))
        .route("/documents/{id}/chunks", get(chunks))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    document_id: String,
    job_id: String,
    status: String,
}

/// Multipart fields besides the file itself
#[derive(Debug, Default)]
struct UploadFields {
    collection: Option<String>,
    chunking_strategy: Option<String>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    extract_metadata: bool,
    num_questions: u32,
    max_pages: u32,
    priority: i64,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut fields = UploadFields::default();
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(ToString::to_string)
                    .ok_or_else(|| ApiError::bad_request("file part needs a filename"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
                file = Some((filename, bytes.to_vec()));
            }
            "collection" => fields.collection = Some(read_text(field).await?),
            "chunking_strategy" => fields.chunking_strategy = Some(read_text(field).await?),
            "chunk_size" => fields.chunk_size = Some(read_parsed(field, "chunk_size").await?),
            "chunk_overlap" => {
                fields.chunk_overlap = Some(read_parsed(field, "chunk_overlap").await?);
            }
            "extract_metadata" => {
                fields.extract_metadata = read_parsed(field, "extract_metadata").await?;
            }
            "num_questions" => fields.num_questions = read_parsed(field, "num_questions").await?,
            "max_pages" => fields.max_pages = read_parsed(field, "max_pages").await?,
            "priority" => fields.priority = read_parsed(field, "priority").await?,
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| ApiError::bad_request("missing file part"))?;
    let collection = fields
        .collection
        .ok_or_else(|| ApiError::bad_request("missing collection field"))?;
    validate_collection_name(&collection).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let strategy = match fields.chunking_strategy.as_deref() {
        Some(raw) => {
            ChunkingStrategy::from_str(raw).map_err(ApiError::bad_request)?
        }
        None => ChunkingStrategy::Sentence,
    };

    // Spool the upload; the pipeline removes it after persisting chunks
    let document_id = Uuid::new_v4().to_string();
    let upload_dir = std::path::Path::new(&state.config.api.upload_dir);
    tokio::fs::create_dir_all(upload_dir).await?;
    let file_path = upload_dir.join(format!("{document_id}-{filename}"));
    tokio::fs::write(&file_path, &bytes).await?;

    let payload = UploadPayload {
        document_id: document_id.clone(),
        filename: filename.clone(),
        file_path: file_path.to_string_lossy().into_owned(),
        file_size: bytes.len() as u64,
        collection: collection.clone(),
        chunking_strategy: strategy,
        chunk_size: fields.chunk_size.unwrap_or(512),
        chunk_overlap: fields.chunk_overlap.unwrap_or(50),
        extract_metadata: fields.extract_metadata,
        num_questions: fields.num_questions,
        max_pages: fields.max_pages,
    };

    // Pending document row first, then the job that will own it
    let mut doc = Document::new(&document_id, &filename, &collection);
    doc.file_size = payload.file_size;
    doc.processing = payload.processing_options();
    state.registry.register(doc).await?;

    let job = Job::new(JobType::DocumentUpload, payload.to_job_payload())
        .with_priority(fields.priority)
        .with_max_retries(state.config.worker.max_retries);
    let job = state.store.create(job).await?;
    state.queue.enqueue(&job).await?;

    tracing::info!(document_id, job_id = %job.id, collection, "Upload accepted");
    Ok(Json(UploadResponse {
        document_id,
        job_id: job.id,
        status: "pending".to_string(),
    }))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed field: {e}")))
}

async fn read_parsed<T: FromStr>(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<T, ApiError> {
    read_text(field)
        .await?
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid value for {name}")))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    collection: Option<String>,
    status: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let docs = match (query.collection, query.status) {
        (Some(collection), _) => state.registry.list_by_collection(&collection).await?,
        (None, Some(status)) => {
            let status = DocumentStatus::from_str(&status).map_err(ApiError::bad_request)?;
            state.registry.list_by_status(status).await?
        }
        (None, None) => state.registry.list().await?,
    };
    Ok(Json(docs))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.registry.get(&id).await?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, ApiError> {
    let outcome = delete_document(
        &state.registry,
        &state.vector_repo,
        &state.store,
        &state.queue,
        &id,
    )
    .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct ChunksQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

const fn default_limit() -> usize {
    50
}

async fn chunks(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ChunksQuery>,
) -> Result<Json<Vec<ChunkRecord>>, ApiError> {
    let doc = state.registry.get(&id).await?;
    let chunks = state
        .vector_repo
        .get_document_chunks(&doc.collection, &id, query.limit, query.offset)
        .await?;
    Ok(Json(chunks))
}
