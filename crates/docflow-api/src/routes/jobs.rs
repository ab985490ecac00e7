//! Job inspection endpoints
//!
//! Async flows surface the Job: status, progress, message, error, result.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::str::FromStr;

use docflow_ingestion::cancel_job;
use docflow_jobs::{Job, JobStats, JobStatus, JobType};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list))
        .route("/jobs/stats", get(stats))
        .route("/jobs/requeue-failed", post(requeue_failed))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/cancel", post(cancel))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    #[serde(rename = "type")]
    job_type: Option<String>,
    user: Option<String>,
    #[serde(default)]
    active: bool,
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let jobs = if query.active {
        state.store.get_active().await?
    } else if let Some(status) = query.status {
        let status = JobStatus::from_str(&status).map_err(ApiError::bad_request)?;
        state.store.list_by_status(status).await?
    } else if let Some(job_type) = query.job_type {
        let job_type = JobType::from_str(&job_type).map_err(ApiError::bad_request)?;
        state.store.list_by_type(job_type).await?
    } else if let Some(user) = query.user {
        state.store.list_by_user(&user).await?
    } else {
        return Err(ApiError::bad_request(
            "provide one of: status, type, user, active=true",
        ));
    };
    Ok(Json(jobs))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.store.get(&id).await?))
}

async fn stats(State(state): State<AppState>) -> Result<Json<JobStats>, ApiError> {
    Ok(Json(state.store.get_stats().await?))
}

#[derive(Debug, Deserialize)]
struct RequeueQuery {
    max_retries: Option<u32>,
}

async fn requeue_failed(
    State(state): State<AppState>,
    Query(query): Query<RequeueQuery>,
) -> Result<Json<Value>, ApiError> {
    let max_retries = query
        .max_retries
        .unwrap_or(state.config.worker.max_retries);
    let requeued = state.queue.requeue_failed(max_retries).await?;
    Ok(Json(json!({ "requeued": requeued })))
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    // Walks retrying jobs through queued first; direct status updates would
    // reject them
    let job = cancel_job(&state.store, &state.queue, &id, "Cancelled by user").await?;
    Ok(Json(job))
}
