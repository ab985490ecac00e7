//! Collection management endpoints

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use docflow_vector_data::{CollectionStats, DocumentSummary, validate_collection_name};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/collections", get(list).post(create))
        .route("/collections/{name}", delete(remove))
        .route("/collections/{name}/stats", get(stats))
        .route("/collections/{name}/documents", get(documents))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.vector_repo.list_collections().await?))
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    name: String,
}

async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_collection_name(&request.name)?;
    state.vector_repo.create_collection(&request.name).await?;
    Ok(Json(json!({ "name": request.name, "status": "created" })))
}

async fn remove(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let existed = state.vector_repo.delete_collection(&name).await?;
    if !existed {
        return Err(ApiError::not_found(format!("Collection not found: {name}")));
    }
    Ok(Json(json!({ "name": name, "status": "deleted" })))
}

async fn stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CollectionStats>, ApiError> {
    Ok(Json(state.vector_repo.collection_stats(&name).await?))
}

async fn documents(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<DocumentSummary>>, ApiError> {
    Ok(Json(state.vector_repo.list_documents(&name).await?))
}
