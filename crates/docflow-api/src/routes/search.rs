//! Search endpoint

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use docflow_search::{SearchMatch, SearchRequest};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/search", post(search))
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<SearchMatch>,
    total: usize,
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let results = state.search.search(request).await?;
    let total = results.len();
    Ok(Json(SearchResponse { results, total }))
}
