//! Route registration

pub mod collections;
pub mod documents;
pub mod health;
pub mod jobs;
pub mod search;

use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(documents::routes())
        .merge(jobs::routes())
        .merge(search::routes())
        .merge(collections::routes())
        .with_state(state)
}
