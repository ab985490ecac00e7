//! Application state for axum handlers
//!
//! Initialized once at startup and cloned into every handler, so connection
//! pools and services are shared instead of rebuilt per request.

use std::sync::Arc;

use docflow_config::ApplicationConfig;
use docflow_jobs::{JobQueue, JobStore};
use docflow_registry::DocumentRegistry;
use docflow_search::SearchService;
use docflow_vector_data::VectorRepository;

/// Shared services for all handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn DocumentRegistry>,
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<dyn JobQueue>,
    pub vector_repo: Arc<dyn VectorRepository>,
    pub search: Arc<SearchService>,
    pub config: Arc<ApplicationConfig>,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn DocumentRegistry>,
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        vector_repo: Arc<dyn VectorRepository>,
        search: Arc<SearchService>,
        config: Arc<ApplicationConfig>,
    ) -> Self {
        Self {
            registry,
            store,
            queue,
            vector_repo,
            search,
            config,
        }
    }
}
