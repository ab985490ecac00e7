//! Service wiring for the API binary
//!
//! Builds the Redis-backed stores, the Qdrant repository, the processing
//! client, the search service, and the upload worker pool, then hands back
//! the application state plus the pool for lifecycle management.

use std::sync::Arc;

use tracing::info;

use docflow_config::ApplicationConfig;
use docflow_ingestion::{IngestionPipeline, UploadWorker, WorkerPool};
use docflow_jobs::{JobQueue, JobStore, RedisJobQueue, RedisJobStore};
use docflow_processing::{HttpProcessingClient, ProcessingClient};
use docflow_registry::{DocumentRegistry, RedisDocumentRegistry};
use docflow_search::{SearchOptions, SearchService};
use docflow_vector_data::{QdrantRepository, VectorRepository};

use crate::state::AppState;

/// Bootstrap result type
pub type BootstrapResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Everything the binary needs after wiring
pub struct Services {
    pub state: AppState,
    pub pool: Arc<WorkerPool>,
}

/// Connect every backend and assemble the service graph.
///
/// # Errors
/// Any failed backend connection aborts startup.
pub async fn setup(config: ApplicationConfig) -> BootstrapResult<Services> {
    info!("Connecting to Redis at {}", config.redis.url);
    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let conn = redis_client.get_connection_manager().await?;

    let registry: Arc<dyn DocumentRegistry> =
        Arc::new(RedisDocumentRegistry::new(conn.clone()));
    let store: Arc<dyn JobStore> = Arc::new(RedisJobStore::new(conn.clone()));
    let queue: Arc<dyn JobQueue> =
        Arc::new(RedisJobQueue::new(conn, Arc::clone(&store)));

    info!("Connecting to vector storage at {}", config.vector_storage.url);
    let vector_repo: Arc<dyn VectorRepository> = Arc::new(QdrantRepository::connect(
        &config.vector_storage.url,
        config.vector_storage.dimension,
    )?);

    info!("Using processing service at {}", config.processing.base_url);
    let processing: Arc<dyn ProcessingClient> = Arc::new(HttpProcessingClient::new(
        config.processing.base_url.clone(),
        config.processing.timeout(),
    )?);

    let search = Arc::new(SearchService::new(
        Arc::clone(&processing),
        Arc::clone(&vector_repo),
        SearchOptions {
            cache_capacity: config.search.cache_capacity,
            cache_ttl: config.search.cache_ttl(),
            default_top_k: config.search.default_top_k,
            max_top_k: config.search.max_top_k,
        },
    ));

    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&vector_repo),
        Arc::clone(&processing),
        Arc::clone(&store),
    ));
    let worker = Arc::new(UploadWorker::new(
        config.worker.clone(),
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&registry),
        pipeline,
    ));

    let pool = Arc::new(WorkerPool::new());
    pool.add(worker);

    let state = AppState::new(
        registry,
        store,
        queue,
        vector_repo,
        search,
        Arc::new(config),
    );

    Ok(Services { state, pool })
}
