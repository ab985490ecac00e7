//! Docflow API server
//!
//! HTTP front end for document ingestion and semantic search, plus the
//! in-process upload worker pool.

use std::net::SocketAddr;

use tracing::info;

use docflow_api::bootstrap;
use docflow_api::routes;
use docflow_config::{ApplicationConfig, Validate};

type MainResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> MainResult {
    docflow_common::initialize_environment();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting docflow API server...");

    let config = ApplicationConfig::from_env();
    config.validate()?;

    let services = bootstrap::setup(config.clone()).await?;
    let pool = services.pool;
    let shutdown_timeout = config.worker.shutdown_timeout();

    pool.start_all().await?;

    let app = routes::create_router(services.state);
    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Drain workers after the listener closes
    pool.stop_all(shutdown_timeout).await?;
    info!("Docflow stopped");
    Ok(())
}
