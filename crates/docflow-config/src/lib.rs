//! Centralized configuration for docflow
//!
//! Single source of truth for all runtime configuration. Every setting has a
//! safe local-development default and can be overridden via environment
//! variables, then validated at startup:
//! 1. Safe defaults (constants below)
//! 2. `DOCFLOW_*` environment overrides
//! 3. Runtime validation

pub mod error;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use validation::Validate;

use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// SAFE DEFAULTS - work for any environment (dev, staging, prod, test)
// =============================================================================

// Redis (document registry, job store, job queues)
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
const DEFAULT_REDIS_POOL_TIMEOUT_SECONDS: u64 = 5;

// Vector storage
const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
const DEFAULT_VECTOR_DIMENSION: usize = 768;
const DEFAULT_VECTOR_TIMEOUT_SECONDS: u64 = 30;

// Processing service (parse / chunk / embed)
const DEFAULT_PROCESSING_URL: &str = "http://localhost:8070";
const DEFAULT_PROCESSING_TIMEOUT_SECONDS: u64 = 120;

// Upload worker
const DEFAULT_WORKER_NAME: &str = "upload-worker";
const DEFAULT_WORKER_CONCURRENCY: usize = 2;
const DEFAULT_WORKER_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_WORKER_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_WORKER_MAX_RETRIES: u32 = 3;
const DEFAULT_WORKER_RETRY_DELAY_MS: u64 = 5000;
const DEFAULT_WORKER_ENABLE_RECOVERY: bool = true;

// Search
const DEFAULT_SEARCH_CACHE_CAPACITY: usize = 1000;
const DEFAULT_SEARCH_CACHE_TTL_SECONDS: u64 = 300;
const DEFAULT_SEARCH_TOP_K: usize = 10;
const DEFAULT_SEARCH_MAX_TOP_K: usize = 100;

// API server
const DEFAULT_API_HOST: &str = "127.0.0.1";
const DEFAULT_API_PORT: u16 = 8080;
const DEFAULT_UPLOAD_DIR: &str = "/tmp/docflow/uploads";

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Top-level configuration for the whole application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Redis connection (registry, job store, queues)
    pub redis: RedisConfig,
    /// Vector storage (Qdrant)
    pub vector_storage: VectorStorageConfig,
    /// External parsing/chunking/embedding service
    pub processing: ProcessingConfig,
    /// Upload worker tuning
    pub worker: WorkerConfig,
    /// Search service and result cache
    pub search: SearchConfig,
    /// HTTP API server
    pub api: ApiConfig,
}

impl ApplicationConfig {
    /// Build the configuration from defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self {
            redis: RedisConfig::from_env(),
            vector_storage: VectorStorageConfig::from_env(),
            processing: ProcessingConfig::from_env(),
            worker: WorkerConfig::from_env(),
            search: SearchConfig::from_env(),
            api: ApiConfig::from_env(),
        }
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Validate for ApplicationConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.redis.validate()?;
        self.vector_storage.validate()?;
        self.processing.validate()?;
        self.worker.validate()?;
        self.search.validate()?;
        self.api.validate()?;
        Ok(())
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_timeout_seconds: u64,
}

impl RedisConfig {
    pub fn from_env() -> Self {
        Self {
            url: env_string("DOCFLOW_REDIS_URL", DEFAULT_REDIS_URL),
            pool_timeout_seconds: env_parse(
                "DOCFLOW_REDIS_POOL_TIMEOUT_SECONDS",
                DEFAULT_REDIS_POOL_TIMEOUT_SECONDS,
            ),
        }
    }
}

impl Validate for RedisConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_url(&self.url, "redis.url")?;
        Ok(())
    }
}

/// Vector storage (Qdrant) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStorageConfig {
    pub url: String,
    /// Embedding dimensionality for all collections
    pub dimension: usize,
    pub timeout_seconds: u64,
}

impl VectorStorageConfig {
    pub fn from_env() -> Self {
        Self {
            url: env_string("DOCFLOW_QDRANT_URL", DEFAULT_QDRANT_URL),
            dimension: env_parse("DOCFLOW_VECTOR_DIMENSION", DEFAULT_VECTOR_DIMENSION),
            timeout_seconds: env_parse(
                "DOCFLOW_VECTOR_TIMEOUT_SECONDS",
                DEFAULT_VECTOR_TIMEOUT_SECONDS,
            ),
        }
    }
}

impl Validate for VectorStorageConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_url(&self.url, "vector_storage.url")?;
        validation::validate_range(self.dimension as u64, 1, 8192, "vector_storage.dimension")?;
        Ok(())
    }
}

/// External processing service (parse / chunk / embed endpoints)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl ProcessingConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("DOCFLOW_PROCESSING_URL", DEFAULT_PROCESSING_URL),
            timeout_seconds: env_parse(
                "DOCFLOW_PROCESSING_TIMEOUT_SECONDS",
                DEFAULT_PROCESSING_TIMEOUT_SECONDS,
            ),
        }
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Validate for ProcessingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_url(&self.base_url, "processing.base_url")?;
        validation::validate_range(self.timeout_seconds, 1, 3600, "processing.timeout_seconds")?;
        Ok(())
    }
}

/// Upload worker tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub name: String,
    /// Number of independent poll loops
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    pub shutdown_timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Catch pipeline panics instead of letting a poll loop die
    pub enable_recovery: bool,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            name: env_string("DOCFLOW_WORKER_NAME", DEFAULT_WORKER_NAME),
            concurrency: env_parse("DOCFLOW_WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY),
            poll_interval_ms: env_parse(
                "DOCFLOW_WORKER_POLL_INTERVAL_MS",
                DEFAULT_WORKER_POLL_INTERVAL_MS,
            ),
            shutdown_timeout_seconds: env_parse(
                "DOCFLOW_WORKER_SHUTDOWN_TIMEOUT_SECONDS",
                DEFAULT_WORKER_SHUTDOWN_TIMEOUT_SECONDS,
            ),
            max_retries: env_parse("DOCFLOW_WORKER_MAX_RETRIES", DEFAULT_WORKER_MAX_RETRIES),
            retry_delay_ms: env_parse(
                "DOCFLOW_WORKER_RETRY_DELAY_MS",
                DEFAULT_WORKER_RETRY_DELAY_MS,
            ),
            enable_recovery: env_parse(
                "DOCFLOW_WORKER_ENABLE_RECOVERY",
                DEFAULT_WORKER_ENABLE_RECOVERY,
            ),
        }
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Validate for WorkerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.name, "worker.name")?;
        validation::validate_range(self.concurrency as u64, 1, 256, "worker.concurrency")?;
        validation::validate_range(self.poll_interval_ms, 10, 60_000, "worker.poll_interval_ms")?;
        Ok(())
    }
}

/// Search service and cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub cache_capacity: usize,
    pub cache_ttl_seconds: u64,
    pub default_top_k: usize,
    pub max_top_k: usize,
}

impl SearchConfig {
    pub fn from_env() -> Self {
        Self {
            cache_capacity: env_parse(
                "DOCFLOW_SEARCH_CACHE_CAPACITY",
                DEFAULT_SEARCH_CACHE_CAPACITY,
            ),
            cache_ttl_seconds: env_parse(
                "DOCFLOW_SEARCH_CACHE_TTL_SECONDS",
                DEFAULT_SEARCH_CACHE_TTL_SECONDS,
            ),
            default_top_k: env_parse("DOCFLOW_SEARCH_TOP_K", DEFAULT_SEARCH_TOP_K),
            max_top_k: env_parse("DOCFLOW_SEARCH_MAX_TOP_K", DEFAULT_SEARCH_MAX_TOP_K),
        }
    }

    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl Validate for SearchConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(self.cache_capacity as u64, 1, 1_000_000, "search.cache_capacity")?;
        validation::validate_range(
            self.default_top_k as u64,
            1,
            self.max_top_k as u64,
            "search.default_top_k",
        )?;
        Ok(())
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Directory where the upload adapter spools incoming files
    pub upload_dir: String,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_string("DOCFLOW_API_HOST", DEFAULT_API_HOST),
            port: env_parse("DOCFLOW_API_PORT", DEFAULT_API_PORT),
            upload_dir: env_string("DOCFLOW_UPLOAD_DIR", DEFAULT_UPLOAD_DIR),
        }
    }
}

impl Validate for ApiConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.host, "api.host")?;
        validation::validate_port(self.port, "api.port")?;
        validation::validate_non_empty(&self.upload_dir, "api.upload_dir")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ApplicationConfig::from_env();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn worker_durations_convert() {
        let worker = WorkerConfig::from_env();
        assert_eq!(worker.poll_interval(), Duration::from_millis(worker.poll_interval_ms));
        assert_eq!(worker.retry_delay(), Duration::from_millis(worker.retry_delay_ms));
    }
}
