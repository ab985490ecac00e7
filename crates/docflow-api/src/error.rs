//! HTTP error mapping
//!
//! One adapter error type; each core error kind carries its HTTP status:
//! validation -> 400, not-found -> 404, already-exists -> 409, everything
//! else -> 502 (upstream dependency) or 500.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use docflow_ingestion::IngestionError;
use docflow_jobs::JobError;
use docflow_registry::RegistryError;
use docflow_search::SearchError;
use docflow_vector_data::VectorDataError;

/// Adapter-level error with its HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn upstream(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "status": "error",
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match &err {
            RegistryError::NotFound { .. } => Self::not_found(err.to_string()),
            RegistryError::AlreadyExists { .. } => Self {
                status: StatusCode::CONFLICT,
                message: err.to_string(),
            },
            RegistryError::Invalid { .. } => Self::bad_request(err.to_string()),
            RegistryError::Store { .. } | RegistryError::Serialization(_) => {
                Self::upstream(err.to_string())
            }
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match &err {
            JobError::NotFound { .. } => Self::not_found(err.to_string()),
            JobError::AlreadyExists { .. } => Self {
                status: StatusCode::CONFLICT,
                message: err.to_string(),
            },
            JobError::Invalid { .. } | JobError::InvalidTransition { .. } => {
                Self::bad_request(err.to_string())
            }
            JobError::Store { .. } | JobError::Serialization(_) => Self::upstream(err.to_string()),
        }
    }
}

impl From<VectorDataError> for ApiError {
    fn from(err: VectorDataError) -> Self {
        match &err {
            VectorDataError::CollectionNotFound(_) => Self::not_found(err.to_string()),
            VectorDataError::InvalidCollectionName { .. }
            | VectorDataError::DimensionMismatch(_) => Self::bad_request(err.to_string()),
            VectorDataError::StorageUnavailable(_)
            | VectorDataError::Storage { .. }
            | VectorDataError::Serialization(_) => Self::upstream(err.to_string()),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match &err {
            SearchError::Validation { .. } => Self::bad_request(err.to_string()),
            SearchError::Embedding(_) | SearchError::Vector(_) => Self::upstream(err.to_string()),
        }
    }
}

impl From<IngestionError> for ApiError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Registry(e) => e.into(),
            IngestionError::Job(e) => e.into(),
            IngestionError::Vector(e) => e.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("IO error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_kinds_map_to_http_statuses() {
        let not_found: ApiError = RegistryError::NotFound { id: "d1".into() }.into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let conflict: ApiError = RegistryError::AlreadyExists { id: "d1".into() }.into();
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let invalid: ApiError = RegistryError::invalid("filename", "empty").into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn search_validation_is_a_400() {
        let err: ApiError = SearchError::validation("top_k", "too big").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
