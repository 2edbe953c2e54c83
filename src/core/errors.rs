use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failure modes of a single embedding call. `Clone` because a failed
/// knowledge-base build is cached and handed to every later caller until the
/// session is invalidated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("embedding endpoint returned status {0}")]
    UpstreamStatus(u16),
    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),
}

/// Errors of the retrieval core. Chunking configuration is rejected before any
/// remote call; a build aborts atomically on the first embedding failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RagError {
    #[error("invalid chunking config: size must be positive and overlap ({overlap}) smaller than size ({size})")]
    ChunkConfig { size: usize, overlap: usize },
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("retrieval index has not been built")]
    IndexNotBuilt,
    #[error("knowledge base build failed: {0}")]
    BuildFailed(EmbeddingError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("upstream failure: {0}")]
    BadGateway(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match &err {
            RagError::ChunkConfig { .. } => ApiError::BadRequest(err.to_string()),
            RagError::BuildFailed(_) | RagError::Embedding(_) => {
                ApiError::BadGateway(err.to_string())
            }
            RagError::IndexNotBuilt => ApiError::Conflict(err.to_string()),
            RagError::DimensionMismatch { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
