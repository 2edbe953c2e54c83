use std::sync::Arc;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::registry::{KnowledgeBaseSummary, NewKnowledgeBase};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateKnowledgeBaseRequest {
    pub name: String,
    pub document: String,
    pub agent_id: String,
    pub embedding_model: String,
    pub chunk_size: Option<i64>,
    pub chunk_overlap: Option<i64>,
}

pub async fn list_knowledge_bases(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let knowledge_bases = state.registry.list_knowledge_bases().await?;
    Ok(Json(json!({"knowledge_bases": knowledge_bases})))
}

pub async fn create_knowledge_base(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateKnowledgeBaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "Knowledge base name is required".to_string(),
        ));
    }
    if payload.embedding_model.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Embedding model is required".to_string(),
        ));
    }

    let defaults = state.config.rag_settings();
    let chunk_size = payload
        .chunk_size
        .unwrap_or(defaults.default_chunk_size as i64);
    let chunk_overlap = payload
        .chunk_overlap
        .unwrap_or(defaults.default_chunk_overlap as i64);
    if chunk_size < 1 {
        return Err(ApiError::BadRequest(
            "chunk_size must be at least 1".to_string(),
        ));
    }
    if chunk_overlap < 0 {
        return Err(ApiError::BadRequest(
            "chunk_overlap must not be negative".to_string(),
        ));
    }
    // The same bound the chunker enforces, surfaced before anything is stored.
    if chunk_overlap >= chunk_size {
        return Err(ApiError::BadRequest(
            "chunk_overlap must be smaller than chunk_size".to_string(),
        ));
    }

    state
        .registry
        .get_agent(&payload.agent_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;

    let created = state
        .registry
        .create_knowledge_base(&NewKnowledgeBase {
            name: name.to_string(),
            document: payload.document,
            chunk_size,
            chunk_overlap,
            agent_id: payload.agent_id,
            embedding_model: payload.embedding_model.trim().to_string(),
        })
        .await?;
    // The creation response mirrors a listing row; the document body is only
    // served from the single-row endpoint.
    let summary = KnowledgeBaseSummary::from(&created);
    Ok((
        StatusCode::CREATED,
        Json(json!({"knowledge_base": summary})),
    ))
}

pub async fn get_knowledge_base(
    State(state): State<Arc<AppState>>,
    Path(knowledge_base_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let knowledge_base = state
        .registry
        .get_knowledge_base(&knowledge_base_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Knowledge base not found".to_string()))?;
    Ok(Json(json!({"knowledge_base": knowledge_base})))
}

pub async fn delete_knowledge_base(
    State(state): State<Arc<AppState>>,
    Path(knowledge_base_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Sessions go first so a reused id can never serve stale vectors.
    state
        .sessions
        .invalidate_knowledge_base(&knowledge_base_id)
        .await;

    if !state
        .registry
        .delete_knowledge_base(&knowledge_base_id)
        .await?
    {
        return Err(ApiError::NotFound(
            "Knowledge base not found".to_string(),
        ));
    }

    // A query that read the row before the delete can repopulate the cache
    // after the first sweep. Sweep again now that the row is gone.
    state
        .sessions
        .invalidate_knowledge_base(&knowledge_base_id)
        .await;
    Ok(StatusCode::NO_CONTENT)
}
