use std::sync::Arc;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub base_url: String,
}

pub async fn list_agents(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let agents = state.registry.list_agents().await?;
    Ok(Json(json!({"agents": agents})))
}

pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAgentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Agent name is required".to_string()));
    }

    let base_url = payload.base_url.trim().trim_end_matches('/');
    if base_url.is_empty() {
        return Err(ApiError::BadRequest(
            "Agent base_url is required".to_string(),
        ));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ApiError::BadRequest(
            "Agent base_url must be an http(s) URL".to_string(),
        ));
    }

    let agent = state.registry.create_agent(name, base_url).await?;
    Ok((StatusCode::CREATED, Json(json!({"agent": agent}))))
}

pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = state
        .registry
        .get_agent(&agent_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;
    Ok(Json(json!({"agent": agent})))
}

pub async fn delete_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let in_use = state
        .registry
        .count_knowledge_bases_for_agent(&agent_id)
        .await?;
    if in_use > 0 {
        return Err(ApiError::Conflict(format!(
            "Agent is referenced by {} knowledge base(s)",
            in_use
        )));
    }

    if !state.registry.delete_agent(&agent_id).await? {
        return Err(ApiError::NotFound("Agent not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
