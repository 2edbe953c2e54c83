//! Streaming query endpoint: retrieve context for a question, fold it into
//! the prompt, and relay the completion endpoint's NDJSON lines to the
//! caller. Failures before the stream opens surface as plain HTTP errors;
//! failures after that arrive in-band as `{"error": ...}` lines.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, HttpEmbedder, StreamEvent};
use crate::rag::{augment, RagEngine, SessionKey};
use crate::state::AppState;

const REQUESTER_HEADER: &str = "x-requester-id";
const DEFAULT_REQUESTER: &str = "local";

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub model: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

pub async fn query_knowledge_base(
    State(state): State<Arc<AppState>>,
    Path(knowledge_base_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    let question = payload.question.trim().to_string();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Question is required".to_string()));
    }
    if payload.model.trim().is_empty() {
        return Err(ApiError::BadRequest("Model is required".to_string()));
    }

    let kb = state
        .registry
        .get_knowledge_base(&knowledge_base_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Knowledge base not found".to_string()))?;
    let agent = state
        .registry
        .get_agent(&kb.agent_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent for knowledge base not found".to_string()))?;

    let key = SessionKey::new(requester_id(&headers), knowledge_base_id);
    let engine = state
        .sessions
        .get_or_build(&key, || {
            let embedder = Arc::new(HttpEmbedder::new(
                state.http.clone(),
                &agent.base_url,
                &kb.embedding_model,
                state.config.llm_settings().embed_timeout,
            ));
            let document = kb.document.clone();
            let chunk_size = kb.chunk_size as usize;
            let chunk_overlap = kb.chunk_overlap as usize;
            async move {
                let mut engine = RagEngine::new(embedder);
                engine.build(&document, chunk_size, chunk_overlap).await?;
                Ok(Arc::new(engine))
            }
        })
        .await?;

    let top_k = payload
        .top_k
        .unwrap_or_else(|| state.config.rag_settings().default_top_k);
    let context = engine.retrieve(&question, top_k).await?;
    let augmented = augment(&question, &context);

    let mut messages = payload.history;
    messages.push(ChatMessage::user(augmented));

    let rx = state
        .completions
        .stream_chat(&agent.base_url, payload.model.trim(), messages);
    Ok(ndjson_response(rx))
}

/// Forgets the caller's session for one knowledge base. The next query
/// re-chunks and re-embeds the document.
pub async fn invalidate_session(
    State(state): State<Arc<AppState>>,
    Path(knowledge_base_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let key = SessionKey::new(requester_id(&headers), knowledge_base_id);
    let removed = state.sessions.invalidate(&key).await;
    Ok(Json(json!({"invalidated": removed})))
}

fn requester_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUESTER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_REQUESTER)
        .to_string()
}

fn ndjson_response(rx: mpsc::Receiver<StreamEvent>) -> Response {
    let lines = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Some(StreamEvent::Data(line)) => {
                Some((Ok::<_, Infallible>(format!("{}\n", line)), rx))
            }
            Some(StreamEvent::Error(message)) => {
                Some((Ok(format!("{}\n", json!({"error": message}))), rx))
            }
            Some(StreamEvent::End) | None => None,
        }
    });

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response()
}
