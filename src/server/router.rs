use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{agents, health, knowledge_bases, query};
use crate::state::AppState;

/// Creates the main application router with all routes and middleware.
///
/// This function sets up:
/// - CORS middleware
/// - Health check endpoint
/// - API endpoints (agents, knowledge bases, streaming query)
///
/// # Arguments
///
/// * `state` - Shared application state
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);
    Router::new()
        .route("/api/health", get(health::health))
        .route(
            "/api/agents",
            get(agents::list_agents).post(agents::create_agent),
        )
        .route(
            "/api/agents/:agent_id",
            get(agents::get_agent).delete(agents::delete_agent),
        )
        .route(
            "/api/knowledge-bases",
            get(knowledge_bases::list_knowledge_bases)
                .post(knowledge_bases::create_knowledge_base),
        )
        .route(
            "/api/knowledge-bases/:knowledge_base_id",
            get(knowledge_bases::get_knowledge_base).delete(knowledge_bases::delete_knowledge_base),
        )
        .route(
            "/api/knowledge-bases/:knowledge_base_id/query",
            post(query::query_knowledge_base),
        )
        .route(
            "/api/knowledge-bases/:knowledge_base_id/session",
            delete(query::invalidate_session),
        )
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let allowed_origins = resolve_allowed_origins(state)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-requester-id"),
        ])
}

fn resolve_allowed_origins(state: &Arc<AppState>) -> Vec<String> {
    let origins = state
        .config
        .get_value("server.cors_allowed_origins")
        .and_then(|value| value.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if origins.is_empty() {
        return default_local_origins();
    }

    origins
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8750".to_string(),
    ]
}
