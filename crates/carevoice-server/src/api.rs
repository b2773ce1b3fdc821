//! HTTP handlers for service metadata and the text query endpoint.

use crate::AppState;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use carevoice_agents::IntentSummary;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

fn agent_mode(state: &AppState) -> &str {
    state
        .orchestrator
        .as_deref()
        .map(|orchestrator| orchestrator.name())
        .unwrap_or("disabled")
}

/// Handler for `GET /`.
pub async fn root_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": "CareVoice Multi-Agent Assistant",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "agent_mode": agent_mode(&state),
        "endpoints": {
            "voice_websocket": "/ws/voice",
            "text_websocket": "/ws/text",
            "health": "/health",
            "api_query": "/api/query",
            "agents": "/api/agents"
        },
        "features": [
            "Real-time voice relay with ordered response playback",
            "Rule-based multi-agent orchestration",
            "Deferred appointment cards synchronized with speech",
            "Conversation flow logging"
        ]
    }))
}

/// Handler for `GET /health`.
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "voice_live_endpoint_configured": state.voice.endpoint_configured(),
        "voice_live_key_configured": state.voice.key_configured(),
        "voice_live_model": state.voice.model,
        "orchestration_enabled": state.orchestrator.is_some(),
        "active_sessions": state.active_sessions(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub text: String,
    pub session_id: String,
    pub agent_mode: String,
}

/// Handler for `POST /api/query`.
///
/// Acknowledges the query without running the agents; full orchestration
/// happens on the WebSocket endpoints.
pub async fn query_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::info!(session_id = %session_id, "received API query");

    Ok(Json(QueryResponse {
        text: format!(
            "Agent orchestration is available. Query received: '{text}'. For the full multi-agent experience, use the voice or text WebSocket endpoint."
        ),
        session_id,
        agent_mode: agent_mode(&state).to_string(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentsResponse {
    pub agent_mode: String,
    pub intents: Vec<IntentSummary>,
}

/// Handler for `GET /api/agents`.
pub async fn agents_handler(Extension(state): Extension<Arc<AppState>>) -> Json<AgentsResponse> {
    let intents = state
        .orchestrator
        .as_ref()
        .map(|orchestrator| orchestrator.intents())
        .unwrap_or_default();
    Json(AgentsResponse {
        agent_mode: agent_mode(&state).to_string(),
        intents,
    })
}
