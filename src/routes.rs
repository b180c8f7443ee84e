// ABOUTME: HTTP surface over the dispatch coordinator -- thin axum handlers and DTOs.
// ABOUTME: Domain failures map to distinct status codes; everything else is an opaque 500.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use parley_core::{Agent, ChatSession, Coordinator, DispatchError};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

#[derive(Debug, Serialize)]
pub struct ChatSessionDto {
    pub id: String,
    pub status: String,
    pub agent_id: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub missed_polls: i64,
}

impl From<ChatSession> for ChatSessionDto {
    fn from(session: ChatSession) -> Self {
        Self {
            id: session.id,
            status: session.status.to_string(),
            agent_id: session.agent_id,
            created_at: session.created_at,
            completed_at: session.completed_at,
            missed_polls: session.missed_polls,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AgentDto {
    pub id: String,
    pub name: String,
    pub queue_name: String,
    pub active_session_id: Option<String>,
    pub seniority: String,
    pub shift: String,
    pub online: bool,
}

impl From<Agent> for AgentDto {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            queue_name: agent.queue_name,
            active_session_id: agent.active_session_id,
            seniority: agent.seniority.to_string(),
            shift: agent.shift.to_string(),
            online: agent.online,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub chat_session_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AgentMessageRequest {
    pub agent_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub agent_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Domain failures keep their message; everything else collapses to an
/// opaque 500 with full detail in the log only.
pub fn map_dispatch_error(e: DispatchError) -> ApiError {
    match e {
        DispatchError::AgentNotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        ),
        DispatchError::AgentShiftConflict(_) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        ),
        other => {
            tracing::error!(error = %other, "An error occurred while processing the request");
            parley_core::metrics::record_error("request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "An error occurred".to_string(),
                }),
            )
        }
    }
}

fn internal_error(e: anyhow::Error) -> ApiError {
    tracing::error!(error = %e, "An error occurred while processing the request");
    parley_core::metrics::record_error("request");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "An error occurred".to_string(),
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat/create", post(create_session))
        .route("/api/chat/poll/{chat_session_id}", get(poll_session))
        .route("/api/chat/send", post(send_chat_message))
        .route("/api/chat/send/agent", post(send_agent_message))
        .route("/api/agent/connect", post(connect_agent))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "App is running" }))
}

async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<ChatSessionDto>, ApiError> {
    let session = state
        .coordinator
        .create_session()
        .await
        .map_err(internal_error)?;
    Ok(Json(session.into()))
}

async fn poll_session(
    State(state): State<AppState>,
    Path(chat_session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .coordinator
        .poll_session(&chat_session_id)
        .map_err(internal_error)?;
    Ok(StatusCode::OK)
}

async fn send_chat_message(
    State(state): State<AppState>,
    Json(payload): Json<ChatMessageRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .coordinator
        .send_client_message(&payload.chat_session_id, &payload.message)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::OK)
}

async fn send_agent_message(
    State(state): State<AppState>,
    Json(payload): Json<AgentMessageRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .coordinator
        .send_agent_message(&payload.agent_id, &payload.message)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::OK)
}

async fn connect_agent(
    State(state): State<AppState>,
    Json(payload): Json<ConnectRequest>,
) -> Result<Json<AgentDto>, ApiError> {
    let agent = state
        .coordinator
        .connect_agent(&payload.agent_id, Utc::now())
        .await
        .map_err(map_dispatch_error)?;
    Ok(Json(agent.into()))
}
