//! HTTP route handlers.
//!
//! Request and response wrappers use camelCase field names; persisted
//! records (sessions, messages, FAQs) are returned as stored.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use helpdesk_core::types::{ChatMessage, ChatSession, FaqEntry};
use helpdesk_engine::ChatRequest;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSupportRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionParams {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub previous_session_id: Option<Uuid>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSupportResponse {
    pub session_id: Uuid,
    /// The stored assistant reply.
    pub message: ChatMessage,
    pub escalated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FaqListResponse {
    pub faqs: Vec<FaqEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub faq_count: u64,
}

// =============================================================================
// Handler functions
// =============================================================================

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
}

/// POST /chat-support - process one user message.
pub async fn chat_support(
    State(state): State<AppState>,
    payload: Result<Json<ChatSupportRequest>, JsonRejection>,
) -> Result<Json<ChatSupportResponse>, ApiError> {
    let Json(body) = payload.map_err(bad_json)?;

    let request = ChatRequest {
        session_id: body.session_id,
        user_id: body.user_id.unwrap_or_default(),
        message: body.message.unwrap_or_default(),
    };

    // Turns of one session wait on each other; keep that off the runtime.
    let orchestrator = state.orchestrator.clone();
    let reply = tokio::task::spawn_blocking(move || orchestrator.handle_message(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("chat task failed: {}", e)))??;

    state.publish([reply.user_message.clone(), reply.assistant_message.clone()]);

    Ok(Json(ChatSupportResponse {
        session_id: reply.session_id,
        message: reply.assistant_message,
        escalated: reply.escalated,
        escalation_reason: reply.reason.map(|r| r.to_string()),
        confidence: reply.confidence,
    }))
}

/// GET /sessions/active?userId= - most recent active session of a user.
pub async fn active_session(
    State(state): State<AppState>,
    Query(params): Query<ActiveSessionParams>,
) -> Result<Json<ChatSession>, ApiError> {
    let user_id = params.user_id.unwrap_or_default();
    state
        .orchestrator
        .active_session(&user_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no active session for user {}", user_id.trim())))
}

/// POST /sessions - start over with a fresh session.
pub async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<NewSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChatSession>), ApiError> {
    let Json(body) = payload.map_err(bad_json)?;
    let session = state.orchestrator.start_new_session(
        body.user_id.as_deref().unwrap_or_default(),
        body.previous_session_id,
    )?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /sessions/{id} - session record.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatSession>, ApiError> {
    Ok(Json(state.orchestrator.session(id)?))
}

/// GET /sessions/{id}/messages - full transcript, oldest first.
pub async fn session_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let messages = state.orchestrator.transcript(id)?;
    Ok(Json(TranscriptResponse {
        session_id: id,
        messages,
    }))
}

/// GET /sessions/{id}/stream - SSE stream of messages appended to a session.
pub async fn session_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    state.orchestrator.session(id)?;

    let rx = state.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(message) if message.session_id == id => {
            let data = serde_json::to_string(&message).unwrap_or_default();
            Some(Ok(Event::default().event("message").data(data)))
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "Stream subscriber lagged");
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// GET /faqs - knowledge base listing.
pub async fn list_faqs(State(state): State<AppState>) -> Result<Json<FaqListResponse>, ApiError> {
    let faqs = state.orchestrator.faqs()?;
    Ok(Json(FaqListResponse {
        total: faqs.len(),
        faqs,
    }))
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let uptime = state.start_time.elapsed().as_secs();
    let (status, faq_count) = match state.store.faq_count() {
        Ok(count) => ("healthy", count),
        Err(e) => {
            tracing::error!(error = %e, "Health check could not read the knowledge base");
            ("degraded", 0)
        }
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: uptime,
        faq_count,
    }))
}

// =============================================================================
// Tests
// =============================================================================
