//! Axum route handlers for the Session API.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::notification::NotificationEmail;
use crate::pipeline::agents::AgentKind;
use crate::pipeline::ingest::{extract_documents, UploadedFile};
use crate::pipeline::runner::{Session, TurnEvent};
use crate::pipeline::state::StateKey;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub active_agent: AgentKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub session_id: Uuid,
    pub active_agent: AgentKind,
    pub finished: bool,
    /// True when an agent step failed; the session is unchanged and can retry.
    pub failed: bool,
    pub events: Vec<TurnEvent>,
}

/// Session overview. Raw state values are never exposed, only which keys exist.
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active_agent: AgentKind,
    pub finished: bool,
    pub message_count: usize,
    pub available_keys: Vec<StateKey>,
    pub notifications: Vec<NotificationEmail>,
}

#[derive(Debug, Serialize)]
pub struct AgentInfo {
    pub name: AgentKind,
    pub description: &'static str,
    pub reads: &'static [StateKey],
    pub writes: StateKey,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/agents
pub async fn handle_list_agents() -> Json<Vec<AgentInfo>> {
    Json(
        AgentKind::ALL
            .into_iter()
            .map(|agent| AgentInfo {
                name: agent,
                description: agent.description(),
                reads: agent.reads(),
                writes: agent.writes(),
            })
            .collect(),
    )
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    if request.user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id cannot be empty".to_string()));
    }

    let handle = state.sessions.create(request.user_id.trim()).await;
    let session = handle.lock().await;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id(),
            active_agent: session.active_agent(),
            created_at: session.created_at(),
        }),
    ))
}

/// POST /api/v1/sessions/:id/messages
///
/// Runs one turn. Recoverable agent failures come back as a `turn_failed`
/// event with status 200 so the client can show it and retry.
pub async fn handle_send_message(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }
    let handle = find_session(&state, session_id).await?;
    run_turn(&state, handle, session_id, &request.message)
        .await
        .map(Json)
}

/// POST /api/v1/sessions/:id/uploads
///
/// Accepts multipart resume or job description files and sends their
/// extracted text to the active agent as one message.
pub async fn handle_upload(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<TurnResponse>, AppError> {
    let handle = find_session(&state, session_id).await?;
    let limit = state.max_upload_bytes;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit, "Invalid multipart body"))?
    {
        let name = field
            .file_name()
            .or(field.name())
            .unwrap_or("upload")
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit, &format!("Failed to read '{name}'")))?;
        files.push(UploadedFile {
            name,
            content_type,
            data,
        });
    }

    let message = tokio::task::spawn_blocking(move || extract_documents(&files))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Document extraction panicked: {e}")))??;

    run_turn(&state, handle, session_id, &message).await.map(Json)
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    let handle = find_session(&state, session_id).await?;
    let session = handle.lock().await;

    Ok(Json(SessionStatusResponse {
        session_id,
        user_id: session.user_id().to_string(),
        created_at: session.created_at(),
        updated_at: session.updated_at(),
        active_agent: session.active_agent(),
        finished: session.is_finished(),
        message_count: session.history().len(),
        available_keys: session.state().available_keys(),
        notifications: session
            .state()
            .notifications()
            .map(<[NotificationEmail]>::to_vec)
            .unwrap_or_default(),
    }))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_end_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {session_id} not found")))
    }
}

async fn run_turn(
    state: &AppState,
    handle: Arc<Mutex<Session>>,
    session_id: Uuid,
    message: &str,
) -> Result<TurnResponse, AppError> {
    let mut session = handle.lock().await;

    let outcome = state.pipeline.run_turn(&mut session, message).await?;

    Ok(TurnResponse {
        session_id,
        active_agent: outcome.active_agent,
        finished: outcome.finished,
        failed: outcome.failed(),
        events: outcome.events,
    })
}

async fn find_session(state: &AppState, session_id: Uuid) -> Result<Arc<Mutex<Session>>, AppError> {
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
}

fn multipart_error(err: MultipartError, limit: usize, context: &str) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::Validation(format!("{context}: {err}"))
    }
}
