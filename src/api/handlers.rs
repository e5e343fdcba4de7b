//! HTTP request handlers

use super::types::{
    ChoicesRequest, CreateSessionRequest, ErrorResponse, HealthResponse, MessageRequest,
    SessionResponse,
};
use super::AppState;
use crate::runtime::SessionHandle;
use crate::session::{Event, TransitionError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/message", post(send_message))
        .route("/api/sessions/:id/choices", post(send_choices))
        .route("/api/sessions/:id/retry", post(retry))
        .route("/api/sessions/:id/cancel", post(cancel))
        .route("/api/sessions/:id/summary", post(generate_summary))
        .route("/api/sessions/:id/reset", post(reset_session))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        model: state.default_model.clone(),
    })
}

// ============================================================
// Session lifecycle
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let handle = state.sessions.create(req.model).await;
    Ok((StatusCode::CREATED, snapshot_response(&handle).await))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = lookup(&state, &id).await?;
    Ok(snapshot_response(&handle).await)
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = lookup(&state, &id).await?;
    handle.reset().await?;
    Ok(snapshot_response(&handle).await)
}

// ============================================================
// User turns
// ============================================================

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message text is empty".to_string()));
    }
    let handle = lookup(&state, &id).await?;
    handle.dispatch(Event::UserText { text: req.text }).await?;
    Ok(snapshot_response(&handle).await)
}

async fn send_choices(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChoicesRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = lookup(&state, &id).await?;
    handle
        .dispatch(Event::ChoiceSelection {
            selected: req.selected,
            other_text: req.other_text,
        })
        .await?;
    Ok(snapshot_response(&handle).await)
}

async fn retry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = lookup(&state, &id).await?;
    handle.dispatch(Event::Retry).await?;
    Ok(snapshot_response(&handle).await)
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = lookup(&state, &id).await?;
    handle.dispatch(Event::Cancel).await?;
    Ok(snapshot_response(&handle).await)
}

// ============================================================
// Summary
// ============================================================

async fn generate_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = lookup(&state, &id).await?;
    handle.dispatch(Event::SummaryRequested).await?;
    Ok(snapshot_response(&handle).await)
}

// ============================================================
// Helpers
// ============================================================

async fn lookup(state: &AppState, id: &str) -> Result<Arc<SessionHandle>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

async fn snapshot_response(handle: &SessionHandle) -> Json<SessionResponse> {
    let session = handle.snapshot().await;
    Json(SessionResponse::from_session(&handle.context, &session))
}

/// Errors returned by handlers
#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::EmptySelection | TransitionError::Invalid(_) => {
                AppError::BadRequest(e.to_string())
            }
            TransitionError::Busy
            | TransitionError::AssessmentOver
            | TransitionError::AssessmentNotComplete
            | TransitionError::SummaryAlreadyGenerated
            | TransitionError::NothingToRetry
            | TransitionError::NothingToCancel => AppError::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
