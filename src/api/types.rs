//! API request and response types

use crate::llm::ChatMessage;
use crate::session::{RenderDirective, Session, SessionContext, SessionError, SessionPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to create a new session
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Optional model override; the configured default otherwise
    #[serde(default)]
    pub model: Option<String>,
}

/// Request to submit a free-text answer
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// Request to submit a choice-form answer
#[derive(Debug, Deserialize)]
pub struct ChoicesRequest {
    pub selected: Vec<String>,
    #[serde(default)]
    pub other_text: Option<String>,
}

/// Snapshot of a session, returned by most endpoints
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub phase: SessionPhase,
    pub messages: Vec<ChatMessage>,
    pub input: RenderDirective,
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
}

impl SessionResponse {
    pub fn from_session(context: &SessionContext, session: &Session) -> Self {
        Self {
            session_id: context.session_id.clone(),
            model: context.model_id.clone(),
            created_at: context.created_at,
            phase: session.phase,
            messages: session.transcript.clone(),
            input: session.render_directive(),
            busy: session.is_busy(),
            summary: session.summary.clone(),
            error: session.last_error.clone(),
        }
    }
}

/// Error body for all failure responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Health probe response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub model: String,
}
