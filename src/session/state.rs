//! Session state types

use crate::interpreter::{ChoiceOption, PendingQuestion, QuestionKind};
use crate::llm::{ChatMessage, Role};
use crate::prompts::SYSTEM_PROMPT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of an assessment session. Monotonic: transitions only move
/// forward; only a full session reset returns to `Gathering`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Gathering,
    AssessmentComplete,
    SummaryGenerated,
}

impl SessionPhase {
    /// Ordering rank, used to assert monotonicity
    pub fn rank(self) -> u8 {
        match self {
            SessionPhase::Gathering => 0,
            SessionPhase::AssessmentComplete => 1,
            SessionPhase::SummaryGenerated => 2,
        }
    }
}

/// The at-most-one outstanding upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InFlight {
    #[default]
    None,
    /// A chat completion is outstanding
    Completion,
    /// The user cancelled; the eventual completion outcome is discarded
    CancellingCompletion,
    /// The summarization call is outstanding
    Summary,
}

/// Which operation a recorded failure belongs to, so summary failures
/// surface distinctly from question-path failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Completion,
    Summary,
}

/// A surfaced, user-visible failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionError {
    pub message: String,
    pub retryable: bool,
    pub source: ErrorSource,
}

/// The input affordance the UI should present for the next turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderDirective {
    /// Free-text input box
    TextInput { prompt: String },
    /// Multi-select or radio form
    ChoiceForm {
        prompt: String,
        options: Vec<ChoiceOption>,
        allow_multiple: bool,
    },
    /// No further input expected
    Terminal { message: String },
    /// A call is outstanding (or no question has arrived yet);
    /// input is disabled
    Waiting,
}

/// Immutable configuration for a session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            model_id: model_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Full state of one assessment session. The transcript is append-only
/// and never contains the system prompt; [`Session::upstream_messages`]
/// prepends it when building a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub transcript: Vec<ChatMessage>,
    pub pending: Option<PendingQuestion>,
    pub phase: SessionPhase,
    pub in_flight: InFlight,
    pub summary: Option<String>,
    pub last_error: Option<SessionError>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while an upstream call is outstanding (including one whose
    /// outcome will be discarded after a cancel)
    pub fn is_busy(&self) -> bool {
        self.in_flight != InFlight::None
    }

    /// Message list for the next completion request: exactly one
    /// system entry followed by the full transcript.
    pub fn upstream_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.transcript.len() + 1);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(self.transcript.iter().cloned());
        messages
    }

    /// Count of turns already exchanged, gating forced termination
    pub fn turn_count(&self) -> usize {
        self.transcript.len()
    }

    /// True when the last transcript entry is a user message whose
    /// reply never arrived - the precondition for a retry.
    pub fn awaiting_reply_to_user(&self) -> bool {
        self.transcript
            .last()
            .is_some_and(|m| m.role == Role::User)
    }

    /// Derive what the UI should render right now
    pub fn render_directive(&self) -> RenderDirective {
        if self.is_busy() {
            return RenderDirective::Waiting;
        }
        match &self.pending {
            Some(q) => match q.kind {
                QuestionKind::FreeText => RenderDirective::TextInput {
                    prompt: q.question_text.clone(),
                },
                QuestionKind::MultiChoice => RenderDirective::ChoiceForm {
                    prompt: q.question_text.clone(),
                    options: q.options.clone(),
                    allow_multiple: q.allow_multiple,
                },
                QuestionKind::Terminal => RenderDirective::Terminal {
                    message: q.question_text.clone(),
                },
            },
            // The null window between answer submission and the next
            // assistant turn, or a failed call awaiting retry
            None => RenderDirective::Waiting,
        }
    }
}
