//! Pure state transition function
//!
//! Given the current session and one event, produce the next session
//! value plus the effects the runtime must execute. No I/O happens
//! here; the same inputs always yield the same outputs.

use super::state::{ErrorSource, InFlight, Session, SessionError, SessionPhase};
use super::{Effect, Event};
use crate::interpreter::{interpret, PendingQuestion};
use crate::llm::{ChatMessage, LlmError};
use crate::prompts::{contains_end_marker, FALLBACK_GREETING, FORCED_CLOSE_MESSAGE};
use thiserror::Error;

/// Minimum exchanged turns before the end marker is honoured, so a
/// session can't be closed before any real exchange happened
const MIN_TURNS_FOR_FORCED_END: usize = 2;

/// Marker recorded in the transcript when "other" is selected with no
/// accompanying text, so the model can ask a follow-up instead of the
/// selection being silently dropped
const OTHER_UNSPECIFIED: &str = "other (unspecified)";

/// Result of a state transition
#[derive(Debug)]
pub struct Transition {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn new(session: Session) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that reject an event without changing state
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A request is already in flight; wait for it or cancel first")]
    Busy,
    #[error("The assessment has ended; no further answers are expected")]
    AssessmentOver,
    #[error("The assessment is still in progress; finish it before requesting a summary")]
    AssessmentNotComplete,
    #[error("The summary has already been generated")]
    SummaryAlreadyGenerated,
    #[error("No failed request to retry")]
    NothingToRetry,
    #[error("No request in flight to cancel")]
    NothingToCancel,
    #[error("No options were selected")]
    EmptySelection,
    #[error("Invalid transition: {0}")]
    Invalid(String),
}

/// Pure transition function
pub fn transition(session: &Session, event: Event) -> Result<Transition, TransitionError> {
    match event {
        // ============================================================
        // Session opening
        // ============================================================
        Event::Begin => {
            if !session.transcript.is_empty()
                || session.is_busy()
                || session.phase != SessionPhase::Gathering
            {
                return Err(TransitionError::Invalid(
                    "Begin is only valid on a fresh session".to_string(),
                ));
            }
            let mut next = session.clone();
            next.in_flight = InFlight::Completion;
            Ok(Transition::new(next).with_effect(Effect::RequestCompletion))
        }

        // ============================================================
        // User answers
        // ============================================================
        Event::UserText { text } => {
            require_accepting_input(session)?;

            if contains_end_marker(&text) && session.turn_count() >= MIN_TURNS_FOR_FORCED_END {
                return Ok(Transition::new(force_termination(session, text)));
            }

            Ok(Transition::new(append_user_turn(session, text))
                .with_effect(Effect::RequestCompletion))
        }

        Event::ChoiceSelection {
            selected,
            other_text,
        } => {
            require_accepting_input(session)?;

            let answer = compose_choice_answer(&selected, other_text.as_deref());
            if answer.is_empty() {
                return Err(TransitionError::EmptySelection);
            }

            Ok(Transition::new(append_user_turn(session, answer))
                .with_effect(Effect::RequestCompletion))
        }

        Event::Retry => {
            if session.is_busy() {
                return Err(TransitionError::Busy);
            }
            if session.phase != SessionPhase::Gathering
                || session.last_error.is_none()
                || !session.awaiting_reply_to_user()
            {
                return Err(TransitionError::NothingToRetry);
            }
            let mut next = session.clone();
            next.in_flight = InFlight::Completion;
            next.last_error = None;
            Ok(Transition::new(next).with_effect(Effect::RequestCompletion))
        }

        Event::Cancel => match session.in_flight {
            InFlight::Completion => {
                let mut next = session.clone();
                next.in_flight = InFlight::CancellingCompletion;
                Ok(Transition::new(next))
            }
            _ => Err(TransitionError::NothingToCancel),
        },

        // ============================================================
        // Completion outcomes
        // ============================================================
        Event::AssistantReply { text } => match session.in_flight {
            InFlight::Completion => Ok(Transition::new(accept_assistant_turn(session, &text))),
            // Cancelled: discard the reply, append nothing
            InFlight::CancellingCompletion => Ok(Transition::new(record_failure(
                session,
                &LlmError::network("Request cancelled"),
                ErrorSource::Completion,
            ))),
            _ => Err(TransitionError::Invalid(
                "No completion outstanding".to_string(),
            )),
        },

        Event::CompletionFailed { error } => match session.in_flight {
            InFlight::Completion => {
                // The opening call gets a canned greeting instead of an
                // error screen; everything else surfaces as retryable.
                if session.transcript.is_empty() {
                    Ok(Transition::new(accept_assistant_turn(
                        session,
                        FALLBACK_GREETING,
                    )))
                } else {
                    Ok(Transition::new(record_failure(
                        session,
                        &error,
                        ErrorSource::Completion,
                    )))
                }
            }
            InFlight::CancellingCompletion => Ok(Transition::new(record_failure(
                session,
                &LlmError::network("Request cancelled"),
                ErrorSource::Completion,
            ))),
            _ => Err(TransitionError::Invalid(
                "No completion outstanding".to_string(),
            )),
        },

        // ============================================================
        // Summary generation
        // ============================================================
        Event::SummaryRequested => {
            if session.is_busy() {
                return Err(TransitionError::Busy);
            }
            match session.phase {
                SessionPhase::Gathering => Err(TransitionError::AssessmentNotComplete),
                SessionPhase::SummaryGenerated => Err(TransitionError::SummaryAlreadyGenerated),
                SessionPhase::AssessmentComplete => {
                    let mut next = session.clone();
                    next.in_flight = InFlight::Summary;
                    next.last_error = None;
                    Ok(Transition::new(next).with_effect(Effect::RequestSummary))
                }
            }
        }

        Event::SummaryReady { text } => {
            if session.in_flight != InFlight::Summary {
                return Err(TransitionError::Invalid(
                    "No summary request outstanding".to_string(),
                ));
            }
            let mut next = session.clone();
            next.in_flight = InFlight::None;
            next.summary = Some(text);
            next.phase = SessionPhase::SummaryGenerated;
            next.last_error = None;
            Ok(Transition::new(next))
        }

        Event::SummaryFailed { error } => {
            if session.in_flight != InFlight::Summary {
                return Err(TransitionError::Invalid(
                    "No summary request outstanding".to_string(),
                ));
            }
            // Phase stays AssessmentComplete so the user can retry
            // without re-answering the assessment.
            let mut next = session.clone();
            next.in_flight = InFlight::None;
            next.last_error = Some(SessionError {
                message: format!("Summary generation failed: {}", error.message),
                retryable: true,
                source: ErrorSource::Summary,
            });
            Ok(Transition::new(next))
        }
    }
}

// ============================================================
// Helpers
// ============================================================

fn require_accepting_input(session: &Session) -> Result<(), TransitionError> {
    if session.is_busy() {
        return Err(TransitionError::Busy);
    }
    if session.phase != SessionPhase::Gathering {
        return Err(TransitionError::AssessmentOver);
    }
    Ok(())
}

/// Append the user's turn and enter the awaiting-response null window
fn append_user_turn(session: &Session, text: String) -> Session {
    let mut next = session.clone();
    next.transcript.push(ChatMessage::user(text));
    next.pending = None;
    next.last_error = None;
    next.in_flight = InFlight::Completion;
    next
}

/// End the gathering phase locally: no upstream call, a fixed closing
/// message, a synthesized terminal question
fn force_termination(session: &Session, text: String) -> Session {
    let mut next = session.clone();
    next.transcript.push(ChatMessage::user(text));
    next.transcript
        .push(ChatMessage::assistant(FORCED_CLOSE_MESSAGE));
    next.pending = Some(PendingQuestion::terminal(FORCED_CLOSE_MESSAGE));
    next.phase = SessionPhase::AssessmentComplete;
    next.last_error = None;
    next
}

/// Normalize and record an assistant reply. The transcript stores the
/// normalized question text (the chat log shows the question, not the
/// JSON envelope); the fallback path stores the raw reply unchanged.
fn accept_assistant_turn(session: &Session, raw: &str) -> Session {
    let question = interpret(raw);
    let mut next = session.clone();
    next.transcript
        .push(ChatMessage::assistant(question.question_text.clone()));
    if question.is_terminal() {
        next.phase = SessionPhase::AssessmentComplete;
    }
    next.pending = Some(question);
    next.in_flight = InFlight::None;
    next.last_error = None;
    next
}

/// Leave the transcript untouched (the user's message stays so a retry
/// re-sends the same context), keep the pending question cleared, and
/// surface a retryable error.
fn record_failure(session: &Session, error: &LlmError, source: ErrorSource) -> Session {
    let mut next = session.clone();
    next.in_flight = InFlight::None;
    next.pending = None;
    next.last_error = Some(SessionError {
        message: error.message.clone(),
        retryable: error.kind.is_retryable(),
        source,
    });
    next
}

/// Rebuild a single free-text answer from a choice form submission.
/// A selected "other" is replaced by its accompanying free text, or by
/// an explicit unspecified marker when none was given.
fn compose_choice_answer(selected: &[String], other_text: Option<&str>) -> String {
    let parts: Vec<String> = selected
        .iter()
        .map(|value| {
            if value.eq_ignore_ascii_case("other") {
                match other_text.map(str::trim).filter(|t| !t.is_empty()) {
                    Some(text) => text.to_string(),
                    None => OTHER_UNSPECIFIED.to_string(),
                }
            } else {
                value.clone()
            }
        })
        .collect();
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::QuestionKind;
    use crate::llm::Role;

    fn gathering_session() -> Session {
        let mut session = Session::new();
        session.transcript.push(ChatMessage::assistant(
            "Hello! What brings you here today?",
        ));
        session.pending = Some(PendingQuestion::free_text(
            "Hello! What brings you here today?",
        ));
        session
    }

    fn apply(session: &Session, event: Event) -> Transition {
        transition(session, event).unwrap()
    }

    #[test]
    fn begin_requests_the_opening_completion() {
        let t = apply(&Session::new(), Event::Begin);
        assert_eq!(t.session.in_flight, InFlight::Completion);
        assert_eq!(t.effects, vec![Effect::RequestCompletion]);
    }

    #[test]
    fn begin_on_started_session_is_invalid() {
        let result = transition(&gathering_session(), Event::Begin);
        assert!(matches!(result, Err(TransitionError::Invalid(_))));
    }

    #[test]
    fn user_text_appends_and_clears_pending() {
        let t = apply(
            &gathering_session(),
            Event::UserText {
                text: "I've been tired for months".to_string(),
            },
        );
        assert_eq!(t.session.transcript.len(), 2);
        assert_eq!(t.session.transcript[1].role, Role::User);
        assert!(t.session.pending.is_none());
        assert_eq!(t.session.in_flight, InFlight::Completion);
        assert_eq!(t.effects, vec![Effect::RequestCompletion]);
    }

    #[test]
    fn user_text_rejected_while_busy() {
        let mut session = gathering_session();
        session.in_flight = InFlight::Completion;
        let result = transition(
            &session,
            Event::UserText {
                text: "hello?".to_string(),
            },
        );
        assert_eq!(result.unwrap_err(), TransitionError::Busy);
    }

    #[test]
    fn end_marker_below_threshold_follows_normal_flow() {
        // One prior turn only - the marker is ignored.
        let t = apply(
            &gathering_session(),
            Event::UserText {
                text: "END ASSESSMENT".to_string(),
            },
        );
        assert_eq!(t.session.phase, SessionPhase::Gathering);
        assert_eq!(t.effects, vec![Effect::RequestCompletion]);
    }

    #[test]
    fn end_marker_at_threshold_forces_termination_locally() {
        let mut session = gathering_session();
        session.transcript.push(ChatMessage::user("My back aches"));
        let t = apply(
            &session,
            Event::UserText {
                text: "that's everything, end assessment".to_string(),
            },
        );
        assert_eq!(t.session.phase, SessionPhase::AssessmentComplete);
        // No upstream call was made
        assert!(t.effects.is_empty());
        assert_eq!(t.session.in_flight, InFlight::None);
        // User message plus the fixed closing message were appended
        assert_eq!(t.session.transcript.len(), 4);
        assert_eq!(
            t.session.transcript.last().unwrap().content,
            FORCED_CLOSE_MESSAGE
        );
        assert!(t.session.pending.as_ref().unwrap().is_terminal());
    }

    #[test]
    fn assistant_reply_is_interpreted_and_appended() {
        let mut session = gathering_session();
        session.transcript.push(ChatMessage::user("I feel dizzy"));
        session.pending = None;
        session.in_flight = InFlight::Completion;

        let t = apply(
            &session,
            Event::AssistantReply {
                text: r#"Noted. {"question_text": "How often does the dizziness occur?", "input_type": "text"}"#
                    .to_string(),
            },
        );
        // Transcript stores the normalized question, not the envelope
        assert_eq!(
            t.session.transcript.last().unwrap().content,
            "How often does the dizziness occur?"
        );
        let pending = t.session.pending.unwrap();
        assert_eq!(pending.kind, QuestionKind::FreeText);
        assert_eq!(t.session.in_flight, InFlight::None);
    }

    #[test]
    fn terminal_reply_completes_the_assessment() {
        let mut session = gathering_session();
        session.transcript.push(ChatMessage::user("that's all"));
        session.pending = None;
        session.in_flight = InFlight::Completion;

        let t = apply(
            &session,
            Event::AssistantReply {
                text: r#"{"question_text": "Thank you for sharing. We're done.", "input_type": "end"}"#
                    .to_string(),
            },
        );
        assert_eq!(t.session.phase, SessionPhase::AssessmentComplete);
        assert!(t.session.pending.unwrap().is_terminal());
    }

    #[test]
    fn completion_failure_preserves_transcript_and_is_retryable() {
        let mut session = gathering_session();
        session.transcript.push(ChatMessage::user("I feel dizzy"));
        session.pending = None;
        session.in_flight = InFlight::Completion;
        let before = session.transcript.clone();

        let t = apply(
            &session,
            Event::CompletionFailed {
                error: LlmError::network("connection reset"),
            },
        );
        assert_eq!(t.session.transcript, before);
        assert!(t.session.pending.is_none());
        let err = t.session.last_error.unwrap();
        assert!(err.retryable);
        assert_eq!(err.source, ErrorSource::Completion);
        assert_eq!(t.session.in_flight, InFlight::None);
    }

    #[test]
    fn retry_reissues_the_same_request() {
        let mut session = gathering_session();
        session.transcript.push(ChatMessage::user("I feel dizzy"));
        session.pending = None;
        session.last_error = Some(SessionError {
            message: "connection reset".to_string(),
            retryable: true,
            source: ErrorSource::Completion,
        });

        let t = apply(&session, Event::Retry);
        assert_eq!(t.effects, vec![Effect::RequestCompletion]);
        assert_eq!(t.session.in_flight, InFlight::Completion);
        assert!(t.session.last_error.is_none());
    }

    #[test]
    fn retry_without_failure_is_rejected() {
        let result = transition(&gathering_session(), Event::Retry);
        assert_eq!(result.unwrap_err(), TransitionError::NothingToRetry);
    }

    #[test]
    fn opening_failure_falls_back_to_canned_greeting() {
        let mut session = Session::new();
        session.in_flight = InFlight::Completion;

        let t = apply(
            &session,
            Event::CompletionFailed {
                error: LlmError::server_error("upstream 502"),
            },
        );
        assert_eq!(t.session.transcript.len(), 1);
        assert_eq!(t.session.transcript[0].content, FALLBACK_GREETING);
        assert_eq!(
            t.session.pending.unwrap().kind,
            QuestionKind::FreeText
        );
        assert!(t.session.last_error.is_none());
    }

    #[test]
    fn cancel_discards_the_eventual_reply() {
        let mut session = gathering_session();
        session.transcript.push(ChatMessage::user("hm"));
        session.pending = None;
        session.in_flight = InFlight::Completion;

        let t = apply(&session, Event::Cancel);
        assert_eq!(t.session.in_flight, InFlight::CancellingCompletion);

        let t = apply(
            &t.session,
            Event::AssistantReply {
                text: "late reply".to_string(),
            },
        );
        // Nothing appended, failure recorded as retryable
        assert_eq!(t.session.transcript.len(), 3);
        assert!(t.session.last_error.unwrap().retryable);
        assert_eq!(t.session.in_flight, InFlight::None);
    }

    #[test]
    fn cancel_with_nothing_in_flight_is_rejected() {
        let result = transition(&gathering_session(), Event::Cancel);
        assert_eq!(result.unwrap_err(), TransitionError::NothingToCancel);
    }

    #[test]
    fn choice_selection_joins_values() {
        let mut session = gathering_session();
        session.pending = Some(PendingQuestion {
            question_text: "Which symptoms apply?".to_string(),
            kind: QuestionKind::MultiChoice,
            options: vec![],
            allow_multiple: true,
        });

        let t = apply(
            &session,
            Event::ChoiceSelection {
                selected: vec!["Fatigue".to_string(), "Bloating".to_string()],
                other_text: None,
            },
        );
        assert_eq!(
            t.session.transcript.last().unwrap().content,
            "Fatigue, Bloating"
        );
    }

    #[test]
    fn other_with_text_substitutes_the_text() {
        let answer = compose_choice_answer(
            &["Fatigue".to_string(), "Other".to_string()],
            Some("ringing in my ears"),
        );
        assert_eq!(answer, "Fatigue, ringing in my ears");
    }

    #[test]
    fn other_without_text_is_explicitly_unspecified() {
        let with_text = compose_choice_answer(&["Other".to_string()], Some("night sweats"));
        let without_text = compose_choice_answer(&["Other".to_string()], None);
        let blank_text = compose_choice_answer(&["Other".to_string()], Some("   "));
        assert_eq!(without_text, OTHER_UNSPECIFIED);
        assert_eq!(blank_text, OTHER_UNSPECIFIED);
        // The two submissions must stay distinguishable in the transcript
        assert_ne!(with_text, without_text);
    }

    #[test]
    fn empty_selection_is_rejected() {
        let result = transition(
            &gathering_session(),
            Event::ChoiceSelection {
                selected: vec![],
                other_text: None,
            },
        );
        assert_eq!(result.unwrap_err(), TransitionError::EmptySelection);
    }

    #[test]
    fn input_after_assessment_complete_is_rejected() {
        let mut session = gathering_session();
        session.phase = SessionPhase::AssessmentComplete;
        let result = transition(
            &session,
            Event::UserText {
                text: "one more thing".to_string(),
            },
        );
        assert_eq!(result.unwrap_err(), TransitionError::AssessmentOver);
    }

    #[test]
    fn summary_flow_happy_path() {
        let mut session = gathering_session();
        session.phase = SessionPhase::AssessmentComplete;

        let t = apply(&session, Event::SummaryRequested);
        assert_eq!(t.effects, vec![Effect::RequestSummary]);
        assert_eq!(t.session.in_flight, InFlight::Summary);

        let t = apply(
            &t.session,
            Event::SummaryReady {
                text: "Patient's Primary Stated Health Concerns: ...".to_string(),
            },
        );
        assert_eq!(t.session.phase, SessionPhase::SummaryGenerated);
        assert_eq!(
            t.session.summary.as_deref(),
            Some("Patient's Primary Stated Health Concerns: ...")
        );
    }

    #[test]
    fn summary_requires_completed_assessment() {
        let result = transition(&gathering_session(), Event::SummaryRequested);
        assert_eq!(result.unwrap_err(), TransitionError::AssessmentNotComplete);
    }

    #[test]
    fn summary_is_generated_at_most_once() {
        let mut session = gathering_session();
        session.phase = SessionPhase::SummaryGenerated;
        session.summary = Some("done".to_string());
        let result = transition(&session, Event::SummaryRequested);
        assert_eq!(result.unwrap_err(), TransitionError::SummaryAlreadyGenerated);
    }

    #[test]
    fn summary_failure_keeps_phase_and_is_retryable() {
        let mut session = gathering_session();
        session.phase = SessionPhase::AssessmentComplete;
        session.in_flight = InFlight::Summary;

        let t = apply(
            &session,
            Event::SummaryFailed {
                error: LlmError::rate_limit("429"),
            },
        );
        assert_eq!(t.session.phase, SessionPhase::AssessmentComplete);
        let err = t.session.last_error.clone().unwrap();
        assert_eq!(err.source, ErrorSource::Summary);
        assert!(err.retryable);
        // A second SummaryRequested is accepted without re-answering
        assert!(transition(&t.session, Event::SummaryRequested).is_ok());
    }
}
