//! Property-based tests for the controller and interpreter
//!
//! These verify the invariants that must hold across all inputs:
//! interpreter totality, phase monotonicity, busy rejection, and
//! transcript preservation.

use super::state::{InFlight, Session, SessionPhase};
use super::transition::{transition, TransitionError};
use super::Event;
use crate::interpreter::{interpret, QuestionKind};
use crate::llm::{ChatMessage, LlmError, LlmErrorKind};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn arb_error_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Network),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::ServerError),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::InvalidRequest),
        Just(LlmErrorKind::Malformed),
        Just(LlmErrorKind::Unknown),
    ]
}

fn arb_llm_error() -> impl Strategy<Value = LlmError> {
    (arb_error_kind(), "[a-zA-Z0-9 ]{0,30}").prop_map(|(kind, message)| LlmError::new(kind, message))
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Begin),
        ".{0,60}".prop_map(|text| Event::UserText { text }),
        (
            proptest::collection::vec("[a-zA-Z ]{1,12}", 0..4),
            proptest::option::of("[a-zA-Z ]{0,20}")
        )
            .prop_map(|(selected, other_text)| Event::ChoiceSelection {
                selected,
                other_text
            }),
        Just(Event::Retry),
        Just(Event::Cancel),
        Just(Event::SummaryRequested),
        ".{0,80}".prop_map(|text| Event::AssistantReply { text }),
        arb_llm_error().prop_map(|error| Event::CompletionFailed { error }),
        "[a-zA-Z0-9 ]{0,40}".prop_map(|text| Event::SummaryReady { text }),
        arb_llm_error().prop_map(|error| Event::SummaryFailed { error }),
    ]
}

fn arb_busy_session() -> impl Strategy<Value = Session> {
    (
        prop_oneof![
            Just(InFlight::Completion),
            Just(InFlight::CancellingCompletion),
            Just(InFlight::Summary),
        ],
        proptest::collection::vec("[a-zA-Z ]{1,20}", 0..4),
    )
        .prop_map(|(in_flight, contents)| {
            let mut session = Session::new();
            for (i, content) in contents.into_iter().enumerate() {
                session.transcript.push(if i % 2 == 0 {
                    ChatMessage::assistant(content)
                } else {
                    ChatMessage::user(content)
                });
            }
            session.in_flight = in_flight;
            session
        })
}

// ============================================================================
// Interpreter properties
// ============================================================================

proptest! {
    /// Text without an opening brace is always returned verbatim as a
    /// free-text question.
    #[test]
    fn no_brace_input_is_identity_fallback(raw in "[^{]{0,120}") {
        let q = interpret(&raw);
        prop_assert_eq!(q.kind, QuestionKind::FreeText);
        prop_assert_eq!(q.question_text, raw);
        prop_assert!(q.options.is_empty());
    }

    /// interpret is total: arbitrary input never panics and always
    /// yields a question.
    #[test]
    fn interpret_is_total(raw in ".{0,200}") {
        let q = interpret(&raw);
        if q.kind == QuestionKind::MultiChoice {
            prop_assert!(!q.options.is_empty());
        }
    }

    /// A well-formed structured question is extracted no matter what
    /// brace-free prose surrounds it.
    #[test]
    fn embedded_question_survives_surrounding_prose(
        prefix in "[^{]{0,40}",
        suffix in "[^{}]{0,40}",
        question in "[a-zA-Z0-9 ?]{1,40}",
    ) {
        let raw = format!(
            "{prefix}{{\"question_text\": \"{question}\", \"input_type\": \"text\"}}{suffix}"
        );
        let q = interpret(&raw);
        prop_assert_eq!(q.kind, QuestionKind::FreeText);
        prop_assert_eq!(q.question_text, question);
    }
}

// ============================================================================
// Controller properties
// ============================================================================

proptest! {
    /// From any reachable state, the phase never decreases across any
    /// accepted event. Only a full reset (a fresh Session) returns to
    /// Gathering.
    #[test]
    fn phase_is_monotonic(events in proptest::collection::vec(arb_event(), 0..25)) {
        let mut session = Session::new();
        for event in events {
            let before = session.phase.rank();
            if let Ok(t) = transition(&session, event) {
                prop_assert!(t.session.phase.rank() >= before);
                session = t.session;
            }
        }
    }

    /// The transcript is append-only: no accepted event ever removes
    /// or rewrites an existing entry.
    #[test]
    fn transcript_is_append_only(events in proptest::collection::vec(arb_event(), 0..25)) {
        let mut session = Session::new();
        for event in events {
            let before = session.transcript.clone();
            if let Ok(t) = transition(&session, event) {
                prop_assert!(t.session.transcript.len() >= before.len());
                prop_assert_eq!(&t.session.transcript[..before.len()], &before[..]);
                session = t.session;
            }
        }
    }

    /// While a call is outstanding, user input that would start a
    /// second call is rejected as busy.
    #[test]
    fn busy_sessions_reject_user_input(
        session in arb_busy_session(),
        text in "[a-zA-Z ]{0,30}",
    ) {
        let result = transition(&session, Event::UserText { text });
        prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);

        let result = transition(&session, Event::SummaryRequested);
        prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
    }

    /// A failed completion never loses the just-submitted user
    /// message, so a retry re-sends the same context.
    #[test]
    fn completion_failure_preserves_transcript(
        error in arb_llm_error(),
        user_text in "[a-zA-Z ]{1,30}",
    ) {
        let mut session = Session::new();
        session.transcript.push(ChatMessage::assistant("Hi, how can I help?"));
        session.transcript.push(ChatMessage::user(user_text));
        session.in_flight = InFlight::Completion;
        let before = session.transcript.clone();

        let t = transition(&session, Event::CompletionFailed { error }).unwrap();
        prop_assert_eq!(t.session.transcript, before);
        prop_assert!(t.session.pending.is_none());
        prop_assert!(t.session.last_error.is_some());
    }

    /// Once the summary exists it is immutable: no event sequence can
    /// change it.
    #[test]
    fn summary_is_immutable_once_generated(
        events in proptest::collection::vec(arb_event(), 0..25),
        summary in "[a-zA-Z0-9 ]{1,40}",
    ) {
        let mut session = Session::new();
        session.transcript.push(ChatMessage::assistant("Hello"));
        session.transcript.push(ChatMessage::user("end assessment"));
        session.phase = SessionPhase::SummaryGenerated;
        session.summary = Some(summary.clone());
        for event in events {
            if let Ok(t) = transition(&session, event) {
                session = t.session;
            }
            prop_assert_eq!(session.summary.as_deref(), Some(summary.as_str()));
        }
    }
}
