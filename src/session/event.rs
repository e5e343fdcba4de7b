//! Events that can occur in a session

use crate::llm::LlmError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    /// Session created; elicit the opening greeting
    Begin,
    /// Free-text answer (or any typed input, including the end marker)
    UserText { text: String },
    /// Multi-choice form submission
    ChoiceSelection {
        selected: Vec<String>,
        other_text: Option<String>,
    },
    /// Re-issue the request that last failed
    Retry,
    /// Abandon the outstanding completion
    Cancel,
    /// Explicit request to generate the doctor summary
    SummaryRequested,

    // Upstream events
    AssistantReply { text: String },
    CompletionFailed { error: LlmError },
    SummaryReady { text: String },
    SummaryFailed { error: LlmError },
}
