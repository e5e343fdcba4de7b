//! Doctor-facing summary generation
//!
//! One-shot call that condenses the full transcript into a structured
//! report using the external summarization template. The summarizer
//! gets its own persona; the assessment system prompt is not reused.

use crate::llm::{ChatMessage, ChatRequest, ChatService, LlmError};
use crate::prompts::{build_summary_prompt, SUMMARIZER_SYSTEM_PROMPT};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Hard cap on top of the HTTP client timeout; summaries of long
/// transcripts are the slowest calls this service makes.
const SUMMARY_TIMEOUT: Duration = Duration::from_secs(300);

/// Build the summarization request for a transcript
pub fn summary_request(model: impl Into<String>, transcript: &[ChatMessage]) -> ChatRequest {
    ChatRequest::new(
        model,
        vec![
            ChatMessage::system(SUMMARIZER_SYSTEM_PROMPT),
            ChatMessage::user(build_summary_prompt(transcript)),
        ],
    )
}

/// Generate the doctor summary. The returned text is stored verbatim;
/// failures are classified for retry by the caller.
pub async fn generate_summary(
    service: Arc<dyn ChatService>,
    model: &str,
    transcript: &[ChatMessage],
) -> Result<String, LlmError> {
    let request = summary_request(model, transcript);

    match timeout(SUMMARY_TIMEOUT, service.complete(&request)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::network("Summary request timed out")),
    }
}
