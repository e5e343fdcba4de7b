//! Effects produced by state transitions
//!
//! Transitions are pure; anything that touches the network is handed
//! back to the runtime as an effect.

/// Effects to be executed after a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Issue a chat completion with `[system] + transcript`
    RequestCompletion,
    /// Issue the one-shot summarization call for the full transcript
    RequestSummary,
}
