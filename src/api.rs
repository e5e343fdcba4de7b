//! HTTP API for the intake assistant

mod handlers;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::runtime::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub default_model: String,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, default_model: impl Into<String>) -> Self {
        Self {
            sessions,
            default_model: default_model.into(),
        }
    }
}
