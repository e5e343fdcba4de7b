//! Intake assistant server
//!
//! A Rust backend for a patient-intake chatbot: relays patient messages
//! to an upstream chat-completions API under a fixed system prompt,
//! normalizes each reply into a pending question, and generates a
//! doctor-facing summary on request.

mod api;
mod interpreter;
mod llm;
mod prompts;
mod runtime;
mod session;
mod summarizer;

use api::{create_router, AppState};
use llm::LlmConfig;
use runtime::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intake_assistant=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let port: u16 = std::env::var("INTAKE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let llm_config = LlmConfig::from_env();
    let service = llm_config.build_service().map_err(|e| {
        tracing::error!(error = %e, "Upstream configuration is incomplete");
        e
    })?;
    tracing::info!(model = %llm_config.model, "Upstream chat service configured");

    let sessions = Arc::new(SessionManager::new(service));
    let state = AppState::new(sessions, llm_config.model.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Intake assistant listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
