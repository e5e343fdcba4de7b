//! Runtime for executing sessions
//!
//! Owns the authoritative [`Session`] values and executes the effects
//! the pure transitions return. Each session admits at most one
//! outstanding upstream call; the call runs in a spawned task and posts
//! its outcome back as an event. Sessions are fully isolated - nothing
//! mutable is shared between them.

use crate::llm::{ChatMessage, ChatRequest, ChatService};
use crate::session::{transition, Effect, Event, Session, SessionContext, TransitionError};
use crate::summarizer;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Handle to one live session
pub struct SessionHandle {
    pub context: SessionContext,
    session: Arc<RwLock<Session>>,
    service: Arc<dyn ChatService>,
    /// Bumped on reset so in-flight tasks from the previous life of
    /// the session cannot deliver stale events into the new one
    epoch: Arc<AtomicU64>,
}

/// Work captured from an effect while the session lock was held
enum EffectJob {
    Completion(Vec<ChatMessage>),
    Summary(Vec<ChatMessage>),
}

impl SessionHandle {
    fn new(context: SessionContext, service: Arc<dyn ChatService>) -> Self {
        Self {
            context,
            session: Arc::new(RwLock::new(Session::new())),
            service,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Read a snapshot of the session state
    pub async fn snapshot(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Apply a user-facing event. Rejections (busy, wrong phase) are
    /// returned synchronously without changing state.
    pub async fn dispatch(&self, event: Event) -> Result<(), TransitionError> {
        // The epoch must be read while the lock is held: a reset bumps
        // it under this same lock, so a job spawned for the old session
        // can never carry the new session's epoch.
        let (jobs, spawned_at) = {
            let mut session = self.session.write().await;
            let t = transition(&session, event)?;
            tracing::debug!(
                session_id = %self.context.session_id,
                phase = ?t.session.phase,
                effects = t.effects.len(),
                "Transition applied"
            );
            *session = t.session;
            let jobs = t
                .effects
                .iter()
                .map(|effect| match effect {
                    Effect::RequestCompletion => EffectJob::Completion(session.upstream_messages()),
                    Effect::RequestSummary => EffectJob::Summary(session.transcript.clone()),
                })
                .collect::<Vec<_>>();
            (jobs, self.epoch.load(Ordering::SeqCst))
        };

        for job in jobs {
            self.spawn_job(job, spawned_at);
        }
        Ok(())
    }

    /// Replace the session with a fresh one and elicit a new greeting.
    /// Outstanding calls from the old session are orphaned; their
    /// outcomes are dropped by the epoch check.
    pub async fn reset(&self) -> Result<(), TransitionError> {
        {
            let mut session = self.session.write().await;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            *session = Session::new();
        }
        self.dispatch(Event::Begin).await
    }

    fn spawn_job(&self, job: EffectJob, spawned_at: u64) {
        let service = Arc::clone(&self.service);
        let session = Arc::clone(&self.session);
        let epoch = Arc::clone(&self.epoch);
        let model = self.context.model_id.clone();
        let session_id = self.context.session_id.clone();

        tokio::spawn(async move {
            let event = match job {
                EffectJob::Completion(messages) => {
                    let request = ChatRequest::new(model, messages);
                    match service.complete(&request).await {
                        Ok(text) => Event::AssistantReply { text },
                        Err(error) => Event::CompletionFailed { error },
                    }
                }
                EffectJob::Summary(transcript) => {
                    match summarizer::generate_summary(service, &model, &transcript).await {
                        Ok(text) => Event::SummaryReady { text },
                        Err(error) => Event::SummaryFailed { error },
                    }
                }
            };

            // The staleness check must happen under the session lock;
            // a reset bumps the epoch under this lock, so checking
            // before acquiring it leaves a window where a pre-reset
            // reply lands in the fresh session (whose Begin has it in
            // an accepting InFlight state).
            let mut guard = session.write().await;
            if epoch.load(Ordering::SeqCst) != spawned_at {
                tracing::debug!(session_id = %session_id, "Dropping upstream outcome from a reset session");
                return;
            }
            match transition(&guard, event) {
                Ok(t) => {
                    // Upstream outcomes never start another call
                    debug_assert!(t.effects.is_empty());
                    *guard = t.session;
                }
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Discarding upstream outcome");
                }
            }
        });
    }
}

/// Manager for all live sessions
pub struct SessionManager {
    service: Arc<dyn ChatService>,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionManager {
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        Self {
            service,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session and kick off the opening greeting
    pub async fn create(&self, model_override: Option<String>) -> Arc<SessionHandle> {
        let session_id = Uuid::new_v4().to_string();
        let model = model_override.unwrap_or_else(|| self.service.model_id().to_string());
        let context = SessionContext::new(session_id.clone(), model);

        let handle = Arc::new(SessionHandle::new(context, Arc::clone(&self.service)));
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Arc::clone(&handle));

        tracing::info!(session_id = %session_id, model = %handle.context.model_id, "Session created");

        // Begin on a fresh session cannot be rejected
        let _ = handle.dispatch(Event::Begin).await;
        handle
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drop a session and its transcript. Outstanding calls finish
    /// against the detached handle and are never observable again.
    pub async fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            tracing::info!(session_id = %session_id, "Session removed");
        }
        removed
    }
}

// ============================================================
// Test support
// ============================================================
