//! Support orchestrator: the service layer around the decision engine.
//!
//! One turn is: validate, resolve the session, read history and FAQs, run the
//! engine, then commit the user message, the reply and any session change in
//! a single store call. Turns of the same session are serialized.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use uuid::Uuid;

use helpdesk_core::config::{ConversationConfig, HelpdeskConfig};
use helpdesk_core::error::HelpdeskError;
use helpdesk_core::store::{ConversationStore, SessionUpdate, TurnRecord};
use helpdesk_core::types::{ChatMessage, ChatSession, EscalationReason, FaqEntry, Role};

use crate::engine::DecisionEngine;
use crate::error::SupportError;

/// An incoming user message.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Existing session, or `None` to start a new one.
    pub session_id: Option<Uuid>,
    pub user_id: String,
    pub message: String,
}

/// Result of one processed turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
    pub escalated: bool,
    pub reason: Option<EscalationReason>,
    pub confidence: f64,
}

/// Coordinates the store and the decision engine.
pub struct SupportOrchestrator<S: ConversationStore> {
    store: Arc<S>,
    engine: DecisionEngine,
    config: ConversationConfig,
    turn_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl<S: ConversationStore> SupportOrchestrator<S> {
    pub fn new(store: Arc<S>, engine: DecisionEngine, config: ConversationConfig) -> Self {
        Self {
            store,
            engine,
            config,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(store: Arc<S>, config: &HelpdeskConfig) -> Self {
        Self::new(
            store,
            DecisionEngine::from_config(config),
            config.conversation.clone(),
        )
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Process one user message and persist the turn.
    pub fn handle_message(&self, request: &ChatRequest) -> Result<ChatReply, SupportError> {
        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(SupportError::MissingField("userId"));
        }
        if request.message.trim().is_empty() {
            return Err(SupportError::MissingField("message"));
        }
        if request.message.chars().count() > self.config.max_message_length {
            return Err(SupportError::MessageTooLong(self.config.max_message_length));
        }

        // A new session is only persisted together with its first turn.
        let (session, is_new) = match request.session_id {
            Some(id) => (self.owned_session(id, user_id)?, false),
            None => (ChatSession::new(user_id), true),
        };

        self.with_turn_lock(session.id, || {
            self.run_turn(&session, is_new, &request.message)
        })
    }

    /// Resolve `previous` (when active and owned by the user) and open a new
    /// active session.
    pub fn start_new_session(
        &self,
        user_id: &str,
        previous: Option<Uuid>,
    ) -> Result<ChatSession, SupportError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(SupportError::MissingField("userId"));
        }

        if let Some(previous_id) = previous {
            self.with_turn_lock(previous_id, || {
                let session = self.owned_session_any_status(previous_id, user_id)?;
                if session.is_active() {
                    self.store
                        .resolve_session(previous_id)
                        .map_err(|e| self.session_error(previous_id, e))?;
                    info!(session_id = %previous_id, "Session resolved");
                } else {
                    debug!(
                        session_id = %previous_id,
                        status = %session.status,
                        "Previous session already closed"
                    );
                }
                Ok(())
            })?;
        }

        let session = self.store.create_session(user_id)?;
        info!(session_id = %session.id, user_id, "Session created");
        Ok(session)
    }

    /// Most recent active session of a user.
    pub fn active_session(&self, user_id: &str) -> Result<Option<ChatSession>, SupportError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(SupportError::MissingField("userId"));
        }
        Ok(self.store.find_active_session(user_id)?)
    }

    pub fn session(&self, session_id: Uuid) -> Result<ChatSession, SupportError> {
        self.store
            .get_session(session_id)?
            .ok_or(SupportError::SessionNotFound(session_id))
    }

    /// Full chronological transcript of a session.
    pub fn transcript(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, SupportError> {
        self.session(session_id)?;
        Ok(self.store.list_messages(session_id)?)
    }

    pub fn faqs(&self) -> Result<Vec<FaqEntry>, SupportError> {
        Ok(self.store.list_faqs()?)
    }

    // -- Private helpers --

    fn run_turn(
        &self,
        session: &ChatSession,
        is_new: bool,
        message: &str,
    ) -> Result<ChatReply, SupportError> {
        // History excludes the message being answered.
        let history = if is_new {
            Vec::new()
        } else {
            // Re-read under the turn lock: a concurrent turn may have escalated it.
            let current = self.session(session.id)?;
            if !current.is_active() {
                return Err(SupportError::SessionClosed {
                    session_id: current.id,
                    status: current.status,
                });
            }
            self.store
                .recent_history(session.id, self.config.history_limit)?
        };
        let faqs = self.store.list_faqs()?;

        let outcome = self.engine.evaluate(message, &faqs, &history);

        let user_message = ChatMessage::new(session.id, Role::User, message);
        let assistant_message =
            ChatMessage::new(session.id, Role::Assistant, outcome.verdict.response.clone())
                .with_metadata(outcome.metadata());

        let update = match outcome.verdict.reason {
            Some(reason) if outcome.verdict.escalate => SessionUpdate::Escalate(reason),
            _ => SessionUpdate::Touch,
        };

        let stored = self
            .store
            .commit_turn(&TurnRecord {
                session_id: session.id,
                new_session: is_new.then(|| session.clone()),
                user_message: user_message.clone(),
                assistant_message,
                update,
            })
            .map_err(|e| self.session_error(session.id, e))?;

        if is_new {
            info!(session_id = %session.id, user_id = %session.user_id, "Session created");
        }

        if let SessionUpdate::Escalate(reason) = update {
            warn!(
                session_id = %session.id,
                reason = %reason,
                confidence = outcome.confidence,
                "Conversation escalated"
            );
        } else {
            info!(
                session_id = %session.id,
                rule = %outcome.rule,
                confidence = outcome.confidence,
                faq_id = ?outcome.matched_faq_id,
                "Turn answered"
            );
        }

        Ok(ChatReply {
            session_id: session.id,
            user_message,
            assistant_message: stored,
            escalated: outcome.verdict.escalate,
            reason: outcome.verdict.reason,
            confidence: outcome.confidence,
        })
    }

    /// Session owned by `user_id` that still accepts messages.
    fn owned_session(&self, session_id: Uuid, user_id: &str) -> Result<ChatSession, SupportError> {
        let session = self.owned_session_any_status(session_id, user_id)?;
        if !session.is_active() {
            return Err(SupportError::SessionClosed {
                session_id,
                status: session.status,
            });
        }
        Ok(session)
    }

    /// Another user's session is reported as missing.
    fn owned_session_any_status(
        &self,
        session_id: Uuid,
        user_id: &str,
    ) -> Result<ChatSession, SupportError> {
        match self.store.get_session(session_id)? {
            Some(session) if session.user_id == user_id => Ok(session),
            _ => Err(SupportError::SessionNotFound(session_id)),
        }
    }

    /// Map a store rejection of a session write to the session's state.
    fn session_error(&self, session_id: Uuid, err: HelpdeskError) -> SupportError {
        match err {
            HelpdeskError::NotFound(_) | HelpdeskError::Validation(_) => {
                match self.store.get_session(session_id) {
                    Ok(None) => SupportError::SessionNotFound(session_id),
                    Ok(Some(session)) if !session.is_active() => SupportError::SessionClosed {
                        session_id,
                        status: session.status,
                    },
                    _ => err.into(),
                }
            }
            other => other.into(),
        }
    }

    /// Run `f` while holding the turn lock of `session_id`.
    fn with_turn_lock<T>(
        &self,
        session_id: Uuid,
        f: impl FnOnce() -> Result<T, SupportError>,
    ) -> Result<T, SupportError> {
        let lock = self.turn_lock(session_id)?;
        let guard = lock
            .lock()
            .map_err(|e| SupportError::Storage(format!("turn lock poisoned: {}", e)))?;

        let result = f();

        drop(guard);
        drop(lock);
        self.prune_turn_locks();

        result
    }

    fn turn_lock(&self, session_id: Uuid) -> Result<Arc<Mutex<()>>, SupportError> {
        let mut locks = self
            .turn_locks
            .lock()
            .map_err(|e| SupportError::Storage(format!("lock registry poisoned: {}", e)))?;
        Ok(locks.entry(session_id).or_default().clone())
    }

    /// Drop registry entries no turn is holding.
    fn prune_turn_locks(&self) {
        if let Ok(mut locks) = self.turn_locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
