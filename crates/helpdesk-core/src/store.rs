//! Persistence contract for conversations and the knowledge base.
//!
//! The decision engine never touches storage. The service layer fetches a
//! consistent snapshot (history + FAQs) through this trait before a turn and
//! commits the turn's results through it afterwards.

use uuid::Uuid;

use crate::error::Result;
use crate::types::{ChatMessage, ChatSession, EscalationReason, FaqEntry, HistoryTurn};

/// Session change applied together with a committed turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Bump the freshness timestamp only.
    Touch,
    /// Move the session to `escalated` and record why.
    Escalate(EscalationReason),
}

/// Everything one processed turn writes.
#[derive(Clone, Debug)]
pub struct TurnRecord {
    pub session_id: Uuid,
    /// Session opened by this turn. Inserted in the same transaction, so a
    /// failed first turn leaves no session behind.
    pub new_session: Option<ChatSession>,
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
    pub update: SessionUpdate,
}

/// Conversation store used by the support orchestrator.
///
/// `commit_turn` must be all-or-nothing: either both messages, any new
/// session and the session update are visible afterwards, or none of them
/// are.
pub trait ConversationStore: Send + Sync {
    /// Create a new `active` session for `user_id`.
    fn create_session(&self, user_id: &str) -> Result<ChatSession>;

    fn get_session(&self, session_id: Uuid) -> Result<Option<ChatSession>>;

    /// Most recently created `active` session for `user_id`, if any.
    fn find_active_session(&self, user_id: &str) -> Result<Option<ChatSession>>;

    /// Up to `limit` most recent turns of a session, oldest first.
    fn recent_history(&self, session_id: Uuid, limit: usize) -> Result<Vec<HistoryTurn>>;

    /// The full knowledge base in a stable order.
    fn list_faqs(&self) -> Result<Vec<FaqEntry>>;

    /// Persist a processed turn atomically and return the stored reply.
    fn commit_turn(&self, turn: &TurnRecord) -> Result<ChatMessage>;

    /// Mark an `active` session as `resolved`.
    fn resolve_session(&self, session_id: Uuid) -> Result<()>;

    /// Full transcript of a session, oldest first.
    fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>>;
}
