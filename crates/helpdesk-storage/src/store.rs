//! SQLite implementation of the conversation store.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::store::{ConversationStore, SessionUpdate, TurnRecord};
use helpdesk_core::types::{ChatMessage, ChatSession, FaqEntry, HistoryTurn};

use crate::db::Database;
use crate::repository::{
    escalate_session_in, find_session_in, insert_message_in, insert_session_in, touch_session_in,
    FaqRepository, MessageRepository, SessionRepository,
};

/// Conversation store backed by a single SQLite database.
pub struct SqliteConversationStore {
    db: Arc<Database>,
    faqs: FaqRepository,
    sessions: SessionRepository,
    messages: MessageRepository,
}

impl SqliteConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            faqs: FaqRepository::new(Arc::clone(&db)),
            sessions: SessionRepository::new(Arc::clone(&db)),
            messages: MessageRepository::new(Arc::clone(&db)),
            db,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Replace the knowledge base.
    pub fn replace_faqs(&self, faqs: &[FaqEntry]) -> Result<()> {
        self.faqs.replace_all(faqs)
    }

    pub fn faq_count(&self) -> Result<u64> {
        self.faqs.count()
    }
}

impl ConversationStore for SqliteConversationStore {
    fn create_session(&self, user_id: &str) -> Result<ChatSession> {
        self.sessions.create(user_id)
    }

    fn get_session(&self, session_id: Uuid) -> Result<Option<ChatSession>> {
        self.sessions.find_by_id(session_id)
    }

    fn find_active_session(&self, user_id: &str) -> Result<Option<ChatSession>> {
        self.sessions.find_active_for_user(user_id)
    }

    fn recent_history(&self, session_id: Uuid, limit: usize) -> Result<Vec<HistoryTurn>> {
        self.messages.recent_turns(session_id, limit)
    }

    fn list_faqs(&self) -> Result<Vec<FaqEntry>> {
        self.faqs.list()
    }

    fn commit_turn(&self, turn: &TurnRecord) -> Result<ChatMessage> {
        self.db.with_transaction(|tx| {
            if let Some(session) = &turn.new_session {
                insert_session_in(tx, session)?;
            }

            let session = find_session_in(tx, turn.session_id)?
                .ok_or_else(|| HelpdeskError::NotFound(format!("session {}", turn.session_id)))?;
            if !session.is_active() {
                return Err(HelpdeskError::Validation(format!(
                    "session {} is {}",
                    session.id, session.status
                )));
            }

            insert_message_in(tx, &turn.user_message)?;
            insert_message_in(tx, &turn.assistant_message)?;

            let now = Utc::now();
            match turn.update {
                SessionUpdate::Touch => touch_session_in(tx, turn.session_id, now)?,
                SessionUpdate::Escalate(reason) => {
                    escalate_session_in(tx, turn.session_id, reason, now)?
                }
            };

            debug!(session_id = %turn.session_id, update = ?turn.update, "Turn committed");
            Ok(turn.assistant_message.clone())
        })
    }

    fn resolve_session(&self, session_id: Uuid) -> Result<()> {
        if self.sessions.resolve(session_id)? {
            return Ok(());
        }
        match self.sessions.find_by_id(session_id)? {
            Some(session) => Err(HelpdeskError::Validation(format!(
                "session {} is {}",
                session.id, session.status
            ))),
            None => Err(HelpdeskError::NotFound(format!("session {}", session_id))),
        }
    }

    fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.messages.list_for_session(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::types::{EscalationReason, Role, SessionStatus};

    fn store() -> SqliteConversationStore {
        SqliteConversationStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn turn(session_id: Uuid, question: &str, answer: &str, update: SessionUpdate) -> TurnRecord {
        TurnRecord {
            session_id,
            new_session: None,
            user_message: ChatMessage::new(session_id, Role::User, question),
            assistant_message: ChatMessage::new(session_id, Role::Assistant, answer),
            update,
        }
    }

    #[test]
    fn test_commit_turn_appends_both_messages() {
        let store = store();
        let session = store.create_session("user-1").unwrap();

        let stored = store
            .commit_turn(&turn(session.id, "hi", "hello", SessionUpdate::Touch))
            .unwrap();
        assert_eq!(stored.content, "hello");

        let history = store.recent_history(session.id, 10).unwrap();
        assert_eq!(
            history,
            vec![HistoryTurn::user("hi"), HistoryTurn::assistant("hello")]
        );
    }

    #[test]
    fn test_commit_turn_touch_bumps_updated_at() {
        let store = store();
        let session = store.create_session("user-1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .commit_turn(&turn(session.id, "hi", "hello", SessionUpdate::Touch))
            .unwrap();

        let updated = store.get_session(session.id).unwrap().unwrap();
        assert!(updated.updated_at > session.updated_at);
        assert_eq!(updated.status, SessionStatus::Active);
    }

    #[test]
    fn test_commit_turn_escalates() {
        let store = store();
        let session = store.create_session("user-1").unwrap();
        store
            .commit_turn(&turn(
                session.id,
                "human please",
                "connecting you",
                SessionUpdate::Escalate(EscalationReason::HumanRequested),
            ))
            .unwrap();

        let updated = store.get_session(session.id).unwrap().unwrap();
        assert_eq!(updated.status, SessionStatus::Escalated);
        assert!(updated.escalated);
        assert_eq!(
            updated.escalation_reason.as_deref(),
            Some("User requested human support")
        );
        assert!(store.find_active_session("user-1").unwrap().is_none());
    }

    #[test]
    fn test_commit_turn_unknown_session_writes_nothing() {
        let store = store();
        let result = store.commit_turn(&turn(Uuid::new_v4(), "hi", "hello", SessionUpdate::Touch));
        assert!(matches!(result, Err(HelpdeskError::NotFound(_))));
    }

    #[test]
    fn test_commit_turn_is_atomic() {
        let store = store();
        let session = store.create_session("user-1").unwrap();

        // The reply reuses the user message id, so the second insert fails.
        let mut record = turn(session.id, "hi", "hello", SessionUpdate::Touch);
        record.assistant_message.id = record.user_message.id;
        assert!(store.commit_turn(&record).is_err());

        assert!(store.list_messages(session.id).unwrap().is_empty());
    }

    #[test]
    fn test_commit_turn_creates_new_session() {
        let store = store();
        let session = ChatSession::new("user-1");
        let mut record = turn(session.id, "hi", "hello", SessionUpdate::Touch);
        record.new_session = Some(session.clone());
        store.commit_turn(&record).unwrap();

        let active = store.find_active_session("user-1").unwrap().unwrap();
        assert_eq!(active.id, session.id);
        assert_eq!(store.list_messages(session.id).unwrap().len(), 2);
    }

    #[test]
    fn test_failed_first_turn_leaves_no_session() {
        let store = store();
        let session = ChatSession::new("user-1");
        let mut record = turn(session.id, "hi", "hello", SessionUpdate::Touch);
        record.new_session = Some(session.clone());
        record.assistant_message.id = record.user_message.id;

        assert!(store.commit_turn(&record).is_err());
        assert!(store.get_session(session.id).unwrap().is_none());
        assert!(store.find_active_session("user-1").unwrap().is_none());
    }

    #[test]
    fn test_commit_turn_rejects_closed_session() {
        let store = store();
        let session = store.create_session("user-1").unwrap();
        store.resolve_session(session.id).unwrap();

        let result = store.commit_turn(&turn(session.id, "hi", "hello", SessionUpdate::Touch));
        assert!(matches!(result, Err(HelpdeskError::Validation(_))));
        assert!(store.list_messages(session.id).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_session_errors() {
        let store = store();
        assert!(matches!(
            store.resolve_session(Uuid::new_v4()),
            Err(HelpdeskError::NotFound(_))
        ));

        let session = store.create_session("user-1").unwrap();
        store.resolve_session(session.id).unwrap();
        assert!(matches!(
            store.resolve_session(session.id),
            Err(HelpdeskError::Validation(_))
        ));
    }

    #[test]
    fn test_replace_and_list_faqs() {
        let store = store();
        let faqs = vec![
            FaqEntry::new("A?", "a", "general", vec!["a".to_string()]),
            FaqEntry::new("B?", "b", "billing", vec![]),
        ];
        store.replace_faqs(&faqs).unwrap();
        assert_eq!(store.list_faqs().unwrap(), faqs);
        assert_eq!(store.faq_count().unwrap(), 2);
    }
}
