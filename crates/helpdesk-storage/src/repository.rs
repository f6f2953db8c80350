//! Repository implementations for SQLite-backed persistence.
//!
//! Provides FaqRepository, SessionRepository and MessageRepository that
//! operate on the Database struct using raw SQL. The `*_in` functions take a
//! bare connection so several writes can share one transaction.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;
use uuid::Uuid;

use helpdesk_core::error::HelpdeskError;
use helpdesk_core::types::{
    ChatMessage, ChatSession, EscalationReason, FaqEntry, HistoryTurn, MessageMetadata, Role,
    SessionStatus,
};

use crate::db::Database;

// =============================================================================
// FAQs
// =============================================================================

/// Repository for the FAQ knowledge base.
pub struct FaqRepository {
    db: Arc<Database>,
}

impl FaqRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// All entries in curated order.
    pub fn list(&self) -> Result<Vec<FaqEntry>, HelpdeskError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, question, answer, category, keywords
                     FROM faqs
                     ORDER BY position ASC, rowid ASC",
                )
                .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| Ok(row_to_faq(row)))
                .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

            let mut faqs = Vec::new();
            for row in rows {
                let faq = row.map_err(|e| HelpdeskError::Storage(e.to_string()))??;
                faqs.push(faq);
            }
            Ok(faqs)
        })
    }

    /// Replace the whole knowledge base in one transaction.
    pub fn replace_all(&self, faqs: &[FaqEntry]) -> Result<(), HelpdeskError> {
        self.db.with_transaction(|tx| {
            tx.execute("DELETE FROM faqs", [])
                .map_err(|e| HelpdeskError::Storage(format!("Failed to clear faqs: {}", e)))?;
            for (position, faq) in faqs.iter().enumerate() {
                insert_faq_in(tx, faq, position as i64)?;
            }
            Ok(())
        })
    }

    pub fn count(&self) -> Result<u64, HelpdeskError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM faqs", [], |row| row.get(0))
                .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

fn insert_faq_in(conn: &Connection, faq: &FaqEntry, position: i64) -> Result<(), HelpdeskError> {
    let keywords = serde_json::to_string(&faq.keywords)?;
    conn.execute(
        "INSERT INTO faqs (id, question, answer, category, keywords, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            faq.id.to_string(),
            faq.question,
            faq.answer,
            faq.category,
            keywords,
            position,
        ],
    )
    .map_err(|e| HelpdeskError::Storage(format!("Failed to save faq: {}", e)))?;
    Ok(())
}

// =============================================================================
// Sessions
// =============================================================================

const SESSION_COLUMNS: &str =
    "id, user_id, status, escalated, escalation_reason, created_at, updated_at";

/// Repository for chat sessions.
pub struct SessionRepository {
    db: Arc<Database>,
}

impl SessionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new active session for `user_id`.
    pub fn create(&self, user_id: &str) -> Result<ChatSession, HelpdeskError> {
        let session = ChatSession::new(user_id);
        self.save(&session)?;
        Ok(session)
    }

    pub fn save(&self, session: &ChatSession) -> Result<(), HelpdeskError> {
        self.db.with_conn(|conn| insert_session_in(conn, session))
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<ChatSession>, HelpdeskError> {
        self.db.with_conn(|conn| find_session_in(conn, id))
    }

    /// Most recently created active session of a user.
    pub fn find_active_for_user(&self, user_id: &str) -> Result<Option<ChatSession>, HelpdeskError> {
        self.db.with_conn(|conn| {
            let result = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM chat_sessions
                         WHERE user_id = ?1 AND status = 'active'
                         ORDER BY created_at DESC, rowid DESC
                         LIMIT 1",
                        SESSION_COLUMNS
                    ),
                    rusqlite::params![user_id],
                    |row| Ok(row_to_session(row)),
                )
                .optional()
                .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

            match result {
                Some(session) => Ok(Some(session?)),
                None => Ok(None),
            }
        })
    }

    /// Move an active session to `resolved`.
    ///
    /// Returns `false` when the session does not exist or is not active.
    pub fn resolve(&self, id: Uuid) -> Result<bool, HelpdeskError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE chat_sessions SET status = 'resolved', updated_at = ?2
                     WHERE id = ?1 AND status = 'active'",
                    rusqlite::params![id.to_string(), Utc::now().timestamp_millis()],
                )
                .map_err(|e| HelpdeskError::Storage(format!("Failed to resolve session: {}", e)))?;
            Ok(changed > 0)
        })
    }
}

pub(crate) fn insert_session_in(
    conn: &Connection,
    session: &ChatSession,
) -> Result<(), HelpdeskError> {
    conn.execute(
        "INSERT INTO chat_sessions (id, user_id, status, escalated, escalation_reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            session.id.to_string(),
            session.user_id,
            session.status.as_str(),
            session.escalated as i32,
            session.escalation_reason,
            session.created_at.timestamp_millis(),
            session.updated_at.timestamp_millis(),
        ],
    )
    .map_err(|e| HelpdeskError::Storage(format!("Failed to save session: {}", e)))?;
    Ok(())
}

pub(crate) fn find_session_in(
    conn: &Connection,
    id: Uuid,
) -> Result<Option<ChatSession>, HelpdeskError> {
    let result = conn
        .query_row(
            &format!("SELECT {} FROM chat_sessions WHERE id = ?1", SESSION_COLUMNS),
            rusqlite::params![id.to_string()],
            |row| Ok(row_to_session(row)),
        )
        .optional()
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

    match result {
        Some(session) => Ok(Some(session?)),
        None => Ok(None),
    }
}

/// Bump `updated_at`. Returns the number of rows changed.
pub(crate) fn touch_session_in(
    conn: &Connection,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<usize, HelpdeskError> {
    conn.execute(
        "UPDATE chat_sessions SET updated_at = ?2 WHERE id = ?1",
        rusqlite::params![id.to_string(), at.timestamp_millis()],
    )
    .map_err(|e| HelpdeskError::Storage(format!("Failed to update session: {}", e)))
}

/// Mark a session escalated. Returns the number of rows changed.
pub(crate) fn escalate_session_in(
    conn: &Connection,
    id: Uuid,
    reason: EscalationReason,
    at: DateTime<Utc>,
) -> Result<usize, HelpdeskError> {
    conn.execute(
        "UPDATE chat_sessions
         SET status = 'escalated', escalated = 1, escalation_reason = ?2, updated_at = ?3
         WHERE id = ?1",
        rusqlite::params![id.to_string(), reason.as_str(), at.timestamp_millis()],
    )
    .map_err(|e| HelpdeskError::Storage(format!("Failed to escalate session: {}", e)))
}

// =============================================================================
// Messages
// =============================================================================

/// Repository for chat messages.
pub struct MessageRepository {
    db: Arc<Database>,
}

impl MessageRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Full transcript, oldest first.
    pub fn list_for_session(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, HelpdeskError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, role, content, metadata, created_at
                     FROM chat_messages
                     WHERE session_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )
                .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id.to_string()], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let message = row.map_err(|e| HelpdeskError::Storage(e.to_string()))??;
                messages.push(message);
            }
            Ok(messages)
        })
    }

    /// The `limit` most recent turns, oldest first.
    ///
    /// Malformed rows come back as empty `system` turns.
    pub fn recent_turns(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<HistoryTurn>, HelpdeskError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT role, content FROM (
                         SELECT role, content, created_at, rowid AS seq
                         FROM chat_messages
                         WHERE session_id = ?1
                         ORDER BY created_at DESC, rowid DESC
                         LIMIT ?2
                     )
                     ORDER BY created_at ASC, seq ASC",
                )
                .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![session_id.to_string(), limit as i64],
                    |row| {
                        let role: Option<String> = row.get(0)?;
                        let content: Option<String> = row.get(1)?;
                        Ok(HistoryTurn::from_raw(role.as_deref(), content.as_deref()))
                    },
                )
                .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

            let mut turns = Vec::new();
            for row in rows {
                turns.push(row.map_err(|e| HelpdeskError::Storage(e.to_string()))?);
            }
            Ok(turns)
        })
    }
}

pub(crate) fn insert_message_in(
    conn: &Connection,
    message: &ChatMessage,
) -> Result<(), HelpdeskError> {
    let metadata = message
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO chat_messages (id, session_id, role, content, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            message.id.to_string(),
            message.session_id.to_string(),
            message.role.as_str(),
            message.content,
            metadata,
            message.created_at.timestamp_millis(),
        ],
    )
    .map_err(|e| HelpdeskError::Storage(format!("Failed to save message: {}", e)))?;
    Ok(())
}

// =============================================================================
// Row mapping
// =============================================================================

fn parse_uuid(value: &str) -> Result<Uuid, HelpdeskError> {
    Uuid::parse_str(value).map_err(|e| HelpdeskError::Storage(format!("Invalid UUID: {}", e)))
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

fn row_to_faq(row: &rusqlite::Row<'_>) -> Result<FaqEntry, HelpdeskError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let question: String = row
        .get(1)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let answer: String = row
        .get(2)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let category: String = row
        .get(3)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let keywords_json: String = row
        .get(4)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

    Ok(FaqEntry {
        id: parse_uuid(&id_str)?,
        question,
        answer,
        category,
        keywords: serde_json::from_str(&keywords_json)?,
    })
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<ChatSession, HelpdeskError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let user_id: String = row
        .get(1)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let status_str: String = row
        .get(2)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let escalated: i32 = row
        .get(3)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let escalation_reason: Option<String> = row
        .get(4)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let created_at: i64 = row
        .get(5)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let updated_at: i64 = row
        .get(6)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

    let status = SessionStatus::parse(&status_str).ok_or_else(|| {
        HelpdeskError::Storage(format!("Invalid session status: {}", status_str))
    })?;

    Ok(ChatSession {
        id: parse_uuid(&id_str)?,
        user_id,
        status,
        escalated: escalated != 0,
        escalation_reason,
        created_at: millis_to_datetime(created_at),
        updated_at: millis_to_datetime(updated_at),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<ChatMessage, HelpdeskError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let session_str: String = row
        .get(1)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let role: Option<String> = row
        .get(2)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let content: Option<String> = row
        .get(3)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let metadata_json: Option<String> = row
        .get(4)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;
    let created_at: i64 = row
        .get(5)
        .map_err(|e| HelpdeskError::Storage(e.to_string()))?;

    let metadata = metadata_json.and_then(|json| {
        match serde_json::from_str::<MessageMetadata>(&json) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(message_id = %id_str, "Ignoring unreadable message metadata: {}", e);
                None
            }
        }
    });

    Ok(ChatMessage {
        id: parse_uuid(&id_str)?,
        session_id: parse_uuid(&session_str)?,
        role: role.as_deref().and_then(Role::parse).unwrap_or(Role::System),
        content: content.unwrap_or_default(),
        metadata,
        created_at: millis_to_datetime(created_at),
    })
}

// =============================================================================
// Tests
// =============================================================================
