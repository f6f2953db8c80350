//! Database schema migrations.
//!
//! Applies the initial schema: the faqs knowledge base, chat_sessions,
//! chat_messages and the schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use helpdesk_core::error::HelpdeskError;

/// Run all pending database migrations.
///
/// Currently implements the initial schema (version 1). Future migrations
/// can be added by checking the current version and applying incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), HelpdeskError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| HelpdeskError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| HelpdeskError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
///
/// Timestamps are Unix milliseconds. `keywords` and `metadata` hold JSON.
fn apply_v1(conn: &Connection) -> Result<(), HelpdeskError> {
    conn.execute_batch(
        "
        -- Knowledge base. `position` keeps the curated order.
        CREATE TABLE IF NOT EXISTS faqs (
            id              TEXT PRIMARY KEY NOT NULL,
            question        TEXT NOT NULL,
            answer          TEXT NOT NULL,
            category        TEXT NOT NULL DEFAULT 'general',
            keywords        TEXT NOT NULL DEFAULT '[]',
            position        INTEGER NOT NULL DEFAULT 0,
            created_at      INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
        );

        CREATE INDEX IF NOT EXISTS idx_faqs_position
            ON faqs (position ASC);

        -- Conversations.
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id                  TEXT PRIMARY KEY NOT NULL,
            user_id             TEXT NOT NULL,
            status              TEXT NOT NULL DEFAULT 'active'
                                CHECK (status IN ('active', 'resolved', 'escalated')),
            escalated           INTEGER NOT NULL DEFAULT 0,
            escalation_reason   TEXT,
            created_at          INTEGER NOT NULL,
            updated_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_sessions_user_status
            ON chat_sessions (user_id, status, created_at DESC);

        -- Messages. Role and content are nullable: rows written by other
        -- clients are read back leniently.
        CREATE TABLE IF NOT EXISTS chat_messages (
            id              TEXT PRIMARY KEY NOT NULL,
            session_id      TEXT NOT NULL,
            role            TEXT,
            content         TEXT,
            metadata        TEXT,
            created_at      INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_session
            ON chat_messages (session_id, created_at ASC);

        -- Record migration.
        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| HelpdeskError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    fn insert_session(conn: &Connection, id: &str, status: &str) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO chat_sessions (id, user_id, status, created_at, updated_at)
             VALUES (?1, 'user-1', ?2, 0, 0)",
            rusqlite::params![id, status],
        )
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        // Running again should be idempotent.
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_faqs_table_defaults() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO faqs (id, question, answer) VALUES ('f1', 'q', 'a')",
            [],
        )
        .unwrap();

        let (category, keywords): (String, String) = conn
            .query_row(
                "SELECT category, keywords FROM faqs WHERE id = 'f1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(category, "general");
        assert_eq!(keywords, "[]");
    }

    #[test]
    fn test_session_status_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        assert!(insert_session(&conn, "s1", "active").is_ok());
        assert!(insert_session(&conn, "s2", "escalated").is_ok());
        assert!(insert_session(&conn, "s3", "closed").is_err());
    }

    #[test]
    fn test_messages_require_existing_session() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let orphan = conn.execute(
            "INSERT INTO chat_messages (id, session_id, role, content, created_at)
             VALUES ('m1', 'missing', 'user', 'hi', 0)",
            [],
        );
        assert!(orphan.is_err());

        insert_session(&conn, "s1", "active").unwrap();
        conn.execute(
            "INSERT INTO chat_messages (id, session_id, role, content, created_at)
             VALUES ('m1', 's1', NULL, NULL, 0)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_deleting_session_cascades_to_messages() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        insert_session(&conn, "s1", "active").unwrap();
        conn.execute(
            "INSERT INTO chat_messages (id, session_id, role, content, created_at)
             VALUES ('m1', 's1', 'user', 'hi', 0)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM chat_sessions WHERE id = 's1'", [])
            .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
