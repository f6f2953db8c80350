//! Application state shared across all route handlers.
//!
//! AppState holds references to all services and shared resources.
//! It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::types::ChatMessage;
use helpdesk_engine::SupportOrchestrator;
use helpdesk_storage::{Database, SqliteConversationStore};

/// The orchestrator as wired by the server.
pub type Orchestrator = SupportOrchestrator<SqliteConversationStore>;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<HelpdeskConfig>,
    /// Turn handling over the conversation store.
    pub orchestrator: Arc<Orchestrator>,
    /// SQLite-backed conversation store.
    pub store: Arc<SqliteConversationStore>,
    /// Broadcast sender for committed messages (SSE).
    pub event_tx: broadcast::Sender<ChatMessage>,
    /// Bearer token required on protected routes. `None` disables auth.
    pub api_token: Option<String>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState over an opened database.
    pub fn new(config: HelpdeskConfig, database: Database) -> Self {
        let store = Arc::new(SqliteConversationStore::new(Arc::new(database)));
        let orchestrator = Arc::new(SupportOrchestrator::from_config(Arc::clone(&store), &config));
        let api_token = if config.server.require_auth {
            config.server.api_token.clone()
        } else {
            None
        };
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config: Arc::new(config),
            orchestrator,
            store,
            event_tx,
            api_token,
            start_time: Instant::now(),
        }
    }

    /// Publish messages to stream subscribers. Having none is fine.
    pub fn publish(&self, messages: impl IntoIterator<Item = ChatMessage>) {
        for message in messages {
            let _ = self.event_tx.send(message);
        }
    }
}
