//! Helpdesk Storage crate - SQLite persistence for the support service.
//!
//! Provides a WAL-mode SQLite database with migrations, repositories for
//! FAQs, sessions and messages, the [`SqliteConversationStore`]
//! implementation of the conversation store contract, and JSON seeding of
//! the knowledge base.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod seed;
pub mod store;

pub use db::Database;
pub use repository::{FaqRepository, MessageRepository, SessionRepository};
pub use seed::{load_seed_file, parse_seed, seed_defaults_if_empty, seed_from_file};
pub use store::SqliteConversationStore;
