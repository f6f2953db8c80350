//! Shared types, configuration and errors for the Helpdesk support service.
//!
//! Every other crate in the workspace builds on the value types defined here
//! (FAQ entries, history turns, verdicts, sessions) and on the
//! [`ConversationStore`] contract the service layer persists through.

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::HelpdeskConfig;
pub use error::{HelpdeskError, Result};
pub use store::{ConversationStore, SessionUpdate, TurnRecord};
pub use types::*;
