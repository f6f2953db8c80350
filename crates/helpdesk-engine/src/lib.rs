//! FAQ matching and escalation decisions for the Helpdesk support service.
//!
//! The [`DecisionEngine`] is pure: it scores a query against the knowledge
//! base with the [`FaqMatcher`] and runs the [`EscalationPolicy`] rule chain
//! over the recent conversation. The [`SupportOrchestrator`] wraps it with
//! validation, session handling and persistence through a
//! [`ConversationStore`](helpdesk_core::ConversationStore).

pub mod engine;
pub mod error;
pub mod matcher;
pub mod orchestrator;
pub mod policy;

#[cfg(test)]
mod proptests;

pub use engine::{DecisionEngine, TurnOutcome};
pub use error::SupportError;
pub use matcher::FaqMatcher;
pub use orchestrator::{ChatReply, ChatRequest, SupportOrchestrator};
pub use policy::{DecisionRule, EscalationPolicy};
