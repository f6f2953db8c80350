use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The customer.
    User,
    /// The automated responder.
    Assistant,
    /// Service-generated notices, and anything the store could not classify.
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Parse a stored role name. Unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a chat session.
///
/// `Active -> Escalated` when a verdict escalates (terminal for automated
/// handling), `Active -> Resolved` when the user starts over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Resolved,
    Escalated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Resolved => "resolved",
            SessionStatus::Escalated => "escalated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SessionStatus::Active),
            "resolved" => Some(SessionStatus::Resolved),
            "escalated" => Some(SessionStatus::Escalated),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a conversation was handed to a human.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscalationReason {
    #[serde(rename = "User requested human support")]
    HumanRequested,
    #[serde(rename = "Multiple low-confidence responses")]
    RepeatedLowConfidence,
    #[serde(rename = "Complex multi-part question")]
    ComplexQuestion,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::HumanRequested => "User requested human support",
            EscalationReason::RepeatedLowConfidence => "Multiple low-confidence responses",
            EscalationReason::ComplexQuestion => "Complex multi-part question",
        }
    }
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Knowledge base
// =============================================================================

/// One knowledge-base item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub category: String,
    /// Keywords in their curated order.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl FaqEntry {
    /// Build an entry with a fresh identifier.
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        category: impl Into<String>,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            answer: answer.into(),
            category: category.into(),
            keywords,
        }
    }
}

// =============================================================================
// Engine inputs and outputs
// =============================================================================

/// A single turn of the conversation window, oldest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

impl HistoryTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Build a turn from a raw stored row.
    ///
    /// A row with a missing or unknown role, or missing content, becomes an
    /// empty `System` turn so it can never satisfy any escalation heuristic.
    pub fn from_raw(role: Option<&str>, content: Option<&str>) -> Self {
        match (role.and_then(Role::parse), content) {
            (Some(role), Some(content)) => Self::new(role, content),
            _ => Self::new(Role::System, String::new()),
        }
    }
}

/// Best FAQ for a query, borrowed from the candidate set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchResult<'a> {
    /// `None` when no entry scored above zero.
    pub faq: Option<&'a FaqEntry>,
    /// Raw additive score of the winning entry.
    pub score: u32,
    /// Score normalized into `[0, 1]`.
    pub confidence: f64,
}

impl<'a> MatchResult<'a> {
    pub fn none() -> Self {
        Self {
            faq: None,
            score: 0,
            confidence: 0.0,
        }
    }

    pub fn is_match(&self) -> bool {
        self.faq.is_some()
    }
}

/// Outcome of one turn of the decision engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub response: String,
    pub escalate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EscalationReason>,
}

impl Verdict {
    pub fn answer(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            escalate: false,
            reason: None,
        }
    }

    pub fn escalate(response: impl Into<String>, reason: EscalationReason) -> Self {
        Self {
            response: response.into(),
            escalate: true,
            reason: Some(reason),
        }
    }
}

// =============================================================================
// Persisted records
// =============================================================================

/// A conversation between one user and the service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: String,
    pub status: SessionStatus,
    pub escalated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// A fresh active session for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            status: SessionStatus::Active,
            escalated: false,
            escalation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Matching diagnostics stored alongside an assistant reply.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_faq_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_faq_category: Option<String>,
}

/// A persisted chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(session_id: Uuid, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_names() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("moderator"), None);
        assert_eq!(Role::parse("USER"), None);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_session_status_parse() {
        assert_eq!(SessionStatus::parse("active"), Some(SessionStatus::Active));
        assert_eq!(SessionStatus::parse("resolved"), Some(SessionStatus::Resolved));
        assert_eq!(SessionStatus::parse("escalated"), Some(SessionStatus::Escalated));
        assert_eq!(SessionStatus::parse("closed"), None);
        assert_eq!(SessionStatus::default(), SessionStatus::Active);
    }

    #[test]
    fn test_escalation_reason_text() {
        assert_eq!(
            EscalationReason::HumanRequested.to_string(),
            "User requested human support"
        );
        assert_eq!(
            EscalationReason::RepeatedLowConfidence.to_string(),
            "Multiple low-confidence responses"
        );
        assert_eq!(
            EscalationReason::ComplexQuestion.to_string(),
            "Complex multi-part question"
        );
    }

    #[test]
    fn test_escalation_reason_serializes_as_text() {
        let json = serde_json::to_string(&EscalationReason::ComplexQuestion).unwrap();
        assert_eq!(json, "\"Complex multi-part question\"");
        let back: EscalationReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EscalationReason::ComplexQuestion);
    }

    #[test]
    fn test_history_turn_from_raw_valid() {
        let turn = HistoryTurn::from_raw(Some("assistant"), Some("hello"));
        assert_eq!(turn, HistoryTurn::assistant("hello"));
    }

    #[test]
    fn test_history_turn_from_raw_malformed_is_empty_system() {
        let cases = [
            (None, Some("content")),
            (Some("user"), None),
            (Some("bot"), Some("I'm not sure")),
            (None, None),
        ];
        for (role, content) in cases {
            let turn = HistoryTurn::from_raw(role, content);
            assert_eq!(turn.role, Role::System);
            assert!(turn.content.is_empty());
        }
    }

    #[test]
    fn test_match_result_none() {
        let result = MatchResult::none();
        assert!(!result.is_match());
        assert_eq!(result.score, 0);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_verdict_constructors() {
        let v = Verdict::answer("hi");
        assert!(!v.escalate);
        assert!(v.reason.is_none());

        let v = Verdict::escalate("bye", EscalationReason::HumanRequested);
        assert!(v.escalate);
        assert_eq!(v.reason, Some(EscalationReason::HumanRequested));
    }

    #[test]
    fn test_verdict_json_omits_missing_reason() {
        let json = serde_json::to_value(Verdict::answer("ok")).unwrap();
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_new_session_is_active() {
        let session = ChatSession::new("user-1");
        assert!(session.is_active());
        assert!(!session.escalated);
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn test_chat_message_metadata_serialization() {
        let msg = ChatMessage::new(Uuid::nil(), Role::Assistant, "answer").with_metadata(
            MessageMetadata {
                confidence: 0.5,
                matched_faq_id: None,
                matched_faq_category: Some("billing".to_string()),
            },
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["metadata"]["confidence"], 0.5);
        assert_eq!(json["metadata"]["matched_faq_category"], "billing");
        assert!(json["metadata"].get("matched_faq_id").is_none());
    }
}
