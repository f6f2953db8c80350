//! Error types for the support service.

use helpdesk_core::error::HelpdeskError;
use helpdesk_core::types::SessionStatus;

/// Errors from handling a support conversation.
#[derive(Debug, thiserror::Error)]
pub enum SupportError {
    #[error("Missing required fields: {0}")]
    MissingField(&'static str),
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("session {session_id} is {status} and no longer accepts messages")]
    SessionClosed {
        session_id: uuid::Uuid,
        status: SessionStatus,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<HelpdeskError> for SupportError {
    fn from(err: HelpdeskError) -> Self {
        SupportError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_support_error_display() {
        let err = SupportError::MissingField("userId");
        assert_eq!(err.to_string(), "Missing required fields: userId");

        let err = SupportError::MessageTooLong(2000);
        assert_eq!(
            err.to_string(),
            "message exceeds maximum length of 2000 characters"
        );

        let id = Uuid::nil();
        let err = SupportError::SessionNotFound(id);
        assert_eq!(
            err.to_string(),
            "session not found: 00000000-0000-0000-0000-000000000000"
        );

        let err = SupportError::SessionClosed {
            session_id: id,
            status: SessionStatus::Escalated,
        };
        assert!(err.to_string().contains("is escalated"));
    }

    #[test]
    fn test_support_error_from_helpdesk_error() {
        let err: SupportError = HelpdeskError::Storage("disk full".to_string()).into();
        assert!(matches!(err, SupportError::Storage(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_errors_implement_debug() {
        let dbg = format!("{:?}", SupportError::MissingField("message"));
        assert!(dbg.contains("MissingField"));
    }
}
