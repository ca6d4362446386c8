use thiserror::Error;

pub type Result<T> = std::result::Result<T, DmError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DmError {
    /// Both sides of the pair are the same participant, or one side is blank.
    #[error("a conversation needs two distinct, non-empty participants")]
    InvalidParticipants,

    #[error("participant is not part of this conversation")]
    NotAParticipant,

    #[error("conversation not found")]
    ConversationNotFound,

    #[error("message body is empty")]
    EmptyBody,

    #[error("message body exceeds {max} characters")]
    BodyTooLong { max: usize },

    /// Transient storage failure. Every operation is idempotent or additive, so retrying is safe.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl DmError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Stable machine-readable name, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParticipants => "invalid_participants",
            Self::NotAParticipant => "not_a_participant",
            Self::ConversationNotFound => "conversation_not_found",
            Self::EmptyBody => "empty_body",
            Self::BodyTooLong { .. } => "body_too_long",
            Self::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_errors_are_retryable() {
        assert!(DmError::storage("database is locked").is_retryable());
        assert!(!DmError::InvalidParticipants.is_retryable());
        assert!(!DmError::NotAParticipant.is_retryable());
        assert!(!DmError::ConversationNotFound.is_retryable());
        assert!(!DmError::EmptyBody.is_retryable());
    }

    #[test]
    fn storage_helper_keeps_message() {
        let err = DmError::storage("disk I/O error");
        assert_eq!(err.to_string(), "storage unavailable: disk I/O error");
        assert_eq!(err.kind(), "storage_unavailable");
    }
}
