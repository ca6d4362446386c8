use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-conversation message sequence number. Starts at 1.
pub type MessageId = u64;

/// Opaque participant identifier handed to us by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A 1:1 conversation. Exactly one exists per participant pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub pair_key: String,
    pub participant_a: ParticipantId,
    pub participant_b: ParticipantId,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, who: &ParticipantId) -> bool {
        &self.participant_a == who || &self.participant_b == who
    }

    /// The participant on the other side of `who`, or `None` if `who` isn't in this conversation.
    pub fn other_participant(&self, who: &ParticipantId) -> Option<&ParticipantId> {
        if &self.participant_a == who {
            Some(&self.participant_b)
        } else if &self.participant_b == who {
            Some(&self.participant_a)
        } else {
            None
        }
    }
}

/// A stored message. Ordering within a conversation is by `id`, never by `sent_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: Uuid,
    pub sender_id: ParticipantId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePreview {
    pub id: MessageId,
    pub sender_id: ParticipantId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// One row of a participant's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    pub other_participant: ParticipantId,
    pub last_message: Option<MessagePreview>,
    pub unread_count: u64,
    /// Time of the last message, or the conversation's creation time if it has none.
    pub last_activity_at: DateTime<Utc>,
}
