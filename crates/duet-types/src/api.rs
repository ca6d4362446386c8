use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessageId;

// -- JWT Claims --

/// Claims minted by the identity service. `sub` is the participant id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveRequest {
    pub peer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub conversation_id: Uuid,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
    /// Retrying a send with the same token returns the original message.
    #[serde(default)]
    pub client_token: Option<String>,
}

// -- Read state --

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadResponse {
    pub conversation_id: Uuid,
    pub unread: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub up_to: MessageId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadCursorResponse {
    pub conversation_id: Uuid,
    pub last_read_message_id: MessageId,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub retryable: bool,
}
