//! Storage contract.
//!
//! Any engine with a unique-constraint primitive and read-committed (or
//! stronger) isolation can implement these. Each method is a single
//! transaction; no lock is held across calls.

use duet_types::models::{Conversation, ConversationSummary, Message, MessageId, ParticipantId};
use uuid::Uuid;

use crate::error::Result;
use crate::key::PairKey;

pub trait ConversationStore: Send + Sync {
    fn find_by_pair_key(&self, key: &PairKey) -> Result<Option<Conversation>>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>>;

    /// Insert a conversation for `key` unless one exists.
    ///
    /// Losing a race on the `pair_key` constraint is not an error: the
    /// implementation re-reads and returns the winning row.
    fn create_if_absent(
        &self,
        key: &PairKey,
        a: &ParticipantId,
        b: &ParticipantId,
    ) -> Result<Conversation>;
}

/// A message that passed body validation and is ready to be sequenced.
#[derive(Debug, Clone, Copy)]
pub struct NewMessage<'a> {
    pub conversation_id: Uuid,
    pub sender_id: &'a ParticipantId,
    pub body: &'a str,
    pub client_token: Option<&'a str>,
}

pub trait MessageStore: Send + Sync {
    /// Allocate the next id for the conversation and persist the message.
    ///
    /// Fails with `ConversationNotFound` or `NotAParticipant`. When
    /// `client_token` matches an earlier append by the same sender, the
    /// earlier message is returned and nothing is written.
    fn append_message(&self, msg: &NewMessage<'_>) -> Result<Message>;

    /// Messages with `id > after`, ascending, at most `limit`.
    fn list_messages(&self, conversation_id: Uuid, after: MessageId, limit: u32)
    -> Result<Vec<Message>>;
}

pub trait CursorStore: Send + Sync {
    /// 0 when the participant has never marked anything read.
    fn read_cursor(&self, conversation_id: Uuid, participant: &ParticipantId) -> Result<MessageId>;

    /// Set the cursor to `max(current, up_to)`. Returns the new value.
    fn advance_cursor(
        &self,
        conversation_id: Uuid,
        participant: &ParticipantId,
        up_to: MessageId,
    ) -> Result<MessageId>;

    /// Messages past the cursor that `participant` did not send.
    fn unread_count(&self, conversation_id: Uuid, participant: &ParticipantId) -> Result<u64>;

    /// Every conversation `participant` is in, with full last-message bodies. Order unspecified.
    fn summaries_for(&self, participant: &ParticipantId) -> Result<Vec<ConversationSummary>>;
}

/// An engine implementing the whole contract.
pub trait Store: ConversationStore + MessageStore + CursorStore {}

impl<T: ConversationStore + MessageStore + CursorStore> Store for T {}
