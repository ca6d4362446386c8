//! In-process storage engine.
//!
//! Each resource sits behind its own `Mutex`; locks are always taken in the
//! order conversations, threads, cursors and released before the call
//! returns. The `by_pair` map plays the role of the unique index.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use duet_types::models::{
    Conversation, ConversationSummary, Message, MessageId, MessagePreview, ParticipantId,
};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DmError, Result};
use crate::key::PairKey;
use crate::store::{ConversationStore, CursorStore, MessageStore, NewMessage};

#[derive(Default)]
struct Conversations {
    by_id: HashMap<Uuid, Conversation>,
    by_pair: HashMap<String, Uuid>,
}

#[derive(Default)]
struct Thread {
    messages: Vec<Message>,
    /// (sender, client token) -> message id
    tokens: HashMap<(ParticipantId, String), MessageId>,
}

impl Thread {
    fn last_id(&self) -> MessageId {
        self.messages.last().map_or(0, |m| m.id)
    }

    fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages
            .binary_search_by_key(&id, |m| m.id)
            .ok()
            .map(|idx| &self.messages[idx])
    }
}

#[derive(Default)]
pub struct MemoryStore {
    conversations: Mutex<Conversations>,
    threads: Mutex<HashMap<Uuid, Thread>>,
    cursors: Mutex<HashMap<(Uuid, ParticipantId), MessageId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations
            .lock()
            .map(|c| c.by_id.len())
            .unwrap_or_default()
    }

    fn member_conversation(&self, id: Uuid, who: &ParticipantId) -> Result<Conversation> {
        let conversation = self.find_by_id(id)?.ok_or(DmError::ConversationNotFound)?;
        if !conversation.has_participant(who) {
            return Err(DmError::NotAParticipant);
        }
        Ok(conversation)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| DmError::storage(format!("memory store lock poisoned: {}", e)))
}

fn unread_in(thread: Option<&Thread>, cursor: MessageId, who: &ParticipantId) -> u64 {
    thread.map_or(0, |t| {
        let start = t.messages.partition_point(|m| m.id <= cursor);
        t.messages[start..]
            .iter()
            .filter(|m| &m.sender_id != who)
            .count() as u64
    })
}

impl ConversationStore for MemoryStore {
    fn find_by_pair_key(&self, key: &PairKey) -> Result<Option<Conversation>> {
        let table = lock(&self.conversations)?;
        Ok(table
            .by_pair
            .get(key.as_str())
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(lock(&self.conversations)?.by_id.get(&id).cloned())
    }

    fn create_if_absent(
        &self,
        key: &PairKey,
        a: &ParticipantId,
        b: &ParticipantId,
    ) -> Result<Conversation> {
        let mut table = lock(&self.conversations)?;

        if let Some(existing) = table.by_pair.get(key.as_str()) {
            debug!("Conversation for {} already exists, returning winner", key);
            return table
                .by_id
                .get(existing)
                .cloned()
                .ok_or_else(|| DmError::storage("pair index points at a missing conversation"));
        }

        let conversation = Conversation {
            id: Uuid::new_v4(),
            pair_key: key.as_str().to_string(),
            participant_a: a.clone(),
            participant_b: b.clone(),
            created_at: Utc::now(),
        };
        table
            .by_pair
            .insert(conversation.pair_key.clone(), conversation.id);
        table.by_id.insert(conversation.id, conversation.clone());

        debug!("Created conversation {} for {}", conversation.id, key);
        Ok(conversation)
    }
}

impl MessageStore for MemoryStore {
    fn append_message(&self, msg: &NewMessage<'_>) -> Result<Message> {
        self.member_conversation(msg.conversation_id, msg.sender_id)?;

        let mut threads = lock(&self.threads)?;
        let thread = threads.entry(msg.conversation_id).or_default();

        if let Some(token) = msg.client_token {
            let existing = thread
                .tokens
                .get(&(msg.sender_id.clone(), token.to_string()))
                .and_then(|id| thread.get(*id));
            if let Some(existing) = existing {
                return Ok(existing.clone());
            }
        }

        let now = Utc::now();
        let sent_at = thread.messages.last().map_or(now, |last| last.sent_at.max(now));

        let message = Message {
            id: thread.last_id() + 1,
            conversation_id: msg.conversation_id,
            sender_id: msg.sender_id.clone(),
            body: msg.body.to_string(),
            sent_at,
            client_token: msg.client_token.map(str::to_string),
        };

        if let Some(token) = msg.client_token {
            thread
                .tokens
                .insert((msg.sender_id.clone(), token.to_string()), message.id);
        }
        thread.messages.push(message.clone());

        Ok(message)
    }

    fn list_messages(
        &self,
        conversation_id: Uuid,
        after: MessageId,
        limit: u32,
    ) -> Result<Vec<Message>> {
        if self.find_by_id(conversation_id)?.is_none() {
            return Err(DmError::ConversationNotFound);
        }

        let threads = lock(&self.threads)?;
        let Some(thread) = threads.get(&conversation_id) else {
            return Ok(vec![]);
        };

        let start = thread.messages.partition_point(|m| m.id <= after);
        Ok(thread.messages[start..]
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl CursorStore for MemoryStore {
    fn read_cursor(&self, conversation_id: Uuid, participant: &ParticipantId) -> Result<MessageId> {
        self.member_conversation(conversation_id, participant)?;
        Ok(lock(&self.cursors)?
            .get(&(conversation_id, participant.clone()))
            .copied()
            .unwrap_or(0))
    }

    fn advance_cursor(
        &self,
        conversation_id: Uuid,
        participant: &ParticipantId,
        up_to: MessageId,
    ) -> Result<MessageId> {
        self.member_conversation(conversation_id, participant)?;

        let mut cursors = lock(&self.cursors)?;
        let cursor = cursors
            .entry((conversation_id, participant.clone()))
            .or_insert(0);
        *cursor = (*cursor).max(up_to);
        Ok(*cursor)
    }

    fn unread_count(&self, conversation_id: Uuid, participant: &ParticipantId) -> Result<u64> {
        self.member_conversation(conversation_id, participant)?;

        let threads = lock(&self.threads)?;
        let cursors = lock(&self.cursors)?;
        let cursor = cursors
            .get(&(conversation_id, participant.clone()))
            .copied()
            .unwrap_or(0);

        Ok(unread_in(threads.get(&conversation_id), cursor, participant))
    }

    fn summaries_for(&self, participant: &ParticipantId) -> Result<Vec<ConversationSummary>> {
        let mine: Vec<Conversation> = lock(&self.conversations)?
            .by_id
            .values()
            .filter(|c| c.has_participant(participant))
            .cloned()
            .collect();

        let threads = lock(&self.threads)?;
        let cursors = lock(&self.cursors)?;

        let summaries = mine
            .into_iter()
            .filter_map(|c| {
                let other = c.other_participant(participant)?.clone();
                let thread = threads.get(&c.id);
                let cursor = cursors
                    .get(&(c.id, participant.clone()))
                    .copied()
                    .unwrap_or(0);
                let last_message = thread.and_then(|t| t.messages.last()).map(|m| MessagePreview {
                    id: m.id,
                    sender_id: m.sender_id.clone(),
                    body: m.body.clone(),
                    sent_at: m.sent_at,
                });

                Some(ConversationSummary {
                    conversation_id: c.id,
                    other_participant: other,
                    last_activity_at: last_message.as_ref().map_or(c.created_at, |m| m.sent_at),
                    last_message,
                    unread_count: unread_in(thread, cursor, participant),
                })
            })
            .collect();

        Ok(summaries)
    }
}
