//! Storage contract implementation. Every method is one SQLite transaction;
//! writes use `BEGIN IMMEDIATE` so the read-modify-write of the
//! per-conversation counter cannot interleave with another writer.

use chrono::Utc;
use duet_core::{
    ConversationStore, CursorStore, DmError, MessageStore, NewMessage, PairKey, Result,
};
use duet_types::models::{Conversation, ConversationSummary, Message, MessageId, ParticipantId};
use rusqlite::{Transaction, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::models::{ConversationRow, MessageRow, format_ts, parse_ts};
use crate::{Database, StorageExt, is_unique_violation, queries};

impl ConversationStore for Database {
    fn find_by_pair_key(&self, key: &PairKey) -> Result<Option<Conversation>> {
        self.with_conn(|conn| queries::query_conversation_by_pair_key(conn, key.as_str()))?
            .map(Conversation::try_from)
            .transpose()
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.with_conn(|conn| queries::query_conversation_by_id(conn, &id.to_string()))?
            .map(Conversation::try_from)
            .transpose()
    }

    fn create_if_absent(
        &self,
        key: &PairKey,
        a: &ParticipantId,
        b: &ParticipantId,
    ) -> Result<Conversation> {
        let candidate = ConversationRow {
            id: Uuid::new_v4().to_string(),
            pair_key: key.as_str().to_string(),
            participant_a: a.as_str().to_string(),
            participant_b: b.as_str().to_string(),
            last_message_id: 0,
            last_message_at: None,
            created_at: format_ts(Utc::now()),
        };

        let row = self.with_conn_mut(|conn| match queries::insert_conversation(conn, &candidate) {
            Ok(()) => {
                debug!("Created conversation {} for {}", candidate.id, key);
                Ok(candidate)
            }
            Err(e) if is_unique_violation(&e) => {
                // Another writer got there first; their row is the conversation
                debug!("Conversation for {} already exists, returning winner", key);
                queries::query_conversation_by_pair_key(conn, key.as_str())?.ok_or_else(|| {
                    DmError::storage("conversation missing after unique violation")
                })
            }
            Err(e) => Err::<ConversationRow, _>(e).storage(),
        })?;

        Conversation::try_from(row)
    }
}

impl MessageStore for Database {
    fn append_message(&self, msg: &NewMessage<'_>) -> Result<Message> {
        let conversation_id = msg.conversation_id.to_string();
        let sender_id = msg.sender_id.as_str();

        self.with_conn_mut(|conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate).storage()?;

            let conversation =
                queries::query_member_conversation(&tx, &conversation_id, sender_id)?;

            if let Some(token) = msg.client_token {
                if let Some(existing) =
                    queries::query_message_by_token(&tx, &conversation_id, sender_id, token)?
                {
                    debug!(
                        "Duplicate append for token '{}' in {}, returning message {}",
                        token, conversation_id, existing.id
                    );
                    return Message::try_from(existing);
                }
            }

            // sent_at never runs behind the previous message, even if the wall clock steps back
            let now = Utc::now();
            let sent_at = match conversation.last_message_at.as_deref() {
                Some(raw) => parse_ts(raw)?.max(now),
                None => now,
            };

            let row = MessageRow {
                conversation_id: conversation_id.clone(),
                id: conversation.last_message_id + 1,
                sender_id: sender_id.to_string(),
                body: msg.body.to_string(),
                sent_at: format_ts(sent_at),
                client_token: msg.client_token.map(str::to_string),
            };

            queries::insert_message(&tx, &row)?;
            queries::update_last_message(&tx, &conversation_id, row.id, &row.sent_at)?;
            tx.commit().storage()?;

            Message::try_from(row)
        })
    }

    fn list_messages(
        &self,
        conversation_id: Uuid,
        after: MessageId,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let conversation_id = conversation_id.to_string();
        let after = i64::try_from(after).unwrap_or(i64::MAX);

        let rows = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().storage()?;
            if queries::query_conversation_by_id(&tx, &conversation_id)?.is_none() {
                return Err(DmError::ConversationNotFound);
            }
            let rows = queries::query_messages_after(&tx, &conversation_id, after, limit)?;
            tx.commit().storage()?;
            Ok(rows)
        })?;

        rows.into_iter().map(Message::try_from).collect()
    }
}

impl CursorStore for Database {
    fn read_cursor(&self, conversation_id: Uuid, participant: &ParticipantId) -> Result<MessageId> {
        let conversation_id = conversation_id.to_string();

        let cursor = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().storage()?;
            queries::query_member_conversation(&tx, &conversation_id, participant.as_str())?;
            let cursor = queries::query_read_cursor(&tx, &conversation_id, participant.as_str())?;
            tx.commit().storage()?;
            Ok(cursor)
        })?;

        Ok(cursor.max(0) as MessageId)
    }

    fn advance_cursor(
        &self,
        conversation_id: Uuid,
        participant: &ParticipantId,
        up_to: MessageId,
    ) -> Result<MessageId> {
        let conversation_id = conversation_id.to_string();
        let requested = i64::try_from(up_to).unwrap_or(i64::MAX);

        let cursor = self.with_conn_mut(|conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate).storage()?;
            queries::query_member_conversation(&tx, &conversation_id, participant.as_str())?;

            let cursor = queries::upsert_read_cursor(
                &tx,
                &conversation_id,
                participant.as_str(),
                requested,
                &format_ts(Utc::now()),
            )?;

            tx.commit().storage()?;
            Ok(cursor)
        })?;

        Ok(cursor.max(0) as MessageId)
    }

    fn unread_count(&self, conversation_id: Uuid, participant: &ParticipantId) -> Result<u64> {
        let conversation_id = conversation_id.to_string();

        let unread = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().storage()?;
            queries::query_member_conversation(&tx, &conversation_id, participant.as_str())?;
            let unread = queries::count_unread(&tx, &conversation_id, participant.as_str())?;
            tx.commit().storage()?;
            Ok(unread)
        })?;

        Ok(unread.max(0) as u64)
    }

    fn summaries_for(&self, participant: &ParticipantId) -> Result<Vec<ConversationSummary>> {
        let rows = self.with_conn(|conn| queries::query_summaries(conn, participant.as_str()))?;

        rows.into_iter()
            .map(|row| row.into_summary(participant))
            .collect()
    }
}
