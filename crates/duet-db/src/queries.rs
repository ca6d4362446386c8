//! SQL for the storage contract. Each function runs on whatever connection or
//! transaction it is handed; transaction boundaries live in `store.rs`.

use duet_core::{DmError, Result};
use rusqlite::{Connection, params};

use crate::models::{ConversationRow, MessageRow, SummaryRow};
use crate::{OptionalExt, StorageExt};

const CONVERSATION_COLUMNS: &str =
    "id, pair_key, participant_a, participant_b, last_message_id, last_message_at, created_at";

const MESSAGE_COLUMNS: &str = "conversation_id, id, sender_id, body, sent_at, client_token";

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        pair_key: row.get(1)?,
        participant_a: row.get(2)?,
        participant_b: row.get(3)?,
        last_message_id: row.get(4)?,
        last_message_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        conversation_id: row.get(0)?,
        id: row.get(1)?,
        sender_id: row.get(2)?,
        body: row.get(3)?,
        sent_at: row.get(4)?,
        client_token: row.get(5)?,
    })
}

// -- Conversations --

pub fn query_conversation_by_pair_key(
    conn: &Connection,
    pair_key: &str,
) -> Result<Option<ConversationRow>> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {} FROM conversations WHERE pair_key = ?1",
            CONVERSATION_COLUMNS
        ))
        .storage()?;

    stmt.query_row([pair_key], conversation_from_row).optional()
}

pub fn query_conversation_by_id(conn: &Connection, id: &str) -> Result<Option<ConversationRow>> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {} FROM conversations WHERE id = ?1",
            CONVERSATION_COLUMNS
        ))
        .storage()?;

    stmt.query_row([id], conversation_from_row).optional()
}

/// Conversation `id`, or `NotAParticipant`/`ConversationNotFound`.
pub fn query_member_conversation(
    conn: &Connection,
    id: &str,
    participant: &str,
) -> Result<ConversationRow> {
    let row = query_conversation_by_id(conn, id)?.ok_or(DmError::ConversationNotFound)?;
    if row.participant_a != participant && row.participant_b != participant {
        return Err(DmError::NotAParticipant);
    }
    Ok(row)
}

/// Plain insert. Callers handle the `pair_key` constraint violation themselves.
pub fn insert_conversation(conn: &Connection, row: &ConversationRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO conversations (id, pair_key, participant_a, participant_b, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            row.id,
            row.pair_key,
            row.participant_a,
            row.participant_b,
            row.created_at
        ],
    )?;
    Ok(())
}

pub fn update_last_message(conn: &Connection, id: &str, message_id: i64, sent_at: &str) -> Result<()> {
    conn.execute(
        "UPDATE conversations SET last_message_id = ?2, last_message_at = ?3 WHERE id = ?1",
        params![id, message_id, sent_at],
    )
    .storage()?;
    Ok(())
}

// -- Messages --

pub fn insert_message(conn: &Connection, row: &MessageRow) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (conversation_id, id, sender_id, body, sent_at, client_token)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.conversation_id,
            row.id,
            row.sender_id,
            row.body,
            row.sent_at,
            row.client_token
        ],
    )
    .storage()?;
    Ok(())
}

pub fn query_message_by_token(
    conn: &Connection,
    conversation_id: &str,
    sender_id: &str,
    client_token: &str,
) -> Result<Option<MessageRow>> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {} FROM messages
             WHERE conversation_id = ?1 AND sender_id = ?2 AND client_token = ?3",
            MESSAGE_COLUMNS
        ))
        .storage()?;

    stmt.query_row(params![conversation_id, sender_id, client_token], message_from_row)
        .optional()
}

pub fn query_messages_after(
    conn: &Connection,
    conversation_id: &str,
    after: i64,
    limit: u32,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {} FROM messages
             WHERE conversation_id = ?1 AND id > ?2
             ORDER BY id ASC
             LIMIT ?3",
            MESSAGE_COLUMNS
        ))
        .storage()?;

    let rows = stmt
        .query_map(params![conversation_id, after, limit], message_from_row)
        .storage()?
        .collect::<std::result::Result<Vec<_>, _>>()
        .storage()?;

    Ok(rows)
}

// -- Read cursors --

pub fn query_read_cursor(conn: &Connection, conversation_id: &str, participant: &str) -> Result<i64> {
    let cursor = conn
        .query_row(
            "SELECT last_read_message_id FROM read_cursors
             WHERE conversation_id = ?1 AND participant_id = ?2",
            params![conversation_id, participant],
            |row| row.get(0),
        )
        .optional()?;

    Ok(cursor.unwrap_or(0))
}

/// Max-merge `target` into the cursor and return the stored value.
pub fn upsert_read_cursor(
    conn: &Connection,
    conversation_id: &str,
    participant: &str,
    target: i64,
    updated_at: &str,
) -> Result<i64> {
    conn.query_row(
        "INSERT INTO read_cursors (conversation_id, participant_id, last_read_message_id, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (conversation_id, participant_id) DO UPDATE SET
             last_read_message_id = MAX(last_read_message_id, excluded.last_read_message_id),
             updated_at = excluded.updated_at
         RETURNING last_read_message_id",
        params![conversation_id, participant, target, updated_at],
        |row| row.get(0),
    )
    .storage()
}

pub fn count_unread(conn: &Connection, conversation_id: &str, participant: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages
         WHERE conversation_id = ?1
           AND sender_id != ?2
           AND id > COALESCE(
               (SELECT last_read_message_id FROM read_cursors
                WHERE conversation_id = ?1 AND participant_id = ?2),
               0)",
        params![conversation_id, participant],
        |row| row.get(0),
    )
    .storage()
}

/// One row per conversation `participant` is in, joined with its last
/// message and the participant's unread count (eliminates N+1).
pub fn query_summaries(conn: &Connection, participant: &str) -> Result<Vec<SummaryRow>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT c.id, c.participant_a, c.participant_b, c.created_at, c.last_message_id,
                    m.sender_id, m.body, m.sent_at,
                    (SELECT COUNT(*) FROM messages u
                     WHERE u.conversation_id = c.id
                       AND u.sender_id != ?1
                       AND u.id > COALESCE(
                           (SELECT r.last_read_message_id FROM read_cursors r
                            WHERE r.conversation_id = c.id AND r.participant_id = ?1),
                           0)) AS unread
             FROM conversations c
             LEFT JOIN messages m
                ON m.conversation_id = c.id AND m.id = c.last_message_id
             WHERE c.participant_a = ?1 OR c.participant_b = ?1
             ORDER BY COALESCE(c.last_message_at, c.created_at) DESC, c.id ASC",
        )
        .storage()?;

    let rows = stmt
        .query_map([participant], |row| {
            Ok(SummaryRow {
                conversation_id: row.get(0)?,
                participant_a: row.get(1)?,
                participant_b: row.get(2)?,
                created_at: row.get(3)?,
                last_message_id: row.get(4)?,
                last_sender_id: row.get(5)?,
                last_body: row.get(6)?,
                last_sent_at: row.get(7)?,
                unread: row.get(8)?,
            })
        })
        .storage()?
        .collect::<std::result::Result<Vec<_>, _>>()
        .storage()?;

    Ok(rows)
}
