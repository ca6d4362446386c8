use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| {
            r.get(0)
        })?;

    if version < 1 {
        info!("Running migration v1 (conversations, messages, read cursors)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE conversations (
                id               TEXT PRIMARY KEY,
                pair_key         TEXT NOT NULL,
                participant_a    TEXT NOT NULL,
                participant_b    TEXT NOT NULL,
                last_message_id  INTEGER NOT NULL DEFAULT 0,
                last_message_at  TEXT,
                created_at       TEXT NOT NULL
            );

            -- At most one conversation per participant pair, ever.
            CREATE UNIQUE INDEX idx_conversations_pair
                ON conversations(pair_key);

            CREATE INDEX idx_conversations_participant_a
                ON conversations(participant_a);

            CREATE INDEX idx_conversations_participant_b
                ON conversations(participant_b);

            CREATE TABLE messages (
                conversation_id  TEXT NOT NULL REFERENCES conversations(id),
                id               INTEGER NOT NULL,
                sender_id        TEXT NOT NULL,
                body             TEXT NOT NULL,
                sent_at          TEXT NOT NULL,
                client_token     TEXT,
                PRIMARY KEY (conversation_id, id)
            ) WITHOUT ROWID;

            CREATE UNIQUE INDEX idx_messages_client_token
                ON messages(conversation_id, sender_id, client_token)
                WHERE client_token IS NOT NULL;

            CREATE TABLE read_cursors (
                conversation_id       TEXT NOT NULL REFERENCES conversations(id),
                participant_id        TEXT NOT NULL,
                last_read_message_id  INTEGER NOT NULL DEFAULT 0,
                updated_at            TEXT NOT NULL,
                PRIMARY KEY (conversation_id, participant_id)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
