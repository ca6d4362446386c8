//! Database row types. These map directly to SQLite rows and are converted
//! into `duet-types` models at the edge of the engine.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use duet_core::{DmError, Result};
use duet_types::models::{Conversation, ConversationSummary, Message, MessagePreview, ParticipantId};
use tracing::warn;
use uuid::Uuid;

pub struct ConversationRow {
    pub id: String,
    pub pair_key: String,
    pub participant_a: String,
    pub participant_b: String,
    pub last_message_id: i64,
    pub last_message_at: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub conversation_id: String,
    pub id: i64,
    pub sender_id: String,
    pub body: String,
    pub sent_at: String,
    pub client_token: Option<String>,
}

pub struct SummaryRow {
    pub conversation_id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub created_at: String,
    pub last_message_id: i64,
    pub last_sender_id: Option<String>,
    pub last_body: Option<String>,
    pub last_sent_at: Option<String>,
    pub unread: i64,
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through the sqlite shell use datetime('now')
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DmError::storage(format!("corrupt timestamp '{}'", raw))
        })
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().map_err(|e| {
        warn!("Corrupt conversation id '{}': {}", raw, e);
        DmError::storage(format!("corrupt conversation id '{}'", raw))
    })
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = DmError;

    fn try_from(row: ConversationRow) -> Result<Self> {
        Ok(Conversation {
            id: parse_id(&row.id)?,
            pair_key: row.pair_key,
            participant_a: ParticipantId::from(row.participant_a),
            participant_b: ParticipantId::from(row.participant_b),
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = DmError;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            id: row.id as u64,
            conversation_id: parse_id(&row.conversation_id)?,
            sender_id: ParticipantId::from(row.sender_id),
            body: row.body,
            sent_at: parse_ts(&row.sent_at)?,
            client_token: row.client_token,
        })
    }
}

impl SummaryRow {
    pub fn into_summary(self, viewer: &ParticipantId) -> Result<ConversationSummary> {
        let other = if self.participant_a == viewer.as_str() {
            self.participant_b
        } else {
            self.participant_a
        };

        let last_message = match (self.last_sender_id, self.last_body, self.last_sent_at) {
            (Some(sender), Some(body), Some(sent_at)) if self.last_message_id > 0 => {
                Some(MessagePreview {
                    id: self.last_message_id as u64,
                    sender_id: ParticipantId::from(sender),
                    body,
                    sent_at: parse_ts(&sent_at)?,
                })
            }
            _ => None,
        };

        let last_activity_at = match &last_message {
            Some(m) => m.sent_at,
            None => parse_ts(&self.created_at)?,
        };

        Ok(ConversationSummary {
            conversation_id: parse_id(&self.conversation_id)?,
            other_participant: ParticipantId::from(other),
            last_message,
            unread_count: self.unread.max(0) as u64,
            last_activity_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_timestamps_round_trip_and_sort() {
        let earlier: DateTime<Utc> = "2026-01-02T03:04:05.000001Z".parse().unwrap();
        let later: DateTime<Utc> = "2026-01-02T03:04:05.100000Z".parse().unwrap();
        assert!(format_ts(earlier) < format_ts(later));
        assert_eq!(parse_ts(&format_ts(later)).unwrap(), later);
    }

    #[test]
    fn parses_sqlite_datetime() {
        let ts = parse_ts("2026-01-02 03:04:05").unwrap();
        assert_eq!(format_ts(ts), "2026-01-02T03:04:05.000000Z");
    }

    #[test]
    fn corrupt_values_are_storage_errors() {
        assert!(parse_ts("yesterday").unwrap_err().is_retryable());
        assert!(parse_id("not-a-uuid").is_err());
    }
}
