use std::sync::Arc;

use duet_types::models::{ConversationSummary, MessageId, ParticipantId};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::store::CursorStore;

/// Characters of the last message shown in an inbox summary.
pub const PREVIEW_CHARS: usize = 80;

/// Read-side view of threads: unread counts, read cursors, and the inbox.
pub struct ThreadReader<S> {
    store: Arc<S>,
}

impl<S> Clone for ThreadReader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CursorStore> ThreadReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn unread_count(&self, conversation_id: Uuid, participant: &ParticipantId) -> Result<u64> {
        self.store.unread_count(conversation_id, participant)
    }

    pub fn last_read(&self, conversation_id: Uuid, participant: &ParticipantId) -> Result<MessageId> {
        self.store.read_cursor(conversation_id, participant)
    }

    /// Advance the participant's cursor to `up_to`. Never moves it backwards.
    pub fn mark_read(
        &self,
        conversation_id: Uuid,
        participant: &ParticipantId,
        up_to: MessageId,
    ) -> Result<MessageId> {
        let cursor = self
            .store
            .advance_cursor(conversation_id, participant, up_to)?;
        debug!(
            "Read cursor for {} in {} is now {} (requested {})",
            participant, conversation_id, cursor, up_to
        );
        Ok(cursor)
    }

    /// Inbox for `participant`, most recent activity first.
    pub fn list_for_participant(&self, participant: &ParticipantId) -> Result<Vec<ConversationSummary>> {
        let mut summaries = self.store.summaries_for(participant)?;

        summaries.sort_by(|a, b| {
            b.last_activity_at
                .cmp(&a.last_activity_at)
                .then_with(|| a.conversation_id.cmp(&b.conversation_id))
        });

        for summary in &mut summaries {
            if let Some(preview) = summary.last_message.as_mut() {
                truncate_chars(&mut preview.body, PREVIEW_CHARS);
            }
        }

        Ok(summaries)
    }
}

fn truncate_chars(s: &mut String, max: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DmError;
    use crate::log::MessageLog;
    use crate::memory::MemoryStore;
    use crate::resolver::ConversationResolver;

    struct Fixture {
        resolver: ConversationResolver<MemoryStore>,
        log: MessageLog<MemoryStore>,
        reader: ThreadReader<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        Fixture {
            resolver: ConversationResolver::new(Arc::clone(&store)),
            log: MessageLog::new(Arc::clone(&store)),
            reader: ThreadReader::new(store),
        }
    }

    #[test]
    fn two_party_exchange() {
        let f = fixture();
        let u1 = ParticipantId::from("u1");
        let u2 = ParticipantId::from("u2");

        let c1 = f.resolver.resolve(&u1, &u2).unwrap();
        assert_eq!(f.log.append(c1, &u1, "hi").unwrap().id, 1);
        assert_eq!(f.log.append(c1, &u2, "hey").unwrap().id, 2);

        let thread = f.log.list(c1, Some(0), 10).unwrap();
        assert_eq!(
            thread.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(),
            vec!["hi", "hey"]
        );

        assert_eq!(f.reader.unread_count(c1, &u1).unwrap(), 1);
        f.reader.mark_read(c1, &u1, 2).unwrap();
        assert_eq!(f.reader.unread_count(c1, &u1).unwrap(), 0);

        // u2 sent "hey" themselves, so only "hi" is unread for them
        assert_eq!(f.reader.unread_count(c1, &u2).unwrap(), 1);
    }

    #[test]
    fn mark_read_never_regresses() {
        let f = fixture();
        let u1 = ParticipantId::from("u1");
        let u2 = ParticipantId::from("u2");
        let c = f.resolver.resolve(&u1, &u2).unwrap();
        for i in 0..10 {
            f.log.append(c, &u2, &format!("m{}", i)).unwrap();
        }

        for up_to in [5, 2, 9, 3] {
            f.reader.mark_read(c, &u1, up_to).unwrap();
        }
        assert_eq!(f.reader.last_read(c, &u1).unwrap(), 9);
        assert_eq!(f.reader.unread_count(c, &u1).unwrap(), 1);
    }

    #[test]
    fn mark_read_takes_max_regardless_of_log_length() {
        let f = fixture();
        let u1 = ParticipantId::from("u1");
        let u2 = ParticipantId::from("u2");
        let c = f.resolver.resolve(&u1, &u2).unwrap();
        f.log.append(c, &u2, "one").unwrap();
        f.log.append(c, &u2, "two").unwrap();

        for up_to in [5, 2, 9, 3] {
            f.reader.mark_read(c, &u1, up_to).unwrap();
        }
        assert_eq!(f.reader.last_read(c, &u1).unwrap(), 9);
        assert_eq!(f.reader.unread_count(c, &u1).unwrap(), 0);
    }

    #[test]
    fn outsiders_have_no_read_state() {
        let f = fixture();
        let c = f.resolver.resolve(&"u1".into(), &"u2".into()).unwrap();
        let u3 = ParticipantId::from("u3");
        assert_eq!(f.reader.unread_count(c, &u3), Err(DmError::NotAParticipant));
        assert_eq!(f.reader.mark_read(c, &u3, 1), Err(DmError::NotAParticipant));
        assert_eq!(
            f.reader.unread_count(Uuid::new_v4(), &u3),
            Err(DmError::ConversationNotFound)
        );
    }

    #[test]
    fn inbox_is_ordered_by_latest_message() {
        let f = fixture();
        let me = ParticipantId::from("me");
        let quiet = f.resolver.resolve(&me, &"quiet".into()).unwrap();
        let old = f.resolver.resolve(&me, &"old".into()).unwrap();
        let fresh = f.resolver.resolve(&me, &"fresh".into()).unwrap();
        // Unrelated conversation must not show up
        f.resolver.resolve(&"x".into(), &"y".into()).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        f.log.append(old, &"old".into(), "earlier").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        f.log.append(fresh, &"fresh".into(), &"y".repeat(200)).unwrap();

        let inbox = f.reader.list_for_participant(&me).unwrap();
        let order: Vec<_> = inbox.iter().map(|s| s.conversation_id).collect();
        assert_eq!(order[..2], [fresh, old]);
        assert_eq!(inbox.len(), 3);
        assert!(order.contains(&quiet));

        let top = &inbox[0];
        assert_eq!(top.other_participant, ParticipantId::from("fresh"));
        assert_eq!(top.unread_count, 1);
        let preview = top.last_message.as_ref().unwrap();
        assert_eq!(preview.body.chars().count(), PREVIEW_CHARS);

        let empty = inbox.iter().find(|s| s.conversation_id == quiet).unwrap();
        assert!(empty.last_message.is_none());
        assert_eq!(empty.unread_count, 0);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let mut s = "héllo wörld".to_string();
        truncate_chars(&mut s, 4);
        assert_eq!(s, "héll");

        let mut short = "ok".to_string();
        truncate_chars(&mut short, 4);
        assert_eq!(short, "ok");
    }
}
