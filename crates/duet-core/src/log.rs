use std::collections::VecDeque;
use std::sync::Arc;

use duet_types::models::{Message, MessageId, ParticipantId};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DmError, Result};
use crate::store::{MessageStore, NewMessage};

/// Longest accepted body, in characters, after trimming.
pub const MAX_BODY_CHARS: usize = 4000;

/// Largest page `list` will return.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Append-only, per-conversation ordered message log.
pub struct MessageLog<S> {
    store: Arc<S>,
}

impl<S> Clone for MessageLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: MessageStore> MessageLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn append(
        &self,
        conversation_id: Uuid,
        sender_id: &ParticipantId,
        body: &str,
    ) -> Result<Message> {
        self.append_with_token(conversation_id, sender_id, body, None)
    }

    /// Append with an optional client idempotency token. A blank token counts as none.
    pub fn append_with_token(
        &self,
        conversation_id: Uuid,
        sender_id: &ParticipantId,
        body: &str,
        client_token: Option<&str>,
    ) -> Result<Message> {
        let body = validate_body(body)?;
        let client_token = client_token.map(str::trim).filter(|t| !t.is_empty());

        let message = self.store.append_message(&NewMessage {
            conversation_id,
            sender_id,
            body,
            client_token,
        })?;

        debug!(
            "Appended message {} to conversation {} from {}",
            message.id, conversation_id, sender_id
        );
        Ok(message)
    }

    /// One page of messages after `after`, ascending by id.
    pub fn list(
        &self,
        conversation_id: Uuid,
        after: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        self.store
            .list_messages(conversation_id, after.unwrap_or(0), limit)
    }

    /// Lazily walk the log from `after` onward, fetching `page_size` at a time.
    ///
    /// Stops at the first error or the end of the log as it stood when each
    /// page was fetched. Resume later by passing the last seen id as `after`.
    pub fn iter(
        &self,
        conversation_id: Uuid,
        after: Option<MessageId>,
        page_size: u32,
    ) -> Pages<'_, S> {
        Pages {
            log: self,
            conversation_id,
            cursor: after.unwrap_or(0),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            buffered: VecDeque::new(),
            done: false,
        }
    }
}

pub struct Pages<'a, S> {
    log: &'a MessageLog<S>,
    conversation_id: Uuid,
    cursor: MessageId,
    page_size: u32,
    buffered: VecDeque<Message>,
    done: bool,
}

impl<S: MessageStore> Iterator for Pages<'_, S> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffered.is_empty() && !self.done {
            match self
                .log
                .list(self.conversation_id, Some(self.cursor), self.page_size)
            {
                Ok(page) => {
                    if (page.len() as u32) < self.page_size {
                        self.done = true;
                    }
                    self.buffered.extend(page);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        let message = self.buffered.pop_front()?;
        self.cursor = message.id;
        Some(Ok(message))
    }
}

fn validate_body(body: &str) -> Result<&str> {
    let body = body.trim();
    if body.is_empty() {
        return Err(DmError::EmptyBody);
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(DmError::BodyTooLong {
            max: MAX_BODY_CHARS,
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::resolver::ConversationResolver;

    fn setup() -> (MessageLog<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let id = ConversationResolver::new(Arc::clone(&store))
            .resolve(&"u1".into(), &"u2".into())
            .unwrap();
        (MessageLog::new(store), id)
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let (log, c) = setup();
        let first = log.append(c, &"u1".into(), "hi").unwrap();
        let second = log.append(c, &"u2".into(), "hey").unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(second.sent_at >= first.sent_at);
    }

    #[test]
    fn body_is_trimmed_and_validated() {
        let (log, c) = setup();
        assert_eq!(log.append(c, &"u1".into(), "  \n\t "), Err(DmError::EmptyBody));

        let long = "x".repeat(MAX_BODY_CHARS + 1);
        assert_eq!(
            log.append(c, &"u1".into(), &long),
            Err(DmError::BodyTooLong { max: MAX_BODY_CHARS })
        );

        let m = log.append(c, &"u1".into(), "  padded  ").unwrap();
        assert_eq!(m.body, "padded");
    }

    #[test]
    fn outsider_cannot_append() {
        let (log, c) = setup();
        assert_eq!(log.append(c, &"u3".into(), "hi"), Err(DmError::NotAParticipant));
    }

    #[test]
    fn unknown_conversation() {
        let (log, _) = setup();
        assert_eq!(
            log.append(Uuid::new_v4(), &"u1".into(), "hi"),
            Err(DmError::ConversationNotFound)
        );
        assert_eq!(
            log.list(Uuid::new_v4(), None, 10),
            Err(DmError::ConversationNotFound)
        );
    }

    #[test]
    fn list_after_returns_strictly_later_messages() {
        let (log, c) = setup();
        for i in 0..10 {
            log.append(c, &"u1".into(), &format!("m{}", i)).unwrap();
        }

        let page = log.list(c, Some(4), 3).unwrap();
        let ids: Vec<_> = page.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![5, 6, 7]);

        // Resuming from the last seen id replays the rest without gaps or duplicates
        let rest = log.list(c, Some(7), 50).unwrap();
        let ids: Vec<_> = rest.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![8, 9, 10]);
    }

    #[test]
    fn iterator_walks_every_page() {
        let (log, c) = setup();
        for i in 0..7 {
            log.append(c, &"u2".into(), &format!("m{}", i)).unwrap();
        }

        let ids: Vec<_> = log.iter(c, None, 3).map(|m| m.unwrap().id).collect();
        assert_eq!(ids, (1..=7).collect::<Vec<_>>());

        let tail: Vec<_> = log.iter(c, Some(5), 2).map(|m| m.unwrap().id).collect();
        assert_eq!(tail, vec![6, 7]);
    }

    #[test]
    fn client_token_deduplicates_retries() {
        let (log, c) = setup();
        let first = log
            .append_with_token(c, &"u1".into(), "hi", Some("tok-1"))
            .unwrap();
        let retry = log
            .append_with_token(c, &"u1".into(), "hi", Some("tok-1"))
            .unwrap();
        assert_eq!(first, retry);

        // Same token from the other participant is a different message
        let other = log
            .append_with_token(c, &"u2".into(), "hi", Some("tok-1"))
            .unwrap();
        assert_eq!(other.id, 2);
        assert_eq!(log.list(c, None, 10).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_appends_get_distinct_ids() {
        let (log, c) = setup();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                thread::spawn(move || {
                    let sender: ParticipantId = if t % 2 == 0 { "u1".into() } else { "u2".into() };
                    (0..25)
                        .map(|i| log.append(c, &sender, &format!("{}-{}", t, i)).unwrap().id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 200);

        let all: Vec<_> = log.iter(c, None, 64).map(|m| m.unwrap().id).collect();
        assert_eq!(all, (1..=200).collect::<Vec<_>>());
    }
}
