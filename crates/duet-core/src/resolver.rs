use std::sync::Arc;

use duet_types::models::{Conversation, ParticipantId};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DmError, Result};
use crate::key::canonical_key;
use crate::store::ConversationStore;

/// Find-or-create the single conversation between two participants.
pub struct ConversationResolver<S> {
    store: Arc<S>,
}

impl<S> Clone for ConversationResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ConversationStore> ConversationResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Conversation id for the pair `(a, b)`, creating it on first use.
    ///
    /// Concurrent callers for the same pair all get the same id; the store's
    /// uniqueness constraint picks the winner.
    pub fn resolve(&self, a: &ParticipantId, b: &ParticipantId) -> Result<Uuid> {
        let key = canonical_key(a, b)?;

        if let Some(existing) = self.store.find_by_pair_key(&key)? {
            return Ok(existing.id);
        }

        let conversation = self.store.create_if_absent(&key, a, b)?;
        debug!("Resolved {} to conversation {}", key, conversation.id);
        Ok(conversation.id)
    }

    pub fn conversation(&self, id: Uuid) -> Result<Conversation> {
        self.store
            .find_by_id(id)?
            .ok_or(DmError::ConversationNotFound)
    }

    /// Like [`conversation`](Self::conversation) but also requires `who` to be in it.
    pub fn conversation_for(&self, id: Uuid, who: &ParticipantId) -> Result<Conversation> {
        let conversation = self.conversation(id)?;
        if !conversation.has_participant(who) {
            return Err(DmError::NotAParticipant);
        }
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use super::*;
    use crate::memory::MemoryStore;

    fn resolver() -> ConversationResolver<MemoryStore> {
        ConversationResolver::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn resolve_is_order_independent() {
        let r = resolver();
        let ab = r.resolve(&"u1".into(), &"u2".into()).unwrap();
        let ba = r.resolve(&"u2".into(), &"u1".into()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn resolve_self_fails() {
        let r = resolver();
        assert_eq!(
            r.resolve(&"u1".into(), &"u1".into()),
            Err(DmError::InvalidParticipants)
        );
    }

    #[test]
    fn different_pairs_get_different_conversations() {
        let r = resolver();
        let a = r.resolve(&"u1".into(), &"u2".into()).unwrap();
        let b = r.resolve(&"u1".into(), &"u3".into()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn concurrent_resolves_agree() {
        let store = Arc::new(MemoryStore::new());
        let r = ConversationResolver::new(Arc::clone(&store));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let r = r.clone();
                thread::spawn(move || {
                    // Alternate argument order across threads
                    if i % 2 == 0 {
                        r.resolve(&"u1".into(), &"u2".into()).unwrap()
                    } else {
                        r.resolve(&"u2".into(), &"u1".into()).unwrap()
                    }
                })
            })
            .collect();

        let ids: HashSet<Uuid> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.conversation_count(), 1);
    }

    #[test]
    fn conversation_for_checks_membership() {
        let r = resolver();
        let id = r.resolve(&"u1".into(), &"u2".into()).unwrap();
        assert!(r.conversation_for(id, &"u2".into()).is_ok());
        assert_eq!(
            r.conversation_for(id, &"u3".into()),
            Err(DmError::NotAParticipant)
        );
        assert_eq!(
            r.conversation(Uuid::new_v4()),
            Err(DmError::ConversationNotFound)
        );
    }
}
