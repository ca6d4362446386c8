use std::fmt;

use duet_types::models::ParticipantId;

use crate::error::{DmError, Result};

/// Order-independent key for a participant pair.
///
/// Encoded as `<len(low)>:<low>|<high>` where `low <= high` bytewise. The
/// length prefix keeps the encoding unambiguous even when ids contain the
/// separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    encoded: String,
    low: ParticipantId,
    high: ParticipantId,
}

impl PairKey {
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn low(&self) -> &ParticipantId {
        &self.low
    }

    pub fn high(&self) -> &ParticipantId {
        &self.high
    }

    pub fn contains(&self, who: &ParticipantId) -> bool {
        &self.low == who || &self.high == who
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Canonical key for `(a, b)`. Fails with `InvalidParticipants` for a self-pair or a blank id.
pub fn canonical_key(a: &ParticipantId, b: &ParticipantId) -> Result<PairKey> {
    if a == b || a.as_str().trim().is_empty() || b.as_str().trim().is_empty() {
        return Err(DmError::InvalidParticipants);
    }

    let (low, high) = if a < b { (a, b) } else { (b, a) };
    let encoded = format!("{}:{}|{}", low.as_str().len(), low, high);

    Ok(PairKey {
        encoded,
        low: low.clone(),
        high: high.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str) -> ParticipantId {
        ParticipantId::from(id)
    }

    #[test]
    fn argument_order_does_not_matter() {
        let ab = canonical_key(&p("alice"), &p("bob")).unwrap();
        let ba = canonical_key(&p("bob"), &p("alice")).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.as_str(), "5:alice|bob");
        assert_eq!(ab.low(), &p("alice"));
        assert_eq!(ab.high(), &p("bob"));
    }

    #[test]
    fn self_pair_is_rejected() {
        assert_eq!(canonical_key(&p("u1"), &p("u1")), Err(DmError::InvalidParticipants));
    }

    #[test]
    fn blank_participant_is_rejected() {
        assert_eq!(canonical_key(&p(""), &p("u1")), Err(DmError::InvalidParticipants));
        assert_eq!(canonical_key(&p("u1"), &p("  ")), Err(DmError::InvalidParticipants));
    }

    #[test]
    fn separator_in_ids_does_not_collide() {
        let left = canonical_key(&p("a|b"), &p("c")).unwrap();
        let right = canonical_key(&p("a"), &p("b|c")).unwrap();
        assert_ne!(left, right);
    }

    #[test]
    fn contains_both_sides() {
        let key = canonical_key(&p("u2"), &p("u1")).unwrap();
        assert!(key.contains(&p("u1")));
        assert!(key.contains(&p("u2")));
        assert!(!key.contains(&p("u3")));
    }
}
