//! Decision model: the single persisted entity and its read-side projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// One row of the `decisions` table.
///
/// Keyed by the ordered pair `(recipient_id, actor_id)`; there is at most one
/// row per pair. `id` is assigned on first insertion and never changes, which
/// is what makes it usable as a pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: u64,
    pub recipient_id: UserId,
    pub actor_id: UserId,

    /// Did `actor_id` like `recipient_id`.
    pub liked: bool,

    /// `None` until the reciprocal decision is known. Once set, the mirror row
    /// `(actor_id, recipient_id)` carries the same value.
    pub mutually_liked: Option<bool>,

    pub updated_at: DateTime<Utc>,
}

impl Decision {
    /// A "new" like is one whose mutuality has not been resolved yet.
    pub fn is_new(&self) -> bool {
        self.mutually_liked.is_none()
    }
}

/// Read-side view of a decision: who liked the recipient, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liker {
    pub id: u64,
    pub actor_id: UserId,
    pub updated_at: DateTime<Utc>,
}

impl From<&Decision> for Liker {
    fn from(decision: &Decision) -> Self {
        Self {
            id: decision.id,
            actor_id: decision.actor_id.clone(),
            updated_at: decision.updated_at,
        }
    }
}

/// Which branch a put took, as decided by probing the reverse direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No decision existed from the other side; a one-sided row was written.
    FirstToLike,

    /// The other side had already decided; both rows now carry the
    /// counterpart's choice in `mutually_liked`.
    Reciprocal { counterpart_liked: bool },
}

impl Resolution {
    /// Whether both sides made the same choice.
    ///
    /// Always false for a first-to-like write: there was nothing to match.
    pub fn is_mutual(&self, liked: bool) -> bool {
        match self {
            Resolution::FirstToLike => false,
            Resolution::Reciprocal { counterpart_liked } => *counterpart_liked == liked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn first_to_like_is_never_mutual() {
        assert!(!Resolution::FirstToLike.is_mutual(true));
        assert!(!Resolution::FirstToLike.is_mutual(false));
    }

    #[rstest]
    #[case::both_liked(true, true, true)]
    #[case::both_declined(false, false, true)]
    #[case::counterpart_declined(false, true, false)]
    #[case::actor_declined(true, false, false)]
    fn reciprocal_is_mutual_when_choices_match(
        #[case] counterpart_liked: bool,
        #[case] liked: bool,
        #[case] expected: bool,
    ) {
        let resolution = Resolution::Reciprocal { counterpart_liked };
        assert_eq!(resolution.is_mutual(liked), expected);
    }

    #[test]
    fn liker_projects_decision() {
        let decision = Decision {
            id: 42,
            recipient_id: "user-1".into(),
            actor_id: "user-2".into(),
            liked: true,
            mutually_liked: None,
            updated_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        assert!(decision.is_new());

        let liker = Liker::from(&decision);
        assert_eq!(liker.id, 42);
        assert_eq!(liker.actor_id.as_str(), "user-2");
        assert_eq!(liker.updated_at.timestamp(), 1_700_000_000);
    }
}
