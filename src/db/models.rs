use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator for the deterministic pair key. Both participants compute the
/// same key regardless of argument order, so matches, chat threads and
/// message logs for a pair always land at the same address.
const PAIR_KEY_SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    pub fn of(a: &str, b: &str) -> Self {
        let (first, second) = sorted_users(a, b);
        Self(format!("{first}{PAIR_KEY_SEPARATOR}{second}"))
    }

    /// Wraps an externally supplied key (path parameters, stored rows)
    /// without re-deriving it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Orders two user ids lexicographically. The sorted order also decides
/// which participant occupies the `a` slot in match and thread rows.
pub fn sorted_users(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Like,
    Skip,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Like => "like",
            DecisionStatus::Skip => "skip",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "like" => Some(DecisionStatus::Like),
            "skip" => Some(DecisionStatus::Skip),
            _ => None,
        }
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile data owned by the external profile collaborator. The core only
/// reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub name: String,
    pub age: i32,
    pub bio: String,
    pub gender: String,
    pub hobbies: Vec<String>,
    pub likes: Vec<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One user's recorded like/skip of a candidate. Unique per
/// (liker_id, liked_id); a repeated swipe updates the stored row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: i64,
    pub liker_id: String,
    pub liked_id: String,
    pub status: DecisionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDecision {
    pub liker_id: String,
    pub liked_id: String,
    pub status: DecisionStatus,
}

/// A symmetric match between two users, addressed by pair key.
/// `user_a < user_b` lexicographically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub pair_key: PairKey,
    pub user_a: String,
    pub user_b: String,
    pub created_at: DateTime<Utc>,
}

/// The chat channel of a match, 1:1 with the match row at the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    pub pair_key: PairKey,
    pub user_a: String,
    pub user_b: String,
    pub created_at: DateTime<Utc>,
    pub last_message: String,
    pub unread_a: bool,
    pub unread_b: bool,
}

impl ChatThread {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    pub fn peer_of(&self, user_id: &str) -> Option<&str> {
        if self.user_a == user_id {
            Some(&self.user_b)
        } else if self.user_b == user_id {
            Some(&self.user_a)
        } else {
            None
        }
    }

    pub fn unread_for(&self, user_id: &str) -> Option<bool> {
        if self.user_a == user_id {
            Some(self.unread_a)
        } else if self.user_b == user_id {
            Some(self.unread_b)
        } else {
            None
        }
    }
}

/// An immutable chat message. Timestamps are assigned by the store at
/// write time; ordering is (created_at, id) ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub pair_key: PairKey,
    pub sender_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub pair_key: PairKey,
    pub sender_id: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("alice", "bob"; "already sorted")]
    #[test_case("bob", "alice"; "reverse order")]
    #[test_case("u42", "u7"; "numeric suffixes sort lexicographically")]
    fn pair_key_is_order_independent(a: &str, b: &str) {
        assert_eq!(PairKey::of(a, b), PairKey::of(b, a));
    }

    #[test]
    fn pair_key_joins_sorted_ids_with_separator() {
        assert_eq!(PairKey::of("bob", "alice").as_str(), "alice_bob");
    }

    #[test]
    fn pair_key_of_equal_ids_is_stable() {
        assert_eq!(PairKey::of("alice", "alice").as_str(), "alice_alice");
    }

    #[test]
    fn decision_status_round_trips_through_str() {
        for status in [DecisionStatus::Like, DecisionStatus::Skip] {
            assert_eq!(DecisionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DecisionStatus::parse("superlike"), None);
    }

    fn thread() -> ChatThread {
        ChatThread {
            pair_key: PairKey::of("alice", "bob"),
            user_a: "alice".to_string(),
            user_b: "bob".to_string(),
            created_at: Utc::now(),
            last_message: String::new(),
            unread_a: false,
            unread_b: true,
        }
    }

    #[test]
    fn thread_peer_and_unread_lookups_follow_slots() {
        let thread = thread();
        assert_eq!(thread.peer_of("alice"), Some("bob"));
        assert_eq!(thread.peer_of("bob"), Some("alice"));
        assert_eq!(thread.peer_of("mallory"), None);
        assert_eq!(thread.unread_for("alice"), Some(false));
        assert_eq!(thread.unread_for("bob"), Some(true));
        assert_eq!(thread.unread_for("mallory"), None);
        assert!(thread.is_participant("alice"));
        assert!(!thread.is_participant("mallory"));
    }
}
