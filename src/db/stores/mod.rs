use async_trait::async_trait;

use super::DatabaseError;
use super::models::{
    ChatThread, Decision, Match, Message, NewDecision, NewMessage, PairKey, Profile,
};

/// Read surface of the external profile collaborator. The write path
/// exists only for that collaborator (and test seeding); the core never
/// mutates profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError>;
    async fn list_profiles(&self) -> Result<Vec<Profile>, DatabaseError>;
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Merge-writes the decision keyed by (liker_id, liked_id) and returns
    /// the stored row. A repeated swipe overwrites status and timestamp.
    async fn upsert_decision(&self, decision: &NewDecision) -> Result<Decision, DatabaseError>;
    async fn get_decision(
        &self,
        liker_id: &str,
        liked_id: &str,
    ) -> Result<Option<Decision>, DatabaseError>;
    /// All candidate ids the liker has decided on, like or skip.
    async fn decided_candidate_ids(&self, liker_id: &str) -> Result<Vec<String>, DatabaseError>;
    /// Whether a like from `liker_id` to `liked_id` exists.
    async fn has_like(&self, liker_id: &str, liked_id: &str) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Upserts the match row and its chat thread in one transaction,
    /// keyed by pair key. Idempotent: any number of calls for the same
    /// pair converge to one match and one thread.
    async fn provision_pair(
        &self,
        match_row: &Match,
        thread: &ChatThread,
    ) -> Result<(), DatabaseError>;
    async fn get_match(&self, key: &PairKey) -> Result<Option<Match>, DatabaseError>;
    async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, DatabaseError>;
    async fn count_matches(&self) -> Result<i64, DatabaseError>;
    /// Match rows whose chat thread is missing (partial provisioning left
    /// behind by non-transactional writers).
    async fn matches_missing_thread(&self) -> Result<Vec<Match>, DatabaseError>;
    /// Deletes the match, its thread and its message log in one
    /// transaction. Returns whether a match row existed.
    async fn unmatch_pair(&self, key: &PairKey) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn get_thread(&self, key: &PairKey) -> Result<Option<ChatThread>, DatabaseError>;
    async fn threads_for_user(&self, user_id: &str) -> Result<Vec<ChatThread>, DatabaseError>;
    /// Clears the caller's unread flag. Returns whether the thread existed.
    async fn mark_read(&self, key: &PairKey, user_id: &str) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends the message with a store-assigned timestamp and, in the
    /// same transaction, updates the owning thread's last_message and the
    /// recipient's unread flag.
    async fn append_message(&self, message: &NewMessage) -> Result<Message, DatabaseError>;
    /// Full message log for the pair, ordered by (created_at, id)
    /// ascending.
    async fn list_messages(&self, key: &PairKey) -> Result<Vec<Message>, DatabaseError>;
}
