use thiserror::Error;

use crate::db::{DatabaseError, PairKey};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Transient store failure. Writes of decisions and provisioning are
    /// retried with backoff before this surfaces; reads surface it
    /// directly to the initiating caller.
    #[error("transient store failure: {0}")]
    Store(#[from] DatabaseError),

    #[error("{operation} exhausted {attempts} attempts, last failure: {last}")]
    WriteExhausted {
        operation: &'static str,
        attempts: u32,
        last: String,
    },

    #[error("a user cannot decide on themselves")]
    SelfDecision,

    #[error("invalid decision status: {0}")]
    InvalidStatus(String),

    #[error("message exceeds {limit} bytes")]
    MessageTooLong { limit: usize },

    /// The pair key names no active match, either because it never
    /// existed or because the pair was unmatched (terminal state).
    #[error("no active match for pair {0}")]
    NotMatched(PairKey),

    #[error("user {user} is not a participant of pair {key}")]
    NotParticipant { key: PairKey, user: String },

    /// A match row exists without its chat thread: partial provisioning
    /// left behind by a non-transactional writer. Repaired by the
    /// provisioner's reconcile pass.
    #[error("match {0} has no chat thread")]
    MissingThread(PairKey),
}
