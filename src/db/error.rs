use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(String),

    /// A write that requires an existing row found none, e.g. an append
    /// into a chat thread an unmatch already deleted.
    #[error("row not found: {0}")]
    NotFound(String),

    #[error("database migration failed: {0}")]
    Migration(String),
}
