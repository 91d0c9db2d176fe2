pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::models::{
    ChatThread, Decision, DecisionStatus, Match, Message, NewDecision, NewMessage, PairKey,
    Profile,
};
pub use self::stores::{DecisionStore, MatchStore, MessageStore, ProfileStore, ThreadStore};

pub mod error;
pub mod manager;
pub mod models;
pub mod schema_sqlite;
pub mod sqlite;
pub mod stores;
