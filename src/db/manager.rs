use std::sync::Arc;

use diesel::RunQueryDsl;
use diesel::sqlite::SqliteConnection;
use diesel::Connection;

use crate::config::DatabaseConfig;
use crate::db::sqlite::{
    SqliteDecisionStore, SqliteMatchStore, SqliteMessageStore, SqliteProfileStore,
    SqliteThreadStore,
};
use crate::db::{
    DatabaseError, DecisionStore, MatchStore, MessageStore, ProfileStore, ThreadStore,
};

#[derive(Clone)]
pub struct DatabaseManager {
    sqlite_path: String,
    profile_store: Arc<dyn ProfileStore>,
    decision_store: Arc<dyn DecisionStore>,
    match_store: Arc<dyn MatchStore>,
    thread_store: Arc<dyn ThreadStore>,
    message_store: Arc<dyn MessageStore>,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let path = config.sqlite_path().ok_or_else(|| {
            DatabaseError::Connection("database file is not configured".to_string())
        })?;
        let path_arc = Arc::new(path.clone());

        Ok(Self {
            sqlite_path: path,
            profile_store: Arc::new(SqliteProfileStore::new(path_arc.clone())),
            decision_store: Arc::new(SqliteDecisionStore::new(path_arc.clone())),
            match_store: Arc::new(SqliteMatchStore::new(path_arc.clone())),
            thread_store: Arc::new(SqliteThreadStore::new(path_arc.clone())),
            message_store: Arc::new(SqliteMessageStore::new(path_arc)),
        })
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        let path = self.sqlite_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = SqliteConnection::establish(&path)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS profiles (
                    user_id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    age INTEGER NOT NULL,
                    bio TEXT NOT NULL DEFAULT '',
                    gender TEXT NOT NULL DEFAULT '',
                    hobbies TEXT NOT NULL DEFAULT '[]',
                    likes TEXT NOT NULL DEFAULT '[]',
                    image_url TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS decisions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    liker_id TEXT NOT NULL,
                    liked_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE(liker_id, liked_id)
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS matches (
                    pair_key TEXT PRIMARY KEY,
                    user_a TEXT NOT NULL,
                    user_b TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS chat_threads (
                    pair_key TEXT PRIMARY KEY,
                    user_a TEXT NOT NULL,
                    user_b TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    last_message TEXT NOT NULL DEFAULT '',
                    unread_a BOOLEAN NOT NULL DEFAULT 0,
                    unread_b BOOLEAN NOT NULL DEFAULT 0
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    pair_key TEXT NOT NULL,
                    sender_id TEXT NOT NULL,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_decisions_liker ON decisions(liker_id)",
                "CREATE INDEX IF NOT EXISTS idx_decisions_liked ON decisions(liked_id, liker_id)",
                "CREATE INDEX IF NOT EXISTS idx_matches_user_a ON matches(user_a)",
                "CREATE INDEX IF NOT EXISTS idx_matches_user_b ON matches(user_b)",
                "CREATE INDEX IF NOT EXISTS idx_threads_user_a ON chat_threads(user_a)",
                "CREATE INDEX IF NOT EXISTS idx_threads_user_b ON chat_threads(user_b)",
                "CREATE INDEX IF NOT EXISTS idx_messages_pair ON messages(pair_key, created_at)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    pub fn profile_store(&self) -> Arc<dyn ProfileStore> {
        self.profile_store.clone()
    }

    pub fn decision_store(&self) -> Arc<dyn DecisionStore> {
        self.decision_store.clone()
    }

    pub fn match_store(&self) -> Arc<dyn MatchStore> {
        self.match_store.clone()
    }

    pub fn thread_store(&self) -> Arc<dyn ThreadStore> {
        self.thread_store.clone()
    }

    pub fn message_store(&self) -> Arc<dyn MessageStore> {
        self.message_store.clone()
    }

    /// Deletes a chat thread behind the stores' backs, to stage the
    /// partial-provisioning state the reconcile pass repairs.
    #[cfg(test)]
    pub async fn delete_thread_for_test(
        &self,
        key: &crate::db::models::PairKey,
    ) -> Result<(), DatabaseError> {
        let path = self.sqlite_path.clone();
        let key = key.as_str().to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = SqliteConnection::establish(&path)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            diesel::sql_query("DELETE FROM chat_threads WHERE pair_key = ?")
                .bind::<diesel::sql_types::Text, _>(key)
                .execute(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("test task failed: {e}")))?
    }
}
