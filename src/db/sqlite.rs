use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use crate::db::schema_sqlite::{chat_threads, decisions, matches, messages, profiles};

use super::{
    DatabaseError,
    models::{
        ChatThread, Decision, DecisionStatus, Match, Message, NewDecision, NewMessage, PairKey,
        Profile,
    },
};

// Helper function to convert DateTime to ISO string for SQLite
fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// Helper function to parse ISO string to DateTime
fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Query(format!("invalid datetime format: {}", e)))
}

fn string_to_status(s: &str) -> Result<DecisionStatus, DatabaseError> {
    DecisionStatus::parse(s)
        .ok_or_else(|| DatabaseError::Query(format!("invalid decision status: {s}")))
}

// hobbies/likes are stored as JSON arrays in a TEXT column
fn string_to_list(s: &str) -> Result<Vec<String>, DatabaseError> {
    serde_json::from_str(s).map_err(|e| DatabaseError::Query(format!("invalid list column: {e}")))
}

fn list_to_string(list: &[String]) -> Result<String, DatabaseError> {
    serde_json::to_string(list).map_err(|e| DatabaseError::Query(e.to_string()))
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = profiles)]
struct DbProfile {
    user_id: String,
    name: String,
    age: i32,
    bio: String,
    gender: String,
    hobbies: String,
    likes: String,
    image_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl DbProfile {
    fn to_profile(&self) -> Result<Profile, DatabaseError> {
        Ok(Profile {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            age: self.age,
            bio: self.bio.clone(),
            gender: self.gender.clone(),
            hobbies: string_to_list(&self.hobbies)?,
            likes: string_to_list(&self.likes)?,
            image_url: self.image_url.clone(),
            created_at: string_to_datetime(&self.created_at)?,
            updated_at: string_to_datetime(&self.updated_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = profiles)]
struct NewProfileRow<'a> {
    user_id: &'a str,
    name: &'a str,
    age: i32,
    bio: &'a str,
    gender: &'a str,
    hobbies: String,
    likes: String,
    image_url: Option<&'a str>,
    created_at: String,
    updated_at: String,
}

// SQLite uses i32 for INTEGER primary keys, but we keep i64 in our API
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = decisions)]
struct DbDecision {
    id: i32,
    liker_id: String,
    liked_id: String,
    status: String,
    created_at: String,
}

impl DbDecision {
    fn to_decision(&self) -> Result<Decision, DatabaseError> {
        Ok(Decision {
            id: self.id as i64,
            liker_id: self.liker_id.clone(),
            liked_id: self.liked_id.clone(),
            status: string_to_status(&self.status)?,
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = decisions)]
struct NewDecisionRow<'a> {
    liker_id: &'a str,
    liked_id: &'a str,
    status: &'a str,
    created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = matches)]
struct DbMatch {
    pair_key: String,
    user_a: String,
    user_b: String,
    created_at: String,
}

impl DbMatch {
    fn to_match(&self) -> Result<Match, DatabaseError> {
        Ok(Match {
            pair_key: PairKey::from_raw(self.pair_key.clone()),
            user_a: self.user_a.clone(),
            user_b: self.user_b.clone(),
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = matches)]
struct NewMatchRow<'a> {
    pair_key: &'a str,
    user_a: &'a str,
    user_b: &'a str,
    created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = chat_threads)]
struct DbChatThread {
    pair_key: String,
    user_a: String,
    user_b: String,
    created_at: String,
    last_message: String,
    unread_a: bool,
    unread_b: bool,
}

impl DbChatThread {
    fn to_thread(&self) -> Result<ChatThread, DatabaseError> {
        Ok(ChatThread {
            pair_key: PairKey::from_raw(self.pair_key.clone()),
            user_a: self.user_a.clone(),
            user_b: self.user_b.clone(),
            created_at: string_to_datetime(&self.created_at)?,
            last_message: self.last_message.clone(),
            unread_a: self.unread_a,
            unread_b: self.unread_b,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = chat_threads)]
struct NewChatThreadRow<'a> {
    pair_key: &'a str,
    user_a: &'a str,
    user_b: &'a str,
    created_at: String,
    last_message: &'a str,
    unread_a: bool,
    unread_b: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = messages)]
struct DbMessage {
    id: i32,
    pair_key: String,
    sender_id: String,
    body: String,
    created_at: String,
}

impl DbMessage {
    fn to_message(&self) -> Result<Message, DatabaseError> {
        Ok(Message {
            id: self.id as i64,
            pair_key: PairKey::from_raw(self.pair_key.clone()),
            sender_id: self.sender_id.clone(),
            body: self.body.clone(),
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = messages)]
struct NewMessageRow<'a> {
    pair_key: &'a str,
    sender_id: &'a str,
    body: &'a str,
    created_at: String,
}

fn establish_connection(path: &str) -> Result<SqliteConnection, DatabaseError> {
    SqliteConnection::establish(path).map_err(|e| DatabaseError::Connection(e.to_string()))
}

pub struct SqliteProfileStore {
    db_path: Arc<String>,
}

impl SqliteProfileStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::ProfileStore for SqliteProfileStore {
    async fn get_profile(&self, user_id_param: &str) -> Result<Option<Profile>, DatabaseError> {
        let user_id_param = user_id_param.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::profiles::dsl::*;
            profiles
                .filter(user_id.eq(user_id_param))
                .select(DbProfile::as_select())
                .first::<DbProfile>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|p| p.to_profile())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::profiles::dsl::*;
            let results = profiles
                .select(DbProfile::as_select())
                .load::<DbProfile>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            results.into_iter().map(|p| p.to_profile()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        let profile = profile.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let row = NewProfileRow {
                user_id: &profile.user_id,
                name: &profile.name,
                age: profile.age,
                bio: &profile.bio,
                gender: &profile.gender,
                hobbies: list_to_string(&profile.hobbies)?,
                likes: list_to_string(&profile.likes)?,
                image_url: profile.image_url.as_deref(),
                created_at: datetime_to_string(&profile.created_at),
                updated_at: datetime_to_string(&profile.updated_at),
            };

            diesel::insert_into(profiles::table)
                .values(&row)
                .on_conflict(profiles::user_id)
                .do_update()
                .set((
                    profiles::name.eq(&profile.name),
                    profiles::age.eq(profile.age),
                    profiles::bio.eq(&profile.bio),
                    profiles::gender.eq(&profile.gender),
                    profiles::hobbies.eq(list_to_string(&profile.hobbies)?),
                    profiles::likes.eq(list_to_string(&profile.likes)?),
                    profiles::image_url.eq(profile.image_url.as_deref()),
                    profiles::updated_at.eq(datetime_to_string(&profile.updated_at)),
                ))
                .execute(&mut conn)
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteDecisionStore {
    db_path: Arc<String>,
}

impl SqliteDecisionStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::DecisionStore for SqliteDecisionStore {
    async fn upsert_decision(&self, decision: &NewDecision) -> Result<Decision, DatabaseError> {
        let decision = decision.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            // timestamp assigned by the store, not the caller
            let now = datetime_to_string(&Utc::now());
            let row = NewDecisionRow {
                liker_id: &decision.liker_id,
                liked_id: &decision.liked_id,
                status: decision.status.as_str(),
                created_at: now.clone(),
            };

            diesel::insert_into(decisions::table)
                .values(&row)
                .on_conflict((decisions::liker_id, decisions::liked_id))
                .do_update()
                .set((
                    decisions::status.eq(decision.status.as_str()),
                    decisions::created_at.eq(&now),
                ))
                .execute(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;

            decisions::table
                .filter(decisions::liker_id.eq(&decision.liker_id))
                .filter(decisions::liked_id.eq(&decision.liked_id))
                .select(DbDecision::as_select())
                .first::<DbDecision>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .to_decision()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_decision(
        &self,
        liker_id_param: &str,
        liked_id_param: &str,
    ) -> Result<Option<Decision>, DatabaseError> {
        let liker_id_param = liker_id_param.to_string();
        let liked_id_param = liked_id_param.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::decisions::dsl::*;
            decisions
                .filter(liker_id.eq(liker_id_param))
                .filter(liked_id.eq(liked_id_param))
                .select(DbDecision::as_select())
                .first::<DbDecision>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|d| d.to_decision())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn decided_candidate_ids(
        &self,
        liker_id_param: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let liker_id_param = liker_id_param.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::decisions::dsl::*;
            decisions
                .filter(liker_id.eq(liker_id_param))
                .select(liked_id)
                .load::<String>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn has_like(
        &self,
        liker_id_param: &str,
        liked_id_param: &str,
    ) -> Result<bool, DatabaseError> {
        let liker_id_param = liker_id_param.to_string();
        let liked_id_param = liked_id_param.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::decisions::dsl::*;
            let count: i64 = decisions
                .filter(liker_id.eq(liker_id_param))
                .filter(liked_id.eq(liked_id_param))
                .filter(status.eq(DecisionStatus::Like.as_str()))
                .count()
                .get_result(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            Ok(count > 0)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteMatchStore {
    db_path: Arc<String>,
}

impl SqliteMatchStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::MatchStore for SqliteMatchStore {
    async fn provision_pair(
        &self,
        match_row: &Match,
        thread: &ChatThread,
    ) -> Result<(), DatabaseError> {
        let match_row = match_row.clone();
        let thread = thread.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let new_match = NewMatchRow {
                    pair_key: match_row.pair_key.as_str(),
                    user_a: &match_row.user_a,
                    user_b: &match_row.user_b,
                    created_at: datetime_to_string(&match_row.created_at),
                };
                // On conflict only the participants are rewritten; the
                // original created_at survives re-provisioning.
                diesel::insert_into(matches::table)
                    .values(&new_match)
                    .on_conflict(matches::pair_key)
                    .do_update()
                    .set((
                        matches::user_a.eq(&match_row.user_a),
                        matches::user_b.eq(&match_row.user_b),
                    ))
                    .execute(conn)?;

                let new_thread = NewChatThreadRow {
                    pair_key: thread.pair_key.as_str(),
                    user_a: &thread.user_a,
                    user_b: &thread.user_b,
                    created_at: datetime_to_string(&thread.created_at),
                    last_message: &thread.last_message,
                    unread_a: thread.unread_a,
                    unread_b: thread.unread_b,
                };
                // Re-provisioning must not clobber last_message or the
                // unread flags of a live thread.
                diesel::insert_into(chat_threads::table)
                    .values(&new_thread)
                    .on_conflict(chat_threads::pair_key)
                    .do_update()
                    .set((
                        chat_threads::user_a.eq(&thread.user_a),
                        chat_threads::user_b.eq(&thread.user_b),
                    ))
                    .execute(conn)?;

                Ok(())
            })
            .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_match(&self, key: &PairKey) -> Result<Option<Match>, DatabaseError> {
        let key = key.as_str().to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::matches::dsl::*;
            matches
                .filter(pair_key.eq(key))
                .select(DbMatch::as_select())
                .first::<DbMatch>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|m| m.to_match())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, DatabaseError> {
        let user_id = user_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::matches::dsl::*;
            let results = matches
                .filter(user_a.eq(&user_id).or(user_b.eq(&user_id)))
                .order(created_at.desc())
                .select(DbMatch::as_select())
                .load::<DbMatch>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            results.into_iter().map(|m| m.to_match()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_matches(&self) -> Result<i64, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::matches::dsl::*;
            matches
                .count()
                .get_result(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn matches_missing_thread(&self) -> Result<Vec<Match>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let results = diesel::sql_query(
                "SELECT m.pair_key, m.user_a, m.user_b, m.created_at FROM matches m \
                 LEFT JOIN chat_threads t ON t.pair_key = m.pair_key \
                 WHERE t.pair_key IS NULL",
            )
            .load::<DbMatch>(&mut conn)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
            results.into_iter().map(|m| m.to_match()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn unmatch_pair(&self, key: &PairKey) -> Result<bool, DatabaseError> {
        let key = key.as_str().to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                // Cascade: the message log goes with the thread.
                diesel::delete(messages::table.filter(messages::pair_key.eq(&key)))
                    .execute(conn)?;
                diesel::delete(chat_threads::table.filter(chat_threads::pair_key.eq(&key)))
                    .execute(conn)?;
                let deleted =
                    diesel::delete(matches::table.filter(matches::pair_key.eq(&key)))
                        .execute(conn)?;
                Ok(deleted > 0)
            })
            .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteThreadStore {
    db_path: Arc<String>,
}

impl SqliteThreadStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::ThreadStore for SqliteThreadStore {
    async fn get_thread(&self, key: &PairKey) -> Result<Option<ChatThread>, DatabaseError> {
        let key = key.as_str().to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::chat_threads::dsl::*;
            chat_threads
                .filter(pair_key.eq(key))
                .select(DbChatThread::as_select())
                .first::<DbChatThread>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|t| t.to_thread())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn threads_for_user(&self, user_id: &str) -> Result<Vec<ChatThread>, DatabaseError> {
        let user_id = user_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::chat_threads::dsl::*;
            let results = chat_threads
                .filter(user_a.eq(&user_id).or(user_b.eq(&user_id)))
                .order(created_at.desc())
                .select(DbChatThread::as_select())
                .load::<DbChatThread>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            results.into_iter().map(|t| t.to_thread()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn mark_read(&self, key: &PairKey, user_id: &str) -> Result<bool, DatabaseError> {
        let key = key.as_str().to_string();
        let user_id = user_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let thread = chat_threads::table
                .filter(chat_threads::pair_key.eq(&key))
                .select(DbChatThread::as_select())
                .first::<DbChatThread>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?;

            let Some(thread) = thread else {
                return Ok(false);
            };

            let updated = if thread.user_a == user_id {
                diesel::update(chat_threads::table.filter(chat_threads::pair_key.eq(&key)))
                    .set(chat_threads::unread_a.eq(false))
                    .execute(&mut conn)
            } else if thread.user_b == user_id {
                diesel::update(chat_threads::table.filter(chat_threads::pair_key.eq(&key)))
                    .set(chat_threads::unread_b.eq(false))
                    .execute(&mut conn)
            } else {
                return Ok(false);
            };

            updated
                .map(|_| true)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteMessageStore {
    db_path: Arc<String>,
}

impl SqliteMessageStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::MessageStore for SqliteMessageStore {
    async fn append_message(&self, message: &NewMessage) -> Result<Message, DatabaseError> {
        let message = message.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let stored = conn
                .transaction::<_, diesel::result::Error, _>(|conn| {
                    // The thread is re-checked inside the transaction: an
                    // unmatch committed after the caller's own check must
                    // fail the append instead of leaving an orphan row.
                    let thread = chat_threads::table
                        .filter(chat_threads::pair_key.eq(message.pair_key.as_str()))
                        .select(DbChatThread::as_select())
                        .first::<DbChatThread>(conn)
                        .optional()?
                        .ok_or(diesel::result::Error::NotFound)?;

                    let row = NewMessageRow {
                        pair_key: message.pair_key.as_str(),
                        sender_id: &message.sender_id,
                        body: &message.body,
                        created_at: datetime_to_string(&Utc::now()),
                    };
                    diesel::insert_into(messages::table).values(&row).execute(conn)?;

                    // Highest rowid for the pair is the row just written,
                    // since we are still inside the write transaction.
                    let stored = messages::table
                        .filter(messages::pair_key.eq(message.pair_key.as_str()))
                        .order(messages::id.desc())
                        .select(DbMessage::as_select())
                        .first::<DbMessage>(conn)?;

                    if thread.user_a == message.sender_id {
                        diesel::update(
                            chat_threads::table
                                .filter(chat_threads::pair_key.eq(message.pair_key.as_str())),
                        )
                        .set((
                            chat_threads::last_message.eq(&message.body),
                            chat_threads::unread_b.eq(true),
                        ))
                        .execute(conn)?;
                    } else {
                        diesel::update(
                            chat_threads::table
                                .filter(chat_threads::pair_key.eq(message.pair_key.as_str())),
                        )
                        .set((
                            chat_threads::last_message.eq(&message.body),
                            chat_threads::unread_a.eq(true),
                        ))
                        .execute(conn)?;
                    }

                    Ok(stored)
                })
                .map_err(|e| match e {
                    diesel::result::Error::NotFound => DatabaseError::NotFound(format!(
                        "chat thread {}",
                        message.pair_key
                    )),
                    e => DatabaseError::Query(e.to_string()),
                })?;

            stored.to_message()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_messages(&self, key: &PairKey) -> Result<Vec<Message>, DatabaseError> {
        let key = key.as_str().to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::messages::dsl::*;
            let results = messages
                .filter(pair_key.eq(key))
                .order((created_at.asc(), id.asc()))
                .select(DbMessage::as_select())
                .load::<DbMessage>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            results.into_iter().map(|m| m.to_message()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}
