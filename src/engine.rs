pub mod chat;
pub mod decision;
pub mod error;
pub mod feed;
pub mod provision;
pub(crate) mod retry;
pub mod unmatch;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::db::{
    DatabaseManager, Decision, DecisionStatus, Match, MatchStore, PairKey, Profile, ProfileStore,
    ThreadStore,
};

pub use chat::{ChatSubscription, ChatSynchronizer, ChatUpdate};
pub use decision::{DecisionRecorder, MutualMatchDetector};
pub use error::EngineError;
pub use feed::CandidateFeed;
pub use provision::MatchProvisioner;
pub use unmatch::UnmatchCoordinator;

use retry::WritePolicy;

/// Notification emitted on state transitions other components react to.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    MatchFound { key: PairKey, users: [String; 2] },
    Unmatched { key: PairKey },
}

/// The result of one recorded swipe.
#[derive(Debug, Clone)]
pub struct SwipeOutcome {
    pub decision: Decision,
    /// Populated when the swipe completed a mutual like and the pair is
    /// now matched.
    pub matched: Option<Match>,
}

/// One entry of a user's chat list.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    pub pair_key: PairKey,
    pub peer: Option<Profile>,
    pub last_message: String,
    pub unread: bool,
    pub matched_at: DateTime<Utc>,
}

/// Facade over the matching pipeline: candidate feed, decision
/// recording, mutual-match provisioning, chat synchronization and
/// unmatch teardown, all sharing one store layer.
pub struct MatchEngine {
    feed: CandidateFeed,
    recorder: DecisionRecorder,
    detector: MutualMatchDetector,
    provisioner: MatchProvisioner,
    chat: Arc<ChatSynchronizer>,
    unmatcher: UnmatchCoordinator,
    profiles: Arc<dyn ProfileStore>,
    matches: Arc<dyn MatchStore>,
    threads: Arc<dyn ThreadStore>,
    events: broadcast::Sender<EngineEvent>,
}

impl MatchEngine {
    pub fn new(db: &DatabaseManager, config: &Config) -> Self {
        let (events, _) = broadcast::channel(64);
        let policy = WritePolicy::from_limits(&config.limits);

        let chat = Arc::new(ChatSynchronizer::new(
            db.thread_store(),
            db.message_store(),
            db.match_store(),
            config.chat.clone(),
        ));

        Self {
            feed: CandidateFeed::new(db.profile_store(), db.decision_store(), db.match_store()),
            recorder: DecisionRecorder::new(db.decision_store(), policy.clone()),
            detector: MutualMatchDetector::new(db.decision_store()),
            provisioner: MatchProvisioner::new(db.match_store(), events.clone(), policy),
            unmatcher: UnmatchCoordinator::new(db.match_store(), chat.clone(), events.clone()),
            chat,
            profiles: db.profile_store(),
            matches: db.match_store(),
            threads: db.thread_store(),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn chat(&self) -> &ChatSynchronizer {
        &self.chat
    }

    /// Candidates the viewer has not decided on yet.
    pub async fn candidates(&self, viewer_id: &str) -> Result<Vec<Profile>, EngineError> {
        self.feed.candidates(viewer_id).await
    }

    /// Records a swipe. A like that completes a mutual pair provisions
    /// the match and its chat thread before returning.
    pub async fn swipe(
        &self,
        liker_id: &str,
        liked_id: &str,
        status: DecisionStatus,
    ) -> Result<SwipeOutcome, EngineError> {
        let decision = self.recorder.record(liker_id, liked_id, status).await?;

        let matched = if status == DecisionStatus::Like
            && self.detector.is_mutual(liker_id, liked_id).await?
        {
            Some(self.provisioner.provision(liker_id, liked_id).await?)
        } else {
            None
        };

        Ok(SwipeOutcome { decision, matched })
    }

    pub async fn matches_for(&self, user_id: &str) -> Result<Vec<Match>, EngineError> {
        Ok(self.matches.matches_for_user(user_id).await?)
    }

    pub async fn count_matches(&self) -> Result<i64, EngineError> {
        Ok(self.matches.count_matches().await?)
    }

    /// The user's chat list, newest match first, each entry joined with
    /// the peer's profile when it is still available.
    pub async fn chat_list(&self, user_id: &str) -> Result<Vec<ThreadSummary>, EngineError> {
        let mut threads = self.threads.threads_for_user(user_id).await?;
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let peers = futures::future::try_join_all(threads.iter().map(|thread| {
            let profiles = self.profiles.clone();
            async move {
                match thread.peer_of(user_id) {
                    Some(peer_id) => profiles.get_profile(peer_id).await,
                    None => Ok(None),
                }
            }
        }))
        .await?;

        Ok(threads
            .into_iter()
            .zip(peers)
            .map(|(thread, peer)| ThreadSummary {
                pair_key: thread.pair_key.clone(),
                peer,
                last_message: thread.last_message.clone(),
                unread: thread.unread_for(user_id).unwrap_or(false),
                matched_at: thread.created_at,
            })
            .collect())
    }

    /// Repairs partially provisioned pairs. Run once at startup.
    pub async fn reconcile(&self) -> Result<usize, EngineError> {
        self.provisioner.reconcile().await
    }

    pub async fn unmatch(&self, key: &PairKey) -> Result<(), EngineError> {
        self.unmatcher.unmatch(key).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::NamedTempFile;

    use crate::config::Config;
    use crate::db::{DatabaseManager, DecisionStatus, PairKey, Profile};

    use super::{ChatUpdate, EngineError, MatchEngine};

    fn test_config(db_path: &str) -> Config {
        let mut config: Config =
            serde_yaml::from_str("database: {}\n").expect("empty config parses");
        config.database.filename = Some(db_path.to_string());
        config
    }

    fn profile(user_id: &str, name: &str) -> Profile {
        let now = Utc::now();
        Profile {
            user_id: user_id.to_string(),
            name: name.to_string(),
            age: 30,
            bio: String::new(),
            gender: String::new(),
            hobbies: vec!["hiking".to_string()],
            likes: vec![],
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn engine_fixture(users: &[&str]) -> (MatchEngine, DatabaseManager, NamedTempFile) {
        let file = NamedTempFile::new().expect("temp database file");
        let path = file.path().to_string_lossy().to_string();
        let config = test_config(&path);

        let db = DatabaseManager::new(&config.database)
            .await
            .expect("database manager");
        db.migrate().await.expect("migrations run");

        for user in users {
            db.profile_store()
                .upsert_profile(&profile(user, user))
                .await
                .expect("seed profile");
        }

        let engine = MatchEngine::new(&db, &config);
        (engine, db, file)
    }

    #[tokio::test]
    async fn mutual_like_provisions_exactly_one_match() {
        let (engine, db, _file) = engine_fixture(&["alice", "bob"]).await;

        let first = engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("first swipe");
        assert!(first.matched.is_none());

        let second = engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("second swipe");
        let matched = second.matched.expect("mutual like matches");
        assert_eq!(matched.pair_key, PairKey::of("bob", "alice"));

        assert_eq!(db.match_store().count_matches().await.expect("count"), 1);
        let thread = db
            .thread_store()
            .get_thread(&matched.pair_key)
            .await
            .expect("thread lookup")
            .expect("thread provisioned with match");
        assert!(!thread.unread_a);
        assert!(!thread.unread_b);
    }

    #[tokio::test]
    async fn like_then_skip_does_not_match() {
        let (engine, db, _file) = engine_fixture(&["alice", "bob"]).await;

        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("like");
        let outcome = engine
            .swipe("bob", "alice", DecisionStatus::Skip)
            .await
            .expect("skip");

        assert!(outcome.matched.is_none());
        assert_eq!(db.match_store().count_matches().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn simultaneous_mutual_likes_converge_to_one_match() {
        let (engine, db, _file) = engine_fixture(&["alice", "bob"]).await;

        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("alice likes bob");
        engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("bob likes alice");
        // Both sides can observe mutuality and provision; the second
        // write must be absorbed, not duplicated.
        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("alice re-swipes");

        assert_eq!(db.match_store().count_matches().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn self_swipe_is_rejected() {
        let (engine, _db, _file) = engine_fixture(&["alice"]).await;

        let result = engine.swipe("alice", "alice", DecisionStatus::Like).await;
        assert!(matches!(result, Err(EngineError::SelfDecision)));
    }

    #[tokio::test]
    async fn feed_excludes_decided_matched_and_self() {
        let (engine, _db, _file) =
            engine_fixture(&["alice", "bob", "carol", "dave", "erin"]).await;

        engine
            .swipe("alice", "bob", DecisionStatus::Skip)
            .await
            .expect("skip bob");
        engine
            .swipe("alice", "carol", DecisionStatus::Like)
            .await
            .expect("like carol");
        engine
            .swipe("carol", "alice", DecisionStatus::Like)
            .await
            .expect("carol likes back");

        let feed = engine.candidates("alice").await.expect("feed");
        let mut ids: Vec<&str> = feed.iter().map(|p| p.user_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["dave", "erin"]);
    }

    #[tokio::test]
    async fn subscription_delivers_snapshot_then_increments() {
        let (engine, _db, _file) = engine_fixture(&["alice", "bob"]).await;
        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("like");
        engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("match");
        let key = PairKey::of("alice", "bob");

        engine
            .chat()
            .send(&key, "alice", "hi bob")
            .await
            .expect("send")
            .expect("message stored");

        let mut sub = engine
            .chat()
            .subscribe(&key, "bob")
            .await
            .expect("subscribe");

        match sub.recv().await.expect("recv") {
            Some(ChatUpdate::Snapshot(log)) => {
                assert_eq!(log.len(), 1);
                assert_eq!(log[0].body, "hi bob");
            }
            other => panic!("expected snapshot first, got {other:?}"),
        }

        engine
            .chat()
            .send(&key, "bob", "hi alice")
            .await
            .expect("reply")
            .expect("message stored");

        match sub.recv().await.expect("recv") {
            Some(ChatUpdate::Appended(message)) => {
                assert_eq!(message.sender_id, "bob");
                assert_eq!(message.body, "hi alice");
            }
            other => panic!("expected append, got {other:?}"),
        }

        sub.unsubscribe();
        assert!(sub.recv().await.expect("recv").is_none());
    }

    #[tokio::test]
    async fn replayed_append_is_not_delivered_twice() {
        let (engine, _db, _file) = engine_fixture(&["alice", "bob"]).await;
        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("like");
        engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("match");
        let key = PairKey::of("alice", "bob");

        let first = engine
            .chat()
            .send(&key, "alice", "hi bob")
            .await
            .expect("send")
            .expect("message stored");

        let mut sub = engine
            .chat()
            .subscribe(&key, "bob")
            .await
            .expect("subscribe");
        match sub.recv().await.expect("recv") {
            Some(ChatUpdate::Snapshot(log)) => assert_eq!(log.len(), 1),
            other => panic!("expected snapshot first, got {other:?}"),
        }

        // A send racing with subscribe can land in the snapshot and in
        // the channel; replay that delivery and confirm it is dropped.
        engine
            .chat()
            .broadcast_for_test(&key, ChatUpdate::Appended(first.clone()));
        let second = engine
            .chat()
            .send(&key, "bob", "hi alice")
            .await
            .expect("reply")
            .expect("message stored");

        match sub.recv().await.expect("recv") {
            Some(ChatUpdate::Appended(message)) => {
                assert_eq!(message.id, second.id);
                assert_eq!(message.body, "hi alice");
            }
            other => panic!("expected only the new append, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn whitespace_message_is_a_no_op() {
        let (engine, db, _file) = engine_fixture(&["alice", "bob"]).await;
        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("like");
        engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("match");
        let key = PairKey::of("alice", "bob");

        let sent = engine
            .chat()
            .send(&key, "alice", "   \n  ")
            .await
            .expect("send");
        assert!(sent.is_none());
        assert!(
            db.message_store()
                .list_messages(&key)
                .await
                .expect("log")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn outsider_cannot_send_or_subscribe() {
        let (engine, _db, _file) = engine_fixture(&["alice", "bob", "mallory"]).await;
        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("like");
        engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("match");
        let key = PairKey::of("alice", "bob");

        let send = engine.chat().send(&key, "mallory", "let me in").await;
        assert!(matches!(send, Err(EngineError::NotParticipant { .. })));

        let sub = engine.chat().subscribe(&key, "mallory").await;
        assert!(matches!(sub, Err(EngineError::NotParticipant { .. })));
    }

    #[tokio::test]
    async fn send_updates_chat_list_and_unread_flow() {
        let (engine, _db, _file) = engine_fixture(&["alice", "bob"]).await;
        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("like");
        engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("match");
        let key = PairKey::of("alice", "bob");

        engine
            .chat()
            .send(&key, "alice", "dinner friday?")
            .await
            .expect("send")
            .expect("message stored");

        let bob_list = engine.chat_list("bob").await.expect("bob's chat list");
        assert_eq!(bob_list.len(), 1);
        assert_eq!(bob_list[0].last_message, "dinner friday?");
        assert!(bob_list[0].unread);
        assert_eq!(
            bob_list[0].peer.as_ref().map(|p| p.user_id.as_str()),
            Some("alice")
        );

        let alice_list = engine.chat_list("alice").await.expect("alice's chat list");
        assert!(!alice_list[0].unread);

        engine
            .chat()
            .mark_read(&key, "bob")
            .await
            .expect("mark read");
        let bob_list = engine.chat_list("bob").await.expect("bob's list again");
        assert!(!bob_list[0].unread);
    }

    #[tokio::test]
    async fn unmatch_dissolves_chat_and_closes_subscriptions() {
        let (engine, db, _file) = engine_fixture(&["alice", "bob"]).await;
        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("like");
        engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("match");
        let key = PairKey::of("alice", "bob");

        engine
            .chat()
            .send(&key, "alice", "hey")
            .await
            .expect("send")
            .expect("message stored");

        let mut sub = engine
            .chat()
            .subscribe(&key, "bob")
            .await
            .expect("subscribe");
        assert!(matches!(
            sub.recv().await.expect("snapshot"),
            Some(ChatUpdate::Snapshot(_))
        ));

        engine.unmatch(&key).await.expect("unmatch");

        assert!(matches!(
            sub.recv().await.expect("recv"),
            Some(ChatUpdate::Closed)
        ));
        assert!(sub.recv().await.expect("recv").is_none());

        assert_eq!(db.match_store().count_matches().await.expect("count"), 0);
        assert!(
            db.thread_store()
                .get_thread(&key)
                .await
                .expect("lookup")
                .is_none()
        );

        let send = engine.chat().send(&key, "alice", "anyone there?").await;
        assert!(matches!(send, Err(EngineError::NotMatched(_))));

        let again = engine.unmatch(&key).await;
        assert!(matches!(again, Err(EngineError::NotMatched(_))));
    }

    #[tokio::test]
    async fn unmatched_users_reappear_in_feeds_after_fresh_decisions_reset() {
        let (engine, _db, _file) = engine_fixture(&["alice", "bob"]).await;
        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("like");
        engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("match");
        let key = PairKey::of("alice", "bob");

        engine.unmatch(&key).await.expect("unmatch");

        // Decisions survive the unmatch, so the pair stays out of each
        // other's feeds; only the match and chat are gone.
        let feed = engine.candidates("alice").await.expect("feed");
        assert!(feed.is_empty());
        assert!(engine.matches_for("alice").await.expect("matches").is_empty());
    }

    #[tokio::test]
    async fn swipe_events_are_broadcast() {
        let (engine, _db, _file) = engine_fixture(&["alice", "bob"]).await;
        let mut events = engine.subscribe_events();

        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("like");
        engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("match");
        let key = PairKey::of("alice", "bob");

        match events.recv().await.expect("event") {
            super::EngineEvent::MatchFound { key: event_key, users } => {
                assert_eq!(event_key, key);
                assert_eq!(users, ["alice".to_string(), "bob".to_string()]);
            }
            other => panic!("expected MatchFound, got {other:?}"),
        }

        engine.unmatch(&key).await.expect("unmatch");
        match events.recv().await.expect("event") {
            super::EngineEvent::Unmatched { key: event_key } => assert_eq!(event_key, key),
            other => panic!("expected Unmatched, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reconcile_repairs_partially_provisioned_pairs() {
        let (engine, db, _file) = engine_fixture(&["alice", "bob"]).await;
        engine
            .swipe("alice", "bob", DecisionStatus::Like)
            .await
            .expect("like");
        engine
            .swipe("bob", "alice", DecisionStatus::Like)
            .await
            .expect("match");
        let key = PairKey::of("alice", "bob");

        // Simulate a partial write from an older, non-transactional
        // provisioner by dropping the thread behind the match.
        db.delete_thread_for_test(&key).await.expect("drop thread");

        let repaired = engine.reconcile().await.expect("reconcile");
        assert_eq!(repaired, 1);
        assert!(
            db.thread_store()
                .get_thread(&key)
                .await
                .expect("lookup")
                .is_some()
        );

        assert_eq!(engine.reconcile().await.expect("second pass"), 0);
    }
}
