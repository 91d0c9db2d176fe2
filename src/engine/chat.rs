use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::db::{
    ChatThread, DatabaseError, MatchStore, Message, MessageStore, NewMessage, PairKey,
    ThreadStore,
};

use super::EngineError;

/// One update on a chat subscription. A new subscriber always receives a
/// `Snapshot` first, then `Appended` increments in log order; `Closed`
/// is terminal and means the pair was unmatched.
#[derive(Debug, Clone)]
pub enum ChatUpdate {
    Snapshot(Vec<Message>),
    Appended(Message),
    Closed,
}

/// Fans appended messages out to the live subscribers of each pair's
/// chat. One broadcast channel per active pair, created lazily on first
/// subscribe or send and torn down on unmatch.
pub struct ChatSynchronizer {
    threads: Arc<dyn ThreadStore>,
    messages: Arc<dyn MessageStore>,
    matches: Arc<dyn MatchStore>,
    config: ChatConfig,
    channels: Mutex<HashMap<String, broadcast::Sender<ChatUpdate>>>,
}

impl ChatSynchronizer {
    pub(crate) fn new(
        threads: Arc<dyn ThreadStore>,
        messages: Arc<dyn MessageStore>,
        matches: Arc<dyn MatchStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            threads,
            messages,
            matches,
            config,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the thread behind a pair key, distinguishing "no such
    /// match" from "match without a thread" (partial provisioning).
    async fn require_thread(&self, key: &PairKey) -> Result<ChatThread, EngineError> {
        if let Some(thread) = self.threads.get_thread(key).await? {
            return Ok(thread);
        }
        match self.matches.get_match(key).await? {
            Some(_) => Err(EngineError::MissingThread(key.clone())),
            None => Err(EngineError::NotMatched(key.clone())),
        }
    }

    fn channel(&self, key: &PairKey) -> broadcast::Sender<ChatUpdate> {
        let mut channels = self.channels.lock();
        channels
            .entry(key.as_str().to_string())
            .or_insert_with(|| broadcast::channel(self.config.channel_capacity).0)
            .clone()
    }

    /// Opens a live subscription for a participant. The returned handle
    /// yields the full log as a snapshot before any increments.
    pub async fn subscribe(
        &self,
        key: &PairKey,
        user_id: &str,
    ) -> Result<ChatSubscription, EngineError> {
        let thread = self.require_thread(key).await?;
        if !thread.is_participant(user_id) {
            return Err(EngineError::NotParticipant {
                key: key.clone(),
                user: user_id.to_string(),
            });
        }

        // Subscribe before reading the snapshot: an append racing with
        // us is then either in the snapshot or in the channel, never
        // dropped. An append that lands in both is discarded by the id
        // watermark in recv, so nothing is delivered twice.
        let rx = self.channel(key).subscribe();
        let snapshot = self.messages.list_messages(key).await?;
        let last_seen = snapshot.last().map(|m| m.id).unwrap_or(0);

        let id = Uuid::new_v4();
        debug!(key = %key, subscription = %id, user = user_id, "chat subscription opened");

        Ok(ChatSubscription {
            id,
            key: key.clone(),
            messages: self.messages.clone(),
            rx,
            pending_snapshot: Some(snapshot),
            last_seen,
            cancelled: false,
            closed: false,
        })
    }

    /// Validates and appends a message, then fans it out to subscribers.
    /// A whitespace-only body is a no-op and returns `Ok(None)`.
    pub async fn send(
        &self,
        key: &PairKey,
        sender_id: &str,
        body: &str,
    ) -> Result<Option<Message>, EngineError> {
        let body = body.trim();
        if body.is_empty() {
            return Ok(None);
        }
        if body.len() > self.config.max_message_bytes {
            return Err(EngineError::MessageTooLong {
                limit: self.config.max_message_bytes,
            });
        }

        let thread = self.require_thread(key).await?;
        if !thread.is_participant(sender_id) {
            return Err(EngineError::NotParticipant {
                key: key.clone(),
                user: sender_id.to_string(),
            });
        }

        let message = match self
            .messages
            .append_message(&NewMessage {
                pair_key: key.clone(),
                sender_id: sender_id.to_string(),
                body: body.to_string(),
            })
            .await
        {
            Ok(message) => message,
            // An unmatch can commit between the thread check above and
            // the append; the store then refuses the write and the send
            // fails like any other send against a torn-down pair.
            Err(DatabaseError::NotFound(_)) => {
                return Err(EngineError::NotMatched(key.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        let _ = self.channel(key).send(ChatUpdate::Appended(message.clone()));
        Ok(Some(message))
    }

    /// Full message log for a participant, in delivery order.
    pub async fn messages(
        &self,
        key: &PairKey,
        user_id: &str,
    ) -> Result<Vec<Message>, EngineError> {
        let thread = self.require_thread(key).await?;
        if !thread.is_participant(user_id) {
            return Err(EngineError::NotParticipant {
                key: key.clone(),
                user: user_id.to_string(),
            });
        }
        Ok(self.messages.list_messages(key).await?)
    }

    /// Clears the reader's unread flag.
    pub async fn mark_read(&self, key: &PairKey, user_id: &str) -> Result<(), EngineError> {
        let thread = self.require_thread(key).await?;
        if !thread.is_participant(user_id) {
            return Err(EngineError::NotParticipant {
                key: key.clone(),
                user: user_id.to_string(),
            });
        }
        self.threads.mark_read(key, user_id).await?;
        Ok(())
    }

    /// Tears down the pair's channel after an unmatch. Live subscribers
    /// receive a terminal `Closed` update.
    pub(crate) fn close(&self, key: &PairKey) {
        let sender = self.channels.lock().remove(key.as_str());
        if let Some(sender) = sender {
            let _ = sender.send(ChatUpdate::Closed);
        }
    }

    /// Injects an update into the pair's channel, to stage deliveries a
    /// racing sender could have produced.
    #[cfg(test)]
    pub(crate) fn broadcast_for_test(&self, key: &PairKey, update: ChatUpdate) {
        let _ = self.channel(key).send(update);
    }
}

/// A live view of one chat. `recv` yields updates until the caller
/// unsubscribes or the pair is unmatched.
pub struct ChatSubscription {
    id: Uuid,
    key: PairKey,
    messages: Arc<dyn MessageStore>,
    rx: broadcast::Receiver<ChatUpdate>,
    pending_snapshot: Option<Vec<Message>>,
    /// Highest message id already delivered through a snapshot or an
    /// append. Appends at or below it are replays and are dropped.
    last_seen: i64,
    cancelled: bool,
    closed: bool,
}

impl ChatSubscription {
    /// Next update, or `None` once the subscription is over. A
    /// subscriber that lags past the channel buffer is resynchronized
    /// with a fresh snapshot instead of missing increments.
    pub async fn recv(&mut self) -> Result<Option<ChatUpdate>, EngineError> {
        if self.cancelled || self.closed {
            return Ok(None);
        }
        if let Some(snapshot) = self.pending_snapshot.take() {
            return Ok(Some(ChatUpdate::Snapshot(snapshot)));
        }

        loop {
            match self.rx.recv().await {
                Ok(ChatUpdate::Appended(message)) => {
                    if message.id <= self.last_seen {
                        continue;
                    }
                    self.last_seen = message.id;
                    return Ok(Some(ChatUpdate::Appended(message)));
                }
                Ok(ChatUpdate::Closed) => {
                    self.closed = true;
                    return Ok(Some(ChatUpdate::Closed));
                }
                Ok(update) => return Ok(Some(update)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        key = %self.key,
                        subscription = %self.id,
                        skipped,
                        "subscriber lagged, resynchronizing from snapshot"
                    );
                    let snapshot = self.messages.list_messages(&self.key).await?;
                    if let Some(last) = snapshot.last() {
                        self.last_seen = last.id;
                    }
                    return Ok(Some(ChatUpdate::Snapshot(snapshot)));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.closed = true;
                    return Ok(None);
                }
            }
        }
    }

    /// Stops delivery immediately. Subsequent `recv` calls return `None`.
    pub fn unsubscribe(&mut self) {
        self.cancelled = true;
    }
}
