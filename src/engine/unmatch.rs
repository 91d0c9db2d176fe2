use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::db::{MatchStore, PairKey};

use super::chat::ChatSynchronizer;
use super::{EngineError, EngineEvent};

/// Dissolves a match: deletes the match row, its thread and its message
/// log in one store transaction, then closes the live chat channel so
/// open subscriptions end with `Closed`.
pub struct UnmatchCoordinator {
    matches: Arc<dyn MatchStore>,
    chat: Arc<ChatSynchronizer>,
    events: broadcast::Sender<EngineEvent>,
}

impl UnmatchCoordinator {
    pub(crate) fn new(
        matches: Arc<dyn MatchStore>,
        chat: Arc<ChatSynchronizer>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            matches,
            chat,
            events,
        }
    }

    pub async fn unmatch(&self, key: &PairKey) -> Result<(), EngineError> {
        let existed = self.matches.unmatch_pair(key).await?;
        if !existed {
            return Err(EngineError::NotMatched(key.clone()));
        }

        self.chat.close(key);
        info!(key = %key, "pair unmatched, chat dissolved");
        let _ = self.events.send(EngineEvent::Unmatched { key: key.clone() });
        Ok(())
    }
}
