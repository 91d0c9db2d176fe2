use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::db::models::sorted_users;
use crate::db::{ChatThread, Match, MatchStore, PairKey};

use super::retry::{WritePolicy, write_with_retry};
use super::{EngineError, EngineEvent};

/// Creates the Match and ChatThread records for a newly detected mutual
/// like. Both rows are written in one store transaction, keyed by the
/// deterministic pair key, so any number of concurrent provisioning
/// attempts converge to exactly one match and one thread.
pub struct MatchProvisioner {
    matches: Arc<dyn MatchStore>,
    events: broadcast::Sender<EngineEvent>,
    policy: WritePolicy,
}

impl MatchProvisioner {
    pub(crate) fn new(
        matches: Arc<dyn MatchStore>,
        events: broadcast::Sender<EngineEvent>,
        policy: WritePolicy,
    ) -> Self {
        Self {
            matches,
            events,
            policy,
        }
    }

    pub async fn provision(&self, user_a: &str, user_b: &str) -> Result<Match, EngineError> {
        let key = PairKey::of(user_a, user_b);
        let (user_a, user_b) = sorted_users(user_a, user_b);
        let now = Utc::now();

        let match_row = Match {
            pair_key: key.clone(),
            user_a: user_a.clone(),
            user_b: user_b.clone(),
            created_at: now,
        };
        let thread = ChatThread {
            pair_key: key.clone(),
            user_a: user_a.clone(),
            user_b: user_b.clone(),
            created_at: now,
            last_message: String::new(),
            unread_a: false,
            unread_b: false,
        };

        write_with_retry(&self.policy, "provision_match", || {
            let store = self.matches.clone();
            let match_row = match_row.clone();
            let thread = thread.clone();
            async move { store.provision_pair(&match_row, &thread).await }
        })
        .await?;

        info!(key = %key, "provisioned match and chat thread");
        let _ = self.events.send(EngineEvent::MatchFound {
            key,
            users: [user_a, user_b],
        });

        Ok(match_row)
    }

    /// Repairs matches whose chat thread is missing by re-running the
    /// idempotent provisioning write. Returns how many pairs were
    /// repaired. Run at startup.
    pub async fn reconcile(&self) -> Result<usize, EngineError> {
        let orphans = self.matches.matches_missing_thread().await?;
        for m in &orphans {
            warn!(
                key = %m.pair_key,
                error = %EngineError::MissingThread(m.pair_key.clone()),
                "re-provisioning partially provisioned pair"
            );
            self.provision(&m.user_a, &m.user_b).await?;
        }
        Ok(orphans.len())
    }
}
