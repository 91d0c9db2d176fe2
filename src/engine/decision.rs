use std::sync::Arc;

use crate::db::{Decision, DecisionStatus, DecisionStore, NewDecision};

use super::EngineError;
use super::retry::{WritePolicy, write_with_retry};

/// Persists like/skip decisions. The store enforces one row per
/// (liker, liked); a repeated swipe overwrites the earlier one.
pub struct DecisionRecorder {
    decisions: Arc<dyn DecisionStore>,
    policy: WritePolicy,
}

impl DecisionRecorder {
    pub(crate) fn new(decisions: Arc<dyn DecisionStore>, policy: WritePolicy) -> Self {
        Self { decisions, policy }
    }

    pub async fn record(
        &self,
        liker_id: &str,
        liked_id: &str,
        status: DecisionStatus,
    ) -> Result<Decision, EngineError> {
        if liker_id == liked_id {
            return Err(EngineError::SelfDecision);
        }

        let decision = NewDecision {
            liker_id: liker_id.to_string(),
            liked_id: liked_id.to_string(),
            status,
        };

        write_with_retry(&self.policy, "record_decision", || {
            let store = self.decisions.clone();
            let decision = decision.clone();
            async move { store.upsert_decision(&decision).await }
        })
        .await
    }
}

/// Answers whether the reverse like already exists. Read-only; the check
/// is deliberately not atomic with provisioning — both sides may see
/// "mutual" at once, and the idempotent provisioner absorbs that.
pub struct MutualMatchDetector {
    decisions: Arc<dyn DecisionStore>,
}

impl MutualMatchDetector {
    pub(crate) fn new(decisions: Arc<dyn DecisionStore>) -> Self {
        Self { decisions }
    }

    pub async fn is_mutual(&self, user_id: &str, candidate_id: &str) -> Result<bool, EngineError> {
        Ok(self.decisions.has_like(candidate_id, user_id).await?)
    }
}
