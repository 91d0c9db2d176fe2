use std::collections::HashSet;
use std::sync::Arc;

use crate::db::{DecisionStore, MatchStore, Profile, ProfileStore};

use super::EngineError;

/// Produces the sequence of candidates a viewer has not yet decided on:
/// every profile except the viewer, the ids the viewer already swiped,
/// and anyone the viewer is matched with. Pure read; store-scan order,
/// no ranking.
pub struct CandidateFeed {
    profiles: Arc<dyn ProfileStore>,
    decisions: Arc<dyn DecisionStore>,
    matches: Arc<dyn MatchStore>,
}

impl CandidateFeed {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        decisions: Arc<dyn DecisionStore>,
        matches: Arc<dyn MatchStore>,
    ) -> Self {
        Self {
            profiles,
            decisions,
            matches,
        }
    }

    pub async fn candidates(&self, viewer_id: &str) -> Result<Vec<Profile>, EngineError> {
        let mut excluded: HashSet<String> = self
            .decisions
            .decided_candidate_ids(viewer_id)
            .await?
            .into_iter()
            .collect();

        for m in self.matches.matches_for_user(viewer_id).await? {
            excluded.insert(m.user_a);
            excluded.insert(m.user_b);
        }
        excluded.insert(viewer_id.to_string());

        let all = self.profiles.list_profiles().await?;
        Ok(all
            .into_iter()
            .filter(|p| !excluded.contains(&p.user_id))
            .collect())
    }
}
