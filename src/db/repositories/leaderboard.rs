use std::sync::Arc;

use tracing::instrument;

use crate::db::StoreResult;
use crate::db::models::GameId;
use crate::db::models::event::Event;
use crate::db::store::EventStore;
use crate::leaderboard::{LeaderboardEntry, aggregate};

#[derive(Debug, Clone)]
pub struct LeaderboardRepository {
    store: Arc<dyn EventStore>,
}

impl LeaderboardRepository {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Ranked standings for the event behind `slug`, or `None` when no such event exists.
    #[instrument(skip(self))]
    pub async fn for_slug(&self, slug: &str) -> StoreResult<Option<Vec<LeaderboardEntry>>> {
        match self.store.event_by_slug(slug).await? {
            Some(event) => Ok(Some(self.for_event(&event).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn for_event(&self, event: &Event) -> StoreResult<Vec<LeaderboardEntry>> {
        let groups = self.store.groups_for_event(event.id).await?;
        let games = self.store.games_for_event(event.id).await?;

        let game_ids: Vec<GameId> = games.iter().map(|g| g.id).collect();
        let scores = self.store.scores_for_games(&game_ids).await?;

        let leaderboard = aggregate(&groups, &games, &scores);
        tracing::debug!(
            groups = groups.len(),
            games = games.len(),
            scores = scores.len(),
            "leaderboard aggregated"
        );

        Ok(leaderboard)
    }
}
