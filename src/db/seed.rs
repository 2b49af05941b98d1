//! Start-up fixtures.
//!
//! ```json
//! {
//!   "events": [
//!     {
//!       "name": "Sports Day",
//!       "status": "active",
//!       "groups": [{"name": "Red", "color": "#ff0000", "sort_order": 0}],
//!       "games": [{"name": "Relay", "scoring_mode": "incremental"}]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::db::StoreError;
use crate::db::models::event::{Event, NewEvent};
use crate::db::models::game::NewGame;
use crate::db::models::group::NewGroup;
use crate::db::store::EventStore;

pub type SeedResult<T> = core::result::Result<T, SeedError>;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("unable to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed seed file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub events: Vec<SeedEvent>,
}

#[derive(Debug, Deserialize)]
pub struct SeedEvent {
    #[serde(flatten)]
    pub event: NewEvent,
    #[serde(default)]
    pub groups: Vec<NewGroup>,
    #[serde(default)]
    pub games: Vec<NewGame>,
}

impl SeedFile {
    pub async fn read(path: impl AsRef<Path>) -> SeedResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Inserts every event with its groups and games, returning the created events.
    #[instrument(skip_all, fields(events = self.events.len()))]
    pub async fn apply(self, store: &dyn EventStore) -> SeedResult<Vec<Event>> {
        let mut created = Vec::with_capacity(self.events.len());

        for seed in self.events {
            let event = store.insert_event(seed.event).await?;
            let (groups, games) = (seed.groups.len(), seed.games.len());

            for group in seed.groups {
                store.insert_group(event.id, group).await?;
            }
            for game in seed.games {
                store.insert_game(event.id, game).await?;
            }

            tracing::info!(event_id = %event.id, slug = %event.slug, groups, games, "seeded event");
            created.push(event);
        }

        Ok(created)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::models::event::EventStatus;
    use crate::db::models::game::ScoringMode;
    use crate::db::store::MemoryStore;

    const FIXTURE: &str = r##"{
        "events": [
            {
                "name": "Sports Day",
                "status": "active",
                "groups": [
                    {"name": "Red", "color": "#ff0000", "sort_order": 1},
                    {"name": "Blue", "color": "#0000ff"}
                ],
                "games": [
                    {"name": "Relay"},
                    {"name": "High Jump", "scoring_mode": "absolute", "sort_order": 2}
                ]
            },
            {"name": "Quiz Night"}
        ]
    }"##;

    #[tokio::test]
    async fn test_apply_fixture() {
        let store = MemoryStore::new();
        let seed: SeedFile = serde_json::from_str(FIXTURE).unwrap();

        let events = seed.apply(&store).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, EventStatus::Active);
        assert_eq!(events[1].status, EventStatus::Draft);

        let groups = store.groups_for_event(events[0].id).await.unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["Blue", "Red"]);

        let games = store.games_for_event(events[0].id).await.unwrap();
        assert_eq!(games[1].scoring_mode, ScoringMode::Absolute);

        assert!(store.groups_for_event(events[1].id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let res = SeedFile::read("/definitely/not/here.json").await;
        assert!(matches!(res, Err(SeedError::Io(_))));
    }

    #[test]
    fn test_rejects_malformed_fixture() {
        let res: Result<SeedFile, _> = serde_json::from_str(r#"{"events": [{"groups": []}]}"#);
        assert!(res.is_err());
    }
}
