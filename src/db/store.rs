//! Record storage seam.
//!
//! The leaderboard and the score producer only ever talk to [`EventStore`]; [`MemoryStore`] is the
//! in-process implementation the server runs with.

use core::fmt;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::db::models::event::{Event, NewEvent};
use crate::db::models::game::{Game, NewGame};
use crate::db::models::group::{Group, NewGroup};
use crate::db::models::score::{Score, ScoreInput};
use crate::db::models::{EventId, GameId, GroupId, ScoreId, UserId};
use crate::db::{StoreError, StoreResult};
use crate::util::slug::generate_slug;

#[async_trait]
pub trait EventStore: Send + Sync + fmt::Debug {
    /// Every event, newest first.
    async fn events(&self) -> StoreResult<Vec<Event>>;
    async fn event_by_slug(&self, slug: &str) -> StoreResult<Option<Event>>;

    /// Groups of an event ordered by `sort_order`, then id.
    async fn groups_for_event(&self, event_id: EventId) -> StoreResult<Vec<Group>>;
    /// Games of an event ordered by `sort_order`, then id.
    async fn games_for_event(&self, event_id: EventId) -> StoreResult<Vec<Game>>;

    async fn group_by_id(&self, id: GroupId) -> StoreResult<Option<Group>>;
    async fn game_by_id(&self, id: GameId) -> StoreResult<Option<Game>>;

    /// Score records belonging to any of `game_ids`, newest first.
    async fn scores_for_games(&self, game_ids: &[GameId]) -> StoreResult<Vec<Score>>;
    async fn score_by_id(&self, id: ScoreId) -> StoreResult<Option<Score>>;

    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event>;
    async fn insert_group(&self, event_id: EventId, group: NewGroup) -> StoreResult<Group>;
    async fn insert_game(&self, event_id: EventId, game: NewGame) -> StoreResult<Game>;

    async fn insert_score(
        &self,
        game_id: GameId,
        input: ScoreInput,
        created_by: UserId,
    ) -> StoreResult<Score>;
    /// Returns `None` when no such score exists.
    async fn update_score(&self, id: ScoreId, input: ScoreInput) -> StoreResult<Option<Score>>;
    /// Returns the removed record, or `None` when no such score exists.
    async fn delete_score(&self, id: ScoreId) -> StoreResult<Option<Score>>;
}

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    events: BTreeMap<EventId, Event>,
    groups: BTreeMap<GroupId, Group>,
    games: BTreeMap<GameId, Game>,
    scores: BTreeMap<ScoreId, Score>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store; all data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn events(&self) -> StoreResult<Vec<Event>> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables.events.values().cloned().collect();

        events.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(events)
    }

    async fn event_by_slug(&self, slug: &str) -> StoreResult<Option<Event>> {
        let tables = self.tables.read().await;
        Ok(tables.events.values().find(|e| e.slug == slug).cloned())
    }

    async fn groups_for_event(&self, event_id: EventId) -> StoreResult<Vec<Group>> {
        let tables = self.tables.read().await;
        let mut groups: Vec<Group> = tables
            .groups
            .values()
            .filter(|g| g.event_id == event_id)
            .cloned()
            .collect();

        groups.sort_by_key(|g| (g.sort_order, g.id));
        Ok(groups)
    }

    async fn games_for_event(&self, event_id: EventId) -> StoreResult<Vec<Game>> {
        let tables = self.tables.read().await;
        let mut games: Vec<Game> = tables
            .games
            .values()
            .filter(|g| g.event_id == event_id)
            .cloned()
            .collect();

        games.sort_by_key(|g| (g.sort_order, g.id));
        Ok(games)
    }

    async fn group_by_id(&self, id: GroupId) -> StoreResult<Option<Group>> {
        Ok(self.tables.read().await.groups.get(&id).cloned())
    }

    async fn game_by_id(&self, id: GameId) -> StoreResult<Option<Game>> {
        Ok(self.tables.read().await.games.get(&id).cloned())
    }

    async fn scores_for_games(&self, game_ids: &[GameId]) -> StoreResult<Vec<Score>> {
        let tables = self.tables.read().await;
        let mut scores: Vec<Score> = tables
            .scores
            .values()
            .filter(|s| game_ids.contains(&s.game_id))
            .cloned()
            .collect();

        scores.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(scores)
    }

    async fn score_by_id(&self, id: ScoreId) -> StoreResult<Option<Score>> {
        Ok(self.tables.read().await.scores.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        let mut tables = self.tables.write().await;

        let mut slug = generate_slug(&event.name);
        while tables.events.values().any(|e| e.slug == slug) {
            slug = generate_slug(&event.name);
        }

        let now = Utc::now();
        let event = Event {
            id: EventId(tables.next_id()),
            slug,
            name: event.name,
            description: event.description,
            status: event.status,
            created_by: event.created_by,
            created_at: now,
            updated_at: now,
        };

        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    #[instrument(skip(self))]
    async fn insert_group(&self, event_id: EventId, group: NewGroup) -> StoreResult<Group> {
        let mut tables = self.tables.write().await;
        if !tables.events.contains_key(&event_id) {
            return Err(StoreError::NotFound("event"));
        }

        let now = Utc::now();
        let group = Group {
            id: GroupId(tables.next_id()),
            event_id,
            name: group.name,
            color: group.color,
            sort_order: group.sort_order,
            created_at: now,
            updated_at: now,
        };

        tables.groups.insert(group.id, group.clone());
        Ok(group)
    }

    #[instrument(skip(self))]
    async fn insert_game(&self, event_id: EventId, game: NewGame) -> StoreResult<Game> {
        let mut tables = self.tables.write().await;
        if !tables.events.contains_key(&event_id) {
            return Err(StoreError::NotFound("event"));
        }

        let now = Utc::now();
        let game = Game {
            id: GameId(tables.next_id()),
            event_id,
            name: game.name,
            description: game.description,
            scoring_mode: game.scoring_mode,
            status: game.status,
            sort_order: game.sort_order,
            created_at: now,
            updated_at: now,
        };

        tables.games.insert(game.id, game.clone());
        Ok(game)
    }

    #[instrument(skip(self))]
    async fn insert_score(
        &self,
        game_id: GameId,
        input: ScoreInput,
        created_by: UserId,
    ) -> StoreResult<Score> {
        let mut tables = self.tables.write().await;
        if !tables.games.contains_key(&game_id) {
            return Err(StoreError::NotFound("game"));
        }

        let now = Utc::now();
        let score = Score {
            id: ScoreId(tables.next_id()),
            game_id,
            group_id: input.group_id,
            value: input.value,
            note: input.note,
            created_by,
            created_at: now,
            updated_at: now,
        };

        tables.scores.insert(score.id, score.clone());
        Ok(score)
    }

    #[instrument(skip(self))]
    async fn update_score(&self, id: ScoreId, input: ScoreInput) -> StoreResult<Option<Score>> {
        let mut tables = self.tables.write().await;
        Ok(tables.scores.get_mut(&id).map(|score| {
            score.group_id = input.group_id;
            score.value = input.value;
            score.note = input.note;
            score.updated_at = Utc::now();
            score.clone()
        }))
    }

    #[instrument(skip(self))]
    async fn delete_score(&self, id: ScoreId) -> StoreResult<Option<Score>> {
        Ok(self.tables.write().await.scores.remove(&id))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn seeded() -> (MemoryStore, Event) {
        let store = MemoryStore::new();
        let event = store
            .insert_event(NewEvent {
                name: "Sports Day".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        (store, event)
    }

    #[tokio::test]
    async fn test_event_lookup_by_slug() {
        let (store, event) = seeded().await;

        assert!(event.slug.starts_with("sports-day-"));
        let found = store.event_by_slug(&event.slug).await.unwrap().unwrap();
        assert_eq!(found.id, event.id);
        assert!(store.event_by_slug("sports-day").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_events_newest_first() {
        let (store, first) = seeded().await;
        let second = store
            .insert_event(NewEvent {
                name: "Quiz Night".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let ids: Vec<EventId> = store.events().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, [second.id, first.id]);
    }

    #[tokio::test]
    async fn test_groups_follow_sort_order() {
        let (store, event) = seeded().await;
        for (name, sort_order) in [("Red", 2), ("Blue", 0), ("Green", 1), ("Gold", 0)] {
            store
                .insert_group(
                    event.id,
                    NewGroup {
                        name: name.to_string(),
                        sort_order,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let groups = store.groups_for_event(event.id).await.unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["Blue", "Gold", "Green", "Red"]);
    }

    #[tokio::test]
    async fn test_children_require_event() {
        let store = MemoryStore::new();
        let res = store.insert_group(EventId(77), NewGroup::default()).await;
        assert!(matches!(res, Err(StoreError::NotFound("event"))));

        let res = store
            .insert_score(
                GameId(1),
                ScoreInput {
                    group_id: GroupId(1),
                    value: 1,
                    note: String::new(),
                },
                UserId::OPERATOR,
            )
            .await;
        assert!(matches!(res, Err(StoreError::NotFound("game"))));
    }

    #[tokio::test]
    async fn test_score_update_and_delete() {
        let (store, event) = seeded().await;
        let group = store
            .insert_group(event.id, NewGroup::default())
            .await
            .unwrap();
        let game = store.insert_game(event.id, NewGame::default()).await.unwrap();

        let input = ScoreInput {
            group_id: group.id,
            value: 3,
            note: "first".to_string(),
        };
        let score = store
            .insert_score(game.id, input, UserId::OPERATOR)
            .await
            .unwrap();

        let updated = store
            .update_score(
                score.id,
                ScoreInput {
                    group_id: group.id,
                    value: -2,
                    note: "corrected".to_string(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.value, -2);
        assert_eq!(updated.created_at, score.created_at);

        assert!(store.delete_score(score.id).await.unwrap().is_some());
        assert!(store.delete_score(score.id).await.unwrap().is_none());
        assert!(store.scores_for_games(&[game.id]).await.unwrap().is_empty());
    }
}
