use std::collections::HashMap;
use std::sync::Arc;

use tracing::instrument;

use crate::db::models::event::Event;
use crate::db::models::game::Game;
use crate::db::models::score::{Score, ScoreDetail, ScoreInput};
use crate::db::models::{GameId, ScoreId, UserId};
use crate::db::store::EventStore;
use crate::db::{StoreError, StoreResult};
use crate::hub::registry::HubHandle;
use crate::hub::types::Notification;

/// Score record management.
///
/// Every successful create, update or delete is announced on the hub for the score's event.
#[derive(Debug, Clone)]
pub struct ScoreRepository {
    store: Arc<dyn EventStore>,
    hub: HubHandle,
}

impl ScoreRepository {
    pub fn new(store: Arc<dyn EventStore>, hub: HubHandle) -> Self {
        Self { store, hub }
    }

    /// All score records of an event, newest first, each with its group and game attached.
    /// `None` when the slug is unknown.
    #[instrument(skip(self))]
    pub async fn list_for_event(
        &self,
        slug: &str,
    ) -> StoreResult<Option<(Event, Vec<ScoreDetail>)>> {
        let Some(event) = self.store.event_by_slug(slug).await? else {
            return Ok(None);
        };

        let games = self.store.games_for_event(event.id).await?;
        let game_ids: Vec<GameId> = games.iter().map(|g| g.id).collect();
        let scores = self.store.scores_for_games(&game_ids).await?;

        let games: HashMap<_, _> = games.into_iter().map(|g| (g.id, g)).collect();
        let groups: HashMap<_, _> = self
            .store
            .groups_for_event(event.id)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();

        let details = scores
            .into_iter()
            .map(|score| ScoreDetail {
                group: groups.get(&score.group_id).cloned(),
                game: games.get(&score.game_id).cloned(),
                score,
            })
            .collect();

        Ok(Some((event, details)))
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        game_id: GameId,
        input: ScoreInput,
        created_by: UserId,
    ) -> StoreResult<Score> {
        let game = self.game(game_id).await?;
        self.check_group(&game, &input).await?;

        let score = self.store.insert_score(game.id, input, created_by).await?;
        tracing::info!(score_id = %score.id, event_id = %game.event_id, value = score.value, "score created");

        self.hub
            .broadcast(game.event_id, Notification::score_update(game.event_id, score.id))
            .await;

        Ok(score)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: ScoreId, input: ScoreInput) -> StoreResult<Score> {
        let existing = self
            .store
            .score_by_id(id)
            .await?
            .ok_or(StoreError::NotFound("score"))?;

        let game = self.game(existing.game_id).await?;
        self.check_group(&game, &input).await?;

        let score = self
            .store
            .update_score(id, input)
            .await?
            .ok_or(StoreError::NotFound("score"))?;
        tracing::info!(score_id = %score.id, event_id = %game.event_id, value = score.value, "score updated");

        self.hub
            .broadcast(game.event_id, Notification::score_update(game.event_id, score.id))
            .await;

        Ok(score)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: ScoreId) -> StoreResult<Score> {
        let existing = self
            .store
            .score_by_id(id)
            .await?
            .ok_or(StoreError::NotFound("score"))?;

        let game = self.game(existing.game_id).await?;
        let score = self
            .store
            .delete_score(id)
            .await?
            .ok_or(StoreError::NotFound("score"))?;
        tracing::info!(score_id = %score.id, event_id = %game.event_id, "score deleted");

        self.hub
            .broadcast(game.event_id, Notification::score_delete(game.event_id, score.id))
            .await;

        Ok(score)
    }

    async fn game(&self, id: GameId) -> StoreResult<Game> {
        self.store
            .game_by_id(id)
            .await?
            .ok_or(StoreError::NotFound("game"))
    }

    /// A score's group must belong to the same event as its game.
    async fn check_group(&self, game: &Game, input: &ScoreInput) -> StoreResult<()> {
        match self.store.group_by_id(input.group_id).await? {
            Some(group) if group.event_id == game.event_id => Ok(()),
            _ => Err(StoreError::InvalidReference("group")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::models::GroupId;
    use crate::db::repositories::fixtures::fixture;
    use crate::hub::registry::{Hub, HubConfig};

    fn input(group_id: GroupId, value: i64) -> ScoreInput {
        ScoreInput {
            group_id,
            value,
            note: String::new(),
        }
    }

    fn decode(frame: &axum::extract::ws::Utf8Bytes) -> Notification {
        serde_json::from_str(frame.as_str()).unwrap()
    }

    #[tokio::test]
    async fn test_create_broadcasts_update() {
        let fx = fixture().await;
        let (hub, _) = Hub::spawn(HubConfig::default());
        let mut sub = hub.register(fx.event.id).await.unwrap();
        let repo = ScoreRepository::new(fx.store.clone(), hub.clone());

        let score = repo
            .create(fx.games[0].id, input(fx.groups[0].id, 5), UserId(9))
            .await
            .unwrap();
        assert_eq!(score.created_by, UserId(9));

        let frame = sub.receiver.recv().await.unwrap();
        assert_eq!(
            decode(&frame),
            Notification::score_update(fx.event.id, score.id)
        );
    }

    #[tokio::test]
    async fn test_cross_event_group_rejected() {
        let fx = fixture().await;
        let (hub, _) = Hub::spawn(HubConfig::default());
        let mut sub = hub.register(fx.event.id).await.unwrap();
        let repo = ScoreRepository::new(fx.store.clone(), hub.clone());

        let res = repo
            .create(fx.games[0].id, input(fx.other_group.id, 5), UserId::OPERATOR)
            .await;
        assert!(matches!(res, Err(StoreError::InvalidReference("group"))));

        let res = repo
            .create(fx.games[0].id, input(GroupId(9999), 5), UserId::OPERATOR)
            .await;
        assert!(matches!(res, Err(StoreError::InvalidReference("group"))));

        let res = repo
            .create(GameId(9999), input(fx.groups[0].id, 5), UserId::OPERATOR)
            .await;
        assert!(matches!(res, Err(StoreError::NotFound("game"))));

        _ = hub.stats().await;
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_validates_group_and_broadcasts() {
        let fx = fixture().await;
        let (hub, _) = Hub::spawn(HubConfig::default());
        let repo = ScoreRepository::new(fx.store.clone(), hub.clone());

        let score = repo
            .create(fx.games[1].id, input(fx.groups[0].id, 5), UserId::OPERATOR)
            .await
            .unwrap();

        let mut sub = hub.register(fx.event.id).await.unwrap();

        let res = repo.update(score.id, input(fx.other_group.id, 1)).await;
        assert!(matches!(res, Err(StoreError::InvalidReference("group"))));

        let updated = repo
            .update(score.id, input(fx.groups[1].id, 11))
            .await
            .unwrap();
        assert_eq!(updated.group_id, fx.groups[1].id);
        assert_eq!(updated.value, 11);

        let frame = sub.receiver.recv().await.unwrap();
        assert_eq!(
            decode(&frame),
            Notification::score_update(fx.event.id, score.id)
        );

        let res = repo.update(ScoreId(424242), input(fx.groups[1].id, 1)).await;
        assert!(matches!(res, Err(StoreError::NotFound("score"))));
    }

    #[tokio::test]
    async fn test_delete_broadcasts_delete() {
        let fx = fixture().await;
        let (hub, _) = Hub::spawn(HubConfig::default());
        let repo = ScoreRepository::new(fx.store.clone(), hub.clone());

        let score = repo
            .create(fx.games[0].id, input(fx.groups[1].id, 2), UserId::OPERATOR)
            .await
            .unwrap();
        let mut sub = hub.register(fx.event.id).await.unwrap();

        repo.delete(score.id).await.unwrap();
        let frame = sub.receiver.recv().await.unwrap();
        assert_eq!(
            decode(&frame),
            Notification::score_delete(fx.event.id, score.id)
        );

        assert!(matches!(
            repo.delete(score.id).await,
            Err(StoreError::NotFound("score"))
        ));
    }

    #[tokio::test]
    async fn test_list_for_event() {
        let fx = fixture().await;
        let (hub, _) = Hub::spawn(HubConfig::default());
        let repo = ScoreRepository::new(fx.store.clone(), hub);

        for value in [1, 2, 3] {
            repo.create(fx.games[0].id, input(fx.groups[0].id, value), UserId::OPERATOR)
                .await
                .unwrap();
        }

        let (event, scores) = repo.list_for_event(&fx.event.slug).await.unwrap().unwrap();
        assert_eq!(event.id, fx.event.id);
        let values: Vec<i64> = scores.iter().map(|s| s.score.value).collect();
        assert_eq!(values, [3, 2, 1]);
        assert!(scores.iter().all(|s| {
            s.group.as_ref().map(|g| g.id) == Some(fx.groups[0].id)
                && s.game.as_ref().map(|g| g.id) == Some(fx.games[0].id)
        }));

        assert!(repo.list_for_event("missing").await.unwrap().is_none());
        let (_, other) = repo
            .list_for_event(&fx.other_event.slug)
            .await
            .unwrap()
            .unwrap();
        assert!(other.is_empty());
    }
}
