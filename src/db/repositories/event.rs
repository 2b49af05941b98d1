use std::sync::Arc;

use tracing::instrument;

use crate::db::StoreResult;
use crate::db::models::event::{Event, EventStatus};
use crate::db::models::game::Game;
use crate::db::models::group::Group;
use crate::db::store::EventStore;

/// Public event reads. Only active events are listed or resolved directly; groups and games are
/// served for any event a viewer already holds the slug of.
#[derive(Debug, Clone)]
pub struct EventRepository {
    store: Arc<dyn EventStore>,
}

impl EventRepository {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Active events, newest first.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> StoreResult<Vec<Event>> {
        let mut events = self.store.events().await?;
        events.retain(|e| e.status == EventStatus::Active);

        Ok(events)
    }

    #[instrument(skip(self))]
    pub async fn active_by_slug(&self, slug: &str) -> StoreResult<Option<Event>> {
        Ok(self
            .store
            .event_by_slug(slug)
            .await?
            .filter(|e| e.status == EventStatus::Active))
    }

    /// Groups of the event behind `slug` in display order, or `None` for an unknown slug.
    #[instrument(skip(self))]
    pub async fn groups(&self, slug: &str) -> StoreResult<Option<Vec<Group>>> {
        match self.store.event_by_slug(slug).await? {
            Some(event) => Ok(Some(self.store.groups_for_event(event.id).await?)),
            None => Ok(None),
        }
    }

    /// Games of the event behind `slug` in display order, or `None` for an unknown slug.
    #[instrument(skip(self))]
    pub async fn games(&self, slug: &str) -> StoreResult<Option<Vec<Game>>> {
        match self.store.event_by_slug(slug).await? {
            Some(event) => Ok(Some(self.store.games_for_event(event.id).await?)),
            None => Ok(None),
        }
    }
}
