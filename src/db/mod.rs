use thiserror::Error;

pub mod models;
pub mod repositories;
pub mod seed;
pub mod store;

pub mod prelude {
    pub use crate::db::models::event::{Event, EventStatus, NewEvent};
    pub use crate::db::models::game::{Game, GameStatus, NewGame, ScoringMode};
    pub use crate::db::models::group::{Group, NewGroup};
    pub use crate::db::models::score::{Score, ScoreDetail, ScoreInput};
    pub use crate::db::models::{EventId, GameId, GroupId, ScoreId, UserId};

    pub use crate::db::repositories::event::EventRepository;
    pub use crate::db::repositories::leaderboard::LeaderboardRepository;
    pub use crate::db::repositories::score::ScoreRepository;
    pub use crate::db::store::{EventStore, MemoryStore};
    pub use crate::db::{StoreError, StoreResult};
}

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid {0}")]
    InvalidReference(&'static str),
}
