use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventId, GameId};

/// How a game's score records are meant to combine.
///
/// Aggregation currently sums records for both modes; see `leaderboard::aggregate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    #[default]
    Incremental,
    Absolute,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Pending,
    Active,
    Completed,
}

/// A scored activity within an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub event_id: EventId,
    pub name: String,
    pub description: String,
    pub scoring_mode: ScoringMode,
    pub status: GameStatus,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGame {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scoring_mode: ScoringMode,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default)]
    pub sort_order: i32,
}
