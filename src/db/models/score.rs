use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::game::Game;
use super::group::Group;
use super::{GameId, GroupId, ScoreId, UserId};

/// One point-award record tying a group to a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub id: ScoreId,
    pub game_id: GameId,
    pub group_id: GroupId,
    pub value: i64,
    pub note: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A score as listed to viewers, with its group and game inlined.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreDetail {
    #[serde(flatten)]
    pub score: Score,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<Game>,
}

/// Body of a score create/update request.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreInput {
    pub group_id: GroupId,
    pub value: i64,
    #[serde(default)]
    pub note: String,
}
