//! Leaderboard aggregation.
//!
//! Turns an event's groups, games and score records into ranked standings. The computation is pure:
//! it holds no state between calls and identical inputs always produce identical output ordering.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::models::game::Game;
use crate::db::models::group::Group;
use crate::db::models::score::Score;
use crate::db::models::{GameId, GroupId};

/// Ranked standing for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub group_id: GroupId,
    pub group_name: String,
    pub group_color: String,
    pub total_score: i64,
    pub scores_by_game: Vec<GameScore>,
}

/// A group's subtotal for a single game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameScore {
    pub game_id: GameId,
    pub game_name: String,
    pub score: i64,
}

/// Builds the leaderboard for one event.
///
/// `groups` and `games` are expected in their configured sort order; `scores` may arrive in any
/// order. Every group gets an entry and every entry gets one subtotal per game, zero-filled where
/// no record exists. Records referencing a group or game outside the inputs are ignored.
///
/// Values are summed regardless of [`ScoringMode`](crate::db::models::game::ScoringMode). Sums
/// that would overflow `i64` are clamped to `i64::MIN`/`i64::MAX` and logged at `warn`.
///
/// Entries are ordered by total descending. Equal totals keep the relative order of `groups`.
pub fn aggregate(groups: &[Group], games: &[Game], scores: &[Score]) -> Vec<LeaderboardEntry> {
    let mut totals: HashMap<(GroupId, GameId), i64> = HashMap::new();
    for score in scores {
        let subtotal = totals.entry((score.group_id, score.game_id)).or_default();
        *subtotal = clamped_add(*subtotal, score.value, score.group_id);
    }

    let mut leaderboard: Vec<LeaderboardEntry> = groups
        .iter()
        .map(|group| {
            let scores_by_game: Vec<GameScore> = games
                .iter()
                .map(|game| GameScore {
                    game_id: game.id,
                    game_name: game.name.clone(),
                    score: totals.get(&(group.id, game.id)).copied().unwrap_or(0),
                })
                .collect();

            let total_score = scores_by_game
                .iter()
                .fold(0i64, |acc, s| clamped_add(acc, s.score, group.id));

            LeaderboardEntry {
                group_id: group.id,
                group_name: group.name.clone(),
                group_color: group.color.clone(),
                total_score,
                scores_by_game,
            }
        })
        .collect();

    // `sort_by` is a stable sort; ties must not be reordered.
    leaderboard.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    leaderboard
}

fn clamped_add(acc: i64, value: i64, group_id: GroupId) -> i64 {
    acc.checked_add(value).unwrap_or_else(|| {
        tracing::warn!(%group_id, acc, value, "score sum out of range; clamping");
        acc.saturating_add(value)
    })
}
