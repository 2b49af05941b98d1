//! Live event scoreboard.
//!
//! Score producers write through [`db::repositories::score::ScoreRepository`], which announces every
//! change on the [`hub`]. Viewers hold a websocket subscription per event and re-fetch the
//! [`leaderboard`] when notified.

pub mod api;
pub mod db;
pub mod hub;
pub mod leaderboard;
pub mod util;
