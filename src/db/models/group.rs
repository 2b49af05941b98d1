use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventId, GroupId};

/// A competing team within an event.
///
/// `sort_order` is the configured display order and the leaderboard's tie-break key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub event_id: EventId,
    pub name: String,
    pub color: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub sort_order: i32,
}
