use core::fmt;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{EventId, ScoreId};

pub type HubResult<T> = core::result::Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("broadcast hub is not running")]
    Closed,
}

/// Identifies one live subscriber connection for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-to-client change notification.
///
/// Carries identifiers only; viewers re-fetch the leaderboard rather than trusting a pushed
/// payload, so dropped or reordered notifications are harmless.
///
/// ```json
/// {"type": "score_update", "data": {"score_id": 4, "event_id": 1}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Notification {
    ScoreUpdate(NotificationPayload),
    ScoreDelete(NotificationPayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub score_id: ScoreId,
    pub event_id: EventId,
}

impl Notification {
    pub fn score_update(event_id: EventId, score_id: ScoreId) -> Self {
        Notification::ScoreUpdate(NotificationPayload { score_id, event_id })
    }

    pub fn score_delete(event_id: EventId, score_id: ScoreId) -> Self {
        Notification::ScoreDelete(NotificationPayload { score_id, event_id })
    }

    pub fn payload(&self) -> &NotificationPayload {
        match self {
            Notification::ScoreUpdate(payload) | Notification::ScoreDelete(payload) => payload,
        }
    }
}

/// Point-in-time view of the registry, answered by the control loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HubStats {
    pub subscribers: HashMap<EventId, usize>,
    pub total_subscribers: usize,
    pub delivered: u64,
    pub evicted: u64,
    pub skipped_broadcasts: u64,
}

impl HubStats {
    pub fn subscriber_count(&self, event_id: EventId) -> usize {
        self.subscribers.get(&event_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_notification_wire_format() {
        let update = Notification::score_update(EventId(3), ScoreId(42));
        let delete = Notification::score_delete(EventId(3), ScoreId(42));

        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"type":"score_update","data":{"score_id":42,"event_id":3}}"#
        );
        assert_eq!(
            serde_json::to_string(&delete).unwrap(),
            r#"{"type":"score_delete","data":{"score_id":42,"event_id":3}}"#
        );
    }

    #[test]
    fn test_notification_parses_from_client_view() {
        let raw = r#"{"type": "score_delete", "data": {"event_id": 7, "score_id": 1}}"#;
        let notification: Notification = serde_json::from_str(raw).unwrap();

        assert_eq!(notification, Notification::score_delete(EventId(7), ScoreId(1)));
        assert_eq!(notification.payload().event_id, EventId(7));
    }
}
