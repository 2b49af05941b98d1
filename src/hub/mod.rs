pub mod connection;
pub mod registry;
pub mod types;

pub mod prelude {
    pub use crate::hub::connection::{SubscriberConnection, serve_websocket};
    pub use crate::hub::registry::{Hub, HubConfig, HubHandle, Subscription};
    pub use crate::hub::types::{ConnectionId, HubError, HubStats, Notification};
}
