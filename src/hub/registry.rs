//! Subscriber registry and broadcast control loop.
//!
//! A single task owns the `event -> subscribers` map. Every mutation and every fan-out is a
//! [`HubCommand`] taken off one bounded mailbox and processed to completion before the next, so a
//! broadcast always observes a consistent subscriber set and no locks guard the map.
//!
//! The loop never awaits I/O. Delivery is a non-blocking `try_send` onto each subscriber's bounded
//! outbound queue; a subscriber whose queue is full is evicted on the spot rather than stalling the
//! loop for everybody else. Eviction drops the queue sender, which closes the queue, and cancels the
//! subscription's `evicted` token so a connection blocked on a stalled socket stops as well.

use std::collections::HashMap;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::db::models::EventId;
use crate::hub::types::{ConnectionId, HubError, HubResult, HubStats, Notification};

pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Pending register/unregister/broadcast requests before producers are made to wait.
    pub mailbox_capacity: usize,
    /// Pending notifications per subscriber before it is evicted.
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug)]
pub enum HubCommand {
    Register {
        event_id: EventId,
        connection_id: ConnectionId,
        sender: mpsc::Sender<Utf8Bytes>,
        evicted: CancellationToken,
    },
    Unregister {
        event_id: EventId,
        connection_id: ConnectionId,
    },
    Broadcast {
        event_id: EventId,
        notification: Notification,
    },
    GetStats {
        response: oneshot::Sender<HubStats>,
    },
    Shutdown {
        response: oneshot::Sender<()>,
    },
}

/// A registered connection's end of its outbound queue.
#[derive(Debug)]
pub struct Subscription {
    pub connection_id: ConnectionId,
    pub event_id: EventId,
    pub receiver: mpsc::Receiver<Utf8Bytes>,
    /// Cancelled by the hub when it evicts this subscriber.
    pub evicted: CancellationToken,
}

#[derive(Debug)]
struct Subscriber {
    sender: mpsc::Sender<Utf8Bytes>,
    evicted: CancellationToken,
}

/// Cloneable entry point into a running hub.
///
/// Handed to every collaborator that registers connections or announces score changes. The hub
/// stops once [`HubHandle::shutdown`] is called or every handle has been dropped.
#[derive(Debug, Clone)]
pub struct HubHandle {
    command_tx: mpsc::Sender<HubCommand>,
    queue_capacity: usize,
}

impl HubHandle {
    /// Creates the caller's outbound queue and adds it to `event_id`'s subscriber set.
    ///
    /// Call once per connection.
    #[instrument(skip(self))]
    pub async fn register(&self, event_id: EventId) -> HubResult<Subscription> {
        let connection_id = ConnectionId::new();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let evicted = CancellationToken::new();

        self.command_tx
            .send(HubCommand::Register {
                event_id,
                connection_id,
                sender,
                evicted: evicted.clone(),
            })
            .await
            .map_err(|_| HubError::Closed)?;

        Ok(Subscription {
            connection_id,
            event_id,
            receiver,
            evicted,
        })
    }

    /// Removes a connection from its event's subscriber set.
    ///
    /// A no-op when the connection is already gone, so both halves of a connection may call it.
    pub async fn unregister(&self, event_id: EventId, connection_id: ConnectionId) {
        if self
            .command_tx
            .send(HubCommand::Unregister {
                event_id,
                connection_id,
            })
            .await
            .is_err()
        {
            debug!(%event_id, %connection_id, "hub already stopped; nothing to unregister");
        }
    }

    /// Delivers `notification` to every current subscriber of `event_id`.
    ///
    /// Fire-and-forget: never fails. Waits only when the hub mailbox itself is full.
    pub async fn broadcast(&self, event_id: EventId, notification: Notification) {
        if let Err(e) = self
            .command_tx
            .send(HubCommand::Broadcast {
                event_id,
                notification,
            })
            .await
        {
            warn!(%event_id, command = ?e.0, "hub stopped; notification dropped");
        }
    }

    pub async fn stats(&self) -> HubStats {
        let (tx, rx) = oneshot::channel();
        if self
            .command_tx
            .send(HubCommand::GetStats { response: tx })
            .await
            .is_ok()
        {
            rx.await.unwrap_or_default()
        } else {
            HubStats::default()
        }
    }

    pub async fn subscriber_count(&self, event_id: EventId) -> usize {
        self.stats().await.subscriber_count(event_id)
    }

    /// Stops the control loop. Every outbound queue is closed as the registry is dropped.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .command_tx
            .send(HubCommand::Shutdown { response: tx })
            .await
            .is_ok()
        {
            _ = rx.await;
        }
    }
}

/// Registry state owned by the control loop.
#[derive(Debug, Default)]
pub struct Hub {
    subscribers: HashMap<EventId, HashMap<ConnectionId, Subscriber>>,
    delivered: u64,
    evicted: u64,
    skipped_broadcasts: u64,
}

impl Hub {
    /// Starts the control loop on the current runtime.
    pub fn spawn(config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(config.mailbox_capacity.max(1));
        let handle = HubHandle {
            command_tx,
            queue_capacity: config.queue_capacity.max(1),
        };

        let task = tokio::spawn(Hub::default().run(command_rx));
        info!(
            mailbox_capacity = config.mailbox_capacity,
            queue_capacity = config.queue_capacity,
            "broadcast hub started"
        );

        (handle, task)
    }

    async fn run(mut self, mut command_rx: mpsc::Receiver<HubCommand>) {
        while let Some(command) = command_rx.recv().await {
            match command {
                HubCommand::Register {
                    event_id,
                    connection_id,
                    sender,
                    evicted,
                } => self.handle_register(event_id, connection_id, Subscriber { sender, evicted }),
                HubCommand::Unregister {
                    event_id,
                    connection_id,
                } => self.handle_unregister(event_id, connection_id),
                HubCommand::Broadcast {
                    event_id,
                    notification,
                } => self.handle_broadcast(event_id, &notification),
                HubCommand::GetStats { response } => {
                    _ = response.send(self.collect_stats());
                }
                HubCommand::Shutdown { response } => {
                    info!("shutting down broadcast hub");
                    _ = response.send(());
                    break;
                }
            }
        }

        info!(
            remaining = self.subscribers.values().map(HashMap::len).sum::<usize>(),
            "broadcast hub stopped"
        );
    }

    fn handle_register(
        &mut self,
        event_id: EventId,
        connection_id: ConnectionId,
        subscriber: Subscriber,
    ) {
        let subscribers = self.subscribers.entry(event_id).or_default();
        subscribers.insert(connection_id, subscriber);

        debug!(%event_id, %connection_id, count = subscribers.len(), "subscriber registered");
    }

    fn handle_unregister(&mut self, event_id: EventId, connection_id: ConnectionId) {
        let Some(subscribers) = self.subscribers.get_mut(&event_id) else {
            return;
        };

        if subscribers.remove(&connection_id).is_some() {
            debug!(%event_id, %connection_id, count = subscribers.len(), "subscriber unregistered");
        }

        if subscribers.is_empty() {
            self.subscribers.remove(&event_id);
        }
    }

    fn handle_broadcast(&mut self, event_id: EventId, notification: &Notification) {
        let Some(subscribers) = self.subscribers.get_mut(&event_id) else {
            trace!(%event_id, "no subscribers; broadcast skipped");
            return;
        };

        let frame = match serde_json::to_string(notification) {
            Ok(json) => Utf8Bytes::from(json),
            Err(e) => {
                error!(%event_id, error = ?e, "notification serialization failure; broadcast skipped");
                self.skipped_broadcasts += 1;
                return;
            }
        };

        let mut delivered = 0;
        let mut evicted = 0;
        subscribers.retain(|connection_id, subscriber| {
            match subscriber.sender.try_send(frame.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(%event_id, %connection_id, "outbound queue full; evicting subscriber");
                    subscriber.evicted.cancel();
                    evicted += 1;
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%event_id, %connection_id, "outbound queue closed; dropping subscriber");
                    false
                }
            }
        });

        if subscribers.is_empty() {
            self.subscribers.remove(&event_id);
        }

        self.delivered += delivered;
        self.evicted += evicted;
        trace!(%event_id, delivered, evicted, "broadcast complete");
    }

    fn collect_stats(&self) -> HubStats {
        let subscribers: HashMap<EventId, usize> = self
            .subscribers
            .iter()
            .map(|(event_id, set)| (*event_id, set.len()))
            .collect();

        HubStats {
            total_subscribers: subscribers.values().sum(),
            subscribers,
            delivered: self.delivered,
            evicted: self.evicted,
            skipped_broadcasts: self.skipped_broadcasts,
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::db::models::ScoreId;

    fn small_hub(queue_capacity: usize) -> HubHandle {
        Hub::spawn(HubConfig {
            mailbox_capacity: 64,
            queue_capacity,
        })
        .0
    }

    fn decode(frame: &Utf8Bytes) -> Notification {
        serde_json::from_str(frame.as_str()).unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let hub = small_hub(4);

        tokio::time::timeout(Duration::from_secs(1), async {
            for i in 0..100 {
                hub.broadcast(EventId(1), Notification::score_update(EventId(1), ScoreId(i)))
                    .await;
            }
        })
        .await
        .expect("broadcast must not block without subscribers");

        let stats = hub.stats().await;
        assert_eq!(stats.total_subscribers, 0);
        assert_eq!(stats.delivered, 0);
    }

    #[tokio::test]
    async fn test_delivery_is_fifo() {
        let hub = small_hub(16);
        let mut sub = hub.register(EventId(1)).await.unwrap();

        for i in 0..10 {
            hub.broadcast(EventId(1), Notification::score_update(EventId(1), ScoreId(i)))
                .await;
        }

        for i in 0..10 {
            let frame = sub.receiver.recv().await.unwrap();
            assert_eq!(decode(&frame), Notification::score_update(EventId(1), ScoreId(i)));
        }

        assert_eq!(hub.stats().await.delivered, 10);
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_is_scoped_to_event() {
        let hub = small_hub(8);
        let mut first = hub.register(EventId(1)).await.unwrap();
        let mut second = hub.register(EventId(2)).await.unwrap();

        hub.broadcast(EventId(2), Notification::score_delete(EventId(2), ScoreId(9)))
            .await;
        _ = hub.stats().await;

        assert!(first.receiver.try_recv().is_err());
        let frame = second.receiver.try_recv().unwrap();
        assert_eq!(decode(&frame), Notification::score_delete(EventId(2), ScoreId(9)));
    }

    #[tokio::test]
    async fn test_full_queue_evicts_only_slow_subscriber() {
        let hub = small_hub(4);
        let mut slow = hub.register(EventId(1)).await.unwrap();
        let mut fast = hub.register(EventId(1)).await.unwrap();

        for i in 0..6 {
            hub.broadcast(EventId(1), Notification::score_update(EventId(1), ScoreId(i)))
                .await;
            let frame = fast.receiver.recv().await.unwrap();
            assert_eq!(decode(&frame).payload().score_id, ScoreId(i));
        }

        let stats = hub.stats().await;
        assert_eq!(stats.subscriber_count(EventId(1)), 1);
        assert_eq!(stats.evicted, 1);
        assert!(slow.evicted.is_cancelled());
        assert!(!fast.evicted.is_cancelled());

        // the slow subscriber keeps what was already queued, then sees its queue closed
        for i in 0..4 {
            let frame = slow.receiver.recv().await.unwrap();
            assert_eq!(decode(&frame).payload().score_id, ScoreId(i));
        }
        assert!(slow.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unregister_twice_is_noop() {
        let hub = small_hub(4);
        let sub = hub.register(EventId(5)).await.unwrap();
        let other = hub.register(EventId(5)).await.unwrap();

        hub.unregister(sub.event_id, sub.connection_id).await;
        hub.unregister(sub.event_id, sub.connection_id).await;
        hub.unregister(EventId(404), sub.connection_id).await;

        assert_eq!(hub.subscriber_count(EventId(5)).await, 1);

        hub.unregister(other.event_id, other.connection_id).await;
        assert_eq!(hub.subscriber_count(EventId(5)).await, 0);
        assert!(hub.stats().await.subscribers.is_empty());
    }

    #[tokio::test]
    async fn test_register_then_disconnect_before_broadcast() {
        let hub = small_hub(4);
        let sub = hub.register(EventId(1)).await.unwrap();
        drop(sub);

        hub.broadcast(EventId(1), Notification::score_update(EventId(1), ScoreId(1)))
            .await;

        let stats = hub.stats().await;
        assert_eq!(stats.subscriber_count(EventId(1)), 0);
        assert_eq!(stats.evicted, 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_queues() {
        let (hub, task) = Hub::spawn(HubConfig::default());
        let mut sub = hub.register(EventId(1)).await.unwrap();

        hub.shutdown().await;
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        assert!(sub.receiver.recv().await.is_none());
        assert!(matches!(
            hub.register(EventId(1)).await,
            Err(HubError::Closed)
        ));

        // broadcasting into a stopped hub is still not an error
        hub.broadcast(EventId(1), Notification::score_update(EventId(1), ScoreId(1)))
            .await;
        assert_eq!(hub.stats().await.total_subscribers, 0);
    }
}
