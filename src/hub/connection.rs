//! Per-viewer subscriber connection.
//!
//! Each connection runs two tasks over its websocket:
//!
//! - the inbound task reads only to notice the peer going away; payloads are discarded,
//! - the outbound task drains the connection's queue onto the socket in FIFO order.
//!
//! Either task may finish first. Both share one [`CancellationToken`] so the survivor stops too,
//! and both unregister from the hub on the way out (unregistering is idempotent). The token is a
//! child of the subscription's eviction token, so an evicted connection stops even while a write to
//! a stalled peer is pending.

use core::fmt;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use crate::db::models::EventId;
use crate::hub::registry::{HubHandle, Subscription};
use crate::hub::types::{ConnectionId, HubResult};

/// Upper bound on the closing handshake with a peer that may have stopped reading.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct SubscriberConnection {
    hub: HubHandle,
    subscription: Subscription,
    shutdown: CancellationToken,
}

impl SubscriberConnection {
    /// Registers a new subscriber for `event_id`.
    pub async fn open(hub: HubHandle, event_id: EventId) -> HubResult<Self> {
        let subscription = hub.register(event_id).await?;
        let shutdown = subscription.evicted.child_token();
        Ok(Self {
            hub,
            subscription,
            shutdown,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.subscription.connection_id
    }

    pub fn event_id(&self) -> EventId {
        self.subscription.event_id
    }

    /// Drives the connection until both of its tasks have stopped.
    pub async fn run<S, R, E>(self, sink: S, stream: R)
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: fmt::Display + Send,
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let event_id = self.event_id();
        let connection_id = self.id();
        let span = info_span!("subscriber", %event_id, %connection_id);

        let Self {
            hub,
            subscription,
            shutdown,
        } = self;

        let outbound = tokio::spawn(
            drain_outbound(sink, subscription, hub.clone(), shutdown.clone())
                .instrument(span.clone()),
        );
        let inbound = tokio::spawn(
            drain_inbound(stream, event_id, connection_id, hub, shutdown).instrument(span.clone()),
        );

        let (outbound, inbound) = tokio::join!(outbound, inbound);
        for res in [outbound, inbound] {
            if let Err(e) = res {
                warn!(parent: &span, error = ?e, "subscriber task aborted");
            }
        }

        debug!(parent: &span, "subscriber closed");
    }
}

/// Upgraded-socket entry point: registers the socket with the hub and runs it to completion.
pub async fn serve_websocket(hub: HubHandle, event_id: EventId, socket: WebSocket) {
    let (mut sink, stream) = socket.split();

    match SubscriberConnection::open(hub, event_id).await {
        Ok(connection) => connection.run(sink, stream).await,
        Err(e) => {
            warn!(%event_id, error = %e, "subscriber registration failure");
            _ = sink.send(Message::Close(None)).await;
        }
    }
}

async fn drain_outbound<S>(
    mut sink: S,
    mut subscription: Subscription,
    hub: HubHandle,
    shutdown: CancellationToken,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let evicted = subscription.evicted.clone();
    let mut send_close = false;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if evicted.is_cancelled() {
                    debug!("evicted; sending close frame");
                    send_close = true;
                } else {
                    debug!("inbound side closed; stopping writer");
                }
                break;
            }

            frame = subscription.receiver.recv() => match frame {
                Some(frame) => tokio::select! {
                    res = sink.send(Message::Text(frame)) => if let Err(e) = res {
                        debug!(error = %e, "write failure");
                        break;
                    },
                    _ = shutdown.cancelled() => {
                        debug!(evicted = evicted.is_cancelled(), "write abandoned");
                        send_close = evicted.is_cancelled();
                        break;
                    }
                },
                None => {
                    debug!("outbound queue closed; sending close frame");
                    send_close = true;
                    break;
                }
            }
        }
    }

    shutdown.cancel();
    hub.unregister(subscription.event_id, subscription.connection_id)
        .await;

    let closing = async {
        if send_close {
            _ = sink.send(Message::Close(None)).await;
        }
        _ = sink.close().await;
    };
    if tokio::time::timeout(CLOSE_TIMEOUT, closing).await.is_err() {
        debug!("peer not accepting writes; dropping socket without a closing handshake");
    }
}

async fn drain_inbound<R, E>(
    mut stream: R,
    event_id: EventId,
    connection_id: ConnectionId,
    hub: HubHandle,
    shutdown: CancellationToken,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            message = stream.next() => match message {
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "peer closed");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!(error = %e, "read failure");
                    break;
                }
                None => {
                    debug!("peer went away");
                    break;
                }
            }
        }
    }

    hub.unregister(event_id, connection_id).await;
    shutdown.cancel();
}
