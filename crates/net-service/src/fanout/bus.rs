//! Fan-out bus: subscription registry and best-effort delivery.
//!
//! The bus owns the only copy of the connection/subscription map. Each
//! open connection registers a bounded sender whose receiving half is
//! drained by that connection's socket writer. A connection observes at
//! most one net at a time.
//!
//! Delivery never blocks and is never retried. A frame for a connection
//! whose queue is full is dropped; the connection stays registered. A send
//! to a closed connection is skipped and the connection is dropped from the
//! registry after the publish completes. Per-net ordering holds because each net's
//! events come from its single actor and every channel is FIFO.

use super::events::{encode, NetEvent};
use crate::observability::metrics;
use common::types::{ConnectionId, NetId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, error, instrument};

/// Outbound frames queued per connection before new frames are dropped.
pub const CONNECTION_CHANNEL_BUFFER: usize = 200;

struct Connection {
    sender: mpsc::Sender<String>,
    net_id: Option<NetId>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    observers: HashMap<NetId, HashSet<ConnectionId>>,
}

impl Registry {
    /// Remove `connection_id` from its observer set, if any.
    fn detach(&mut self, connection_id: ConnectionId) -> Option<NetId> {
        let net_id = self
            .connections
            .get_mut(&connection_id)
            .and_then(|c| c.net_id.take())?;

        if let Some(set) = self.observers.get_mut(&net_id) {
            set.remove(&connection_id);
            if set.is_empty() {
                self.observers.remove(&net_id);
            }
        }
        Some(net_id)
    }

    fn remove(&mut self, connection_id: ConnectionId) {
        self.detach(connection_id);
        self.connections.remove(&connection_id);
    }
}

/// Cloneable handle to the shared registry.
#[derive(Clone, Default)]
pub struct FanOutBus {
    inner: Arc<RwLock<Registry>>,
}

impl FanOutBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open connection. It receives global broadcasts
    /// immediately and net events once subscribed.
    pub async fn connect(&self, connection_id: ConnectionId, sender: mpsc::Sender<String>) {
        let mut registry = self.inner.write().await;
        registry.connections.insert(
            connection_id,
            Connection {
                sender,
                net_id: None,
            },
        );
        metrics::set_connections_active(registry.connections.len());
    }

    /// Forget a connection and its subscription.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut registry = self.inner.write().await;
        registry.remove(connection_id);
        metrics::set_connections_active(registry.connections.len());
    }

    /// Observe `net_id`, replacing any earlier subscription.
    ///
    /// Returns false if the connection is not registered.
    pub async fn subscribe(&self, connection_id: ConnectionId, net_id: NetId) -> bool {
        let mut registry = self.inner.write().await;
        if !registry.connections.contains_key(&connection_id) {
            return false;
        }

        registry.detach(connection_id);
        registry
            .observers
            .entry(net_id)
            .or_default()
            .insert(connection_id);
        if let Some(connection) = registry.connections.get_mut(&connection_id) {
            connection.net_id = Some(net_id);
        }

        debug!(target: "net.fanout", connection_id = %connection_id, net_id = %net_id, "Subscribed");
        true
    }

    /// Drop the connection's subscription. No-op if it has none.
    pub async fn unsubscribe(&self, connection_id: ConnectionId) -> Option<NetId> {
        self.inner.write().await.detach(connection_id)
    }

    /// Deliver an event to every connection observing `net_id`.
    ///
    /// Returns the number of connections the frame was handed to.
    #[instrument(skip_all, name = "net.fanout.publish", fields(net_id = %net_id, event = event.event_type()))]
    pub async fn publish(&self, net_id: NetId, event: &NetEvent) -> usize {
        let frame = match encode(event, Some(net_id)) {
            Ok(frame) => frame,
            Err(e) => {
                error!(target: "net.fanout", error = %e, "Failed to encode event");
                return 0;
            }
        };

        let outcome = {
            let registry = self.inner.read().await;
            let Some(observers) = registry.observers.get(&net_id) else {
                return 0;
            };
            send_all(
                observers
                    .iter()
                    .filter_map(|id| registry.connections.get(id).map(|c| (*id, c))),
                &frame,
            )
        };

        metrics::record_event_published("net", outcome.delivered);
        self.settle(outcome).await
    }

    /// Deliver an event to every open connection.
    #[instrument(skip_all, name = "net.fanout.broadcast", fields(event = event.event_type()))]
    pub async fn broadcast_global(&self, event: &NetEvent) -> usize {
        let frame = match encode(event, None) {
            Ok(frame) => frame,
            Err(e) => {
                error!(target: "net.fanout", error = %e, "Failed to encode event");
                return 0;
            }
        };

        let outcome = {
            let registry = self.inner.read().await;
            send_all(
                registry.connections.iter().map(|(id, c)| (*id, c)),
                &frame,
            )
        };

        metrics::record_event_published("global", outcome.delivered);
        self.settle(outcome).await
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn subscriber_count(&self, net_id: NetId) -> usize {
        self.inner
            .read()
            .await
            .observers
            .get(&net_id)
            .map_or(0, HashSet::len)
    }

    /// The net a connection currently observes.
    pub async fn subscription_of(&self, connection_id: ConnectionId) -> Option<NetId> {
        self.inner
            .read()
            .await
            .connections
            .get(&connection_id)
            .and_then(|c| c.net_id)
    }

    /// Record drops and remove closed connections. Returns the delivered count.
    async fn settle(&self, outcome: SendOutcome) -> usize {
        let dropped = outcome.stalled.len() + outcome.closed.len();
        if dropped == 0 {
            return outcome.delivered;
        }
        metrics::record_events_dropped(dropped);

        for connection_id in &outcome.stalled {
            debug!(target: "net.fanout", connection_id = %connection_id, "Outbound queue full, frame dropped");
        }

        if !outcome.closed.is_empty() {
            self.reap(&outcome.closed).await;
        }
        outcome.delivered
    }

    async fn reap(&self, closed: &[ConnectionId]) {
        let mut registry = self.inner.write().await;
        for connection_id in closed {
            debug!(target: "net.fanout", connection_id = %connection_id, "Removing closed connection");
            registry.remove(*connection_id);
        }
        metrics::set_connections_active(registry.connections.len());
    }
}

#[derive(Default)]
struct SendOutcome {
    delivered: usize,
    /// Connections whose queue was full.
    stalled: Vec<ConnectionId>,
    /// Connections whose receiver is gone.
    closed: Vec<ConnectionId>,
}

fn send_all<'a>(
    targets: impl Iterator<Item = (ConnectionId, &'a Connection)>,
    frame: &str,
) -> SendOutcome {
    let mut outcome = SendOutcome::default();
    for (id, connection) in targets {
        match connection.sender.try_send(frame.to_owned()) {
            Ok(()) => outcome.delivered += 1,
            Err(TrySendError::Full(_)) => outcome.stalled.push(id),
            Err(TrySendError::Closed(_)) => outcome.closed.push(id),
        }
    }
    outcome
}
