//! `NetControllerActor` - singleton supervisor for net actors.
//!
//! - Creates nets and starts their actors
//! - Hands out the actor for a live net, starting one on first use
//! - Owns the root `CancellationToken` for graceful shutdown
//! - Reaps actors whose task has finished (ended nets, panics)

use super::messages::{ControllerMessage, ControllerStatus};
use super::metrics::{ActorType, MailboxMonitor};
use super::net::{NetActor, NetActorHandle, NetContext};
use crate::errors::NetError;
use crate::fanout::NetEvent;
use crate::models::Net;
use crate::observability::metrics;
use crate::services::SessionRegistry;
use common::types::{NetId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the controller mailbox.
const CONTROLLER_CHANNEL_BUFFER: usize = 1000;

/// How long shutdown waits for each net actor.
const NET_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to the `NetControllerActor`.
#[derive(Clone)]
pub struct NetControllerHandle {
    sender: mpsc::Sender<ControllerMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl NetControllerHandle {
    /// Spawn the controller and return a handle to it.
    #[must_use]
    pub fn new(ctx: NetContext) -> Self {
        let (sender, receiver) = mpsc::channel(CONTROLLER_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();
        let mailbox = Arc::new(MailboxMonitor::new(ActorType::Controller, "controller"));

        let actor = NetControllerActor {
            ctx,
            receiver,
            cancel_token: cancel_token.clone(),
            mailbox: Arc::clone(&mailbox),
            nets: HashMap::new(),
        };
        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
            mailbox,
        }
    }

    async fn send(&self, message: ControllerMessage) -> Result<(), NetError> {
        self.mailbox.record_enqueue();
        self.sender.send(message).await.map_err(|e| {
            self.mailbox.record_send_failed();
            NetError::Internal(format!("channel send failed: {e}"))
        })
    }

    /// Create a net; its creator becomes the host.
    pub async fn create_net(
        &self,
        host_id: UserId,
        name: String,
        description: Option<String>,
    ) -> Result<Net, NetError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::CreateNet {
            host_id,
            name,
            description,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| NetError::Internal(format!("response receive failed: {e}")))?
    }

    /// Actor for a live net.
    ///
    /// Unknown nets are `NotFound`; ended nets are `InvalidState`.
    pub async fn net(&self, net_id: NetId) -> Result<NetActorHandle, NetError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::GetNet {
            net_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| NetError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn get_status(&self) -> Result<ControllerStatus, NetError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::GetStatus { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| NetError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the controller and every net actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

struct ManagedNet {
    handle: NetActorHandle,
    task_handle: JoinHandle<()>,
}

/// The `NetControllerActor` implementation.
pub struct NetControllerActor {
    ctx: NetContext,
    receiver: mpsc::Receiver<ControllerMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
    nets: HashMap<NetId, ManagedNet>,
}

impl NetControllerActor {
    #[instrument(skip_all, name = "net.actor.controller")]
    async fn run(mut self) {
        info!(target: "net.actor.controller", "NetControllerActor started");

        loop {
            self.check_net_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "net.actor.controller",
                        "NetControllerActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                        }
                        None => {
                            info!(
                                target: "net.actor.controller",
                                "NetControllerActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "net.actor.controller",
            nets_remaining = self.nets.len(),
            messages_processed = self.mailbox.messages_processed(),
            "NetControllerActor stopped"
        );
    }

    async fn handle_message(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::CreateNet {
                host_id,
                name,
                description,
                respond_to,
            } => {
                let result = self.create_net(host_id, &name, description.as_deref()).await;
                let _ = respond_to.send(result);
            }

            ControllerMessage::GetNet { net_id, respond_to } => {
                let result = self.get_net(net_id).await;
                let _ = respond_to.send(result);
            }

            ControllerMessage::GetStatus { respond_to } => {
                let status = self.get_status().await;
                let _ = respond_to.send(status);
            }
        }
    }

    async fn create_net(
        &mut self,
        host_id: UserId,
        name: &str,
        description: Option<&str>,
    ) -> Result<Net, NetError> {
        let start = std::time::Instant::now();
        let result = SessionRegistry::create_net(&self.ctx.pool, host_id, name, description).await;
        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.error_type_label(),
        };
        metrics::record_command("create", status, start.elapsed());

        let net = result?;
        self.spawn_net(net.id);

        let delivered = self
            .ctx
            .bus
            .broadcast_global(&NetEvent::Created(net.clone()))
            .await;
        info!(
            target: "net.actor.controller",
            net_id = %net.id,
            host_id = %host_id,
            delivered,
            "Net created"
        );

        Ok(net)
    }

    async fn get_net(&mut self, net_id: NetId) -> Result<NetActorHandle, NetError> {
        if let Some(managed) = self.nets.get(&net_id) {
            if !managed.handle.is_closed() {
                return Ok(managed.handle.clone());
            }
        }

        let net = SessionRegistry::find_net(&self.ctx.pool, net_id)
            .await?
            .ok_or_else(|| NetError::NotFound("Net not found".to_string()))?;
        if !net.is_live() {
            return Err(NetError::InvalidState("Net has ended".to_string()));
        }

        Ok(self.spawn_net(net_id))
    }

    fn spawn_net(&mut self, net_id: NetId) -> NetActorHandle {
        let (handle, task_handle) =
            NetActor::spawn(net_id, self.ctx.clone(), self.cancel_token.child_token());

        if let Some(previous) = self.nets.insert(
            net_id,
            ManagedNet {
                handle: handle.clone(),
                task_handle,
            },
        ) {
            previous.handle.cancel();
        }
        metrics::set_nets_active(self.nets.len());

        debug!(target: "net.actor.controller", net_id = %net_id, "NetActor spawned");
        handle
    }

    async fn get_status(&self) -> ControllerStatus {
        ControllerStatus {
            net_actor_count: self.nets.len(),
            connection_count: self.ctx.bus.connection_count().await,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    async fn graceful_shutdown(&mut self) {
        info!(
            target: "net.actor.controller",
            net_count = self.nets.len(),
            "Performing graceful shutdown"
        );

        for managed in self.nets.values() {
            managed.handle.cancel();
        }

        for (net_id, managed) in self.nets.drain() {
            match tokio::time::timeout(NET_SHUTDOWN_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(target: "net.actor.controller", net_id = %net_id, "NetActor completed cleanly");
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "net.actor.controller",
                        net_id = %net_id,
                        error = ?e,
                        "NetActor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(target: "net.actor.controller", net_id = %net_id, "NetActor shutdown timed out");
                }
            }
        }
        metrics::set_nets_active(0);

        info!(target: "net.actor.controller", "Graceful shutdown complete");
    }

    /// Drop actors whose task has finished.
    async fn check_net_health(&mut self) {
        let finished: Vec<NetId> = self
            .nets
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(net_id, _)| *net_id)
            .collect();

        if finished.is_empty() {
            return;
        }

        for net_id in finished {
            let Some(managed) = self.nets.remove(&net_id) else {
                continue;
            };
            match managed.task_handle.await {
                Ok(()) => {
                    debug!(target: "net.actor.controller", net_id = %net_id, "NetActor exited");
                }
                Err(join_error) if join_error.is_panic() => {
                    error!(
                        target: "net.actor.controller",
                        net_id = %net_id,
                        error = ?join_error,
                        "NetActor panicked"
                    );
                }
                Err(_) => {}
            }
        }
        metrics::set_nets_active(self.nets.len());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fanout::FanOutBus;
    use common::types::ConnectionId;
    use sqlx::SqlitePool;

    async fn seed_user(pool: &SqlitePool, username: &str) -> UserId {
        let id: i64 = sqlx::query_scalar("INSERT INTO users (username) VALUES (?) RETURNING id")
            .bind(username)
            .fetch_one(pool)
            .await
            .unwrap();
        UserId(id)
    }

    fn controller(pool: SqlitePool, bus: FanOutBus) -> NetControllerHandle {
        NetControllerHandle::new(NetContext {
            pool,
            bus,
            max_speakers: 10,
        })
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_create_net_broadcasts_and_spawns(pool: SqlitePool) {
        let bus = FanOutBus::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(crate::fanout::CONNECTION_CHANNEL_BUFFER);
        bus.connect(ConnectionId::new(), tx).await;

        let handle = controller(pool.clone(), bus);
        let host = seed_user(&pool, "alice").await;

        let net = handle
            .create_net(host, "Morning net".to_string(), None)
            .await
            .unwrap();
        assert_eq!(net.host_id, host);

        let frame: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["eventType"], "net:created");
        assert_eq!(frame["payload"]["name"], "Morning net");

        let status = handle.get_status().await.unwrap();
        assert_eq!(status.net_actor_count, 1);
        assert_eq!(status.connection_count, 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_create_net_rejects_empty_name(pool: SqlitePool) {
        let handle = controller(pool.clone(), FanOutBus::new());
        let host = seed_user(&pool, "alice").await;

        let err = handle
            .create_net(host, "   ".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::Validation(_)));
        assert_eq!(handle.get_status().await.unwrap().net_actor_count, 0);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_unknown_net_is_not_found(pool: SqlitePool) {
        let handle = controller(pool, FanOutBus::new());
        let err = handle.net(NetId(404)).await.unwrap_err();
        assert!(matches!(err, NetError::NotFound(_)));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_ended_net_actor_is_replaced_by_invalid_state(pool: SqlitePool) {
        let handle = controller(pool.clone(), FanOutBus::new());
        let host = seed_user(&pool, "alice").await;
        let net = handle
            .create_net(host, "Evening".to_string(), None)
            .await
            .unwrap();

        let actor = handle.net(net.id).await.unwrap();
        actor.end(host).await.unwrap();

        let err = handle.net(net.id).await.unwrap_err();
        assert!(matches!(err, NetError::InvalidState(_)));

        let err = actor.join(host).await.unwrap_err();
        assert!(matches!(err, NetError::InvalidState(_)));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_net_actor_started_on_first_use(pool: SqlitePool) {
        let host = seed_user(&pool, "alice").await;
        let first = controller(pool.clone(), FanOutBus::new());
        let net = first
            .create_net(host, "Restarted".to_string(), None)
            .await
            .unwrap();
        first.cancel();

        let second = controller(pool, FanOutBus::new());
        let actor = second.net(net.id).await.unwrap();
        assert_eq!(actor.net_id(), net.id);
        assert_eq!(second.get_status().await.unwrap().net_actor_count, 1);
    }

    #[tokio::test]
    async fn test_cancel_marks_handle() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let handle = controller(pool, FanOutBus::new());
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(handle.child_token().is_cancelled());
    }
}
