//! `NetActor` - single writer for one net.
//!
//! Every mutating command for a net runs inside that net's actor, one at a
//! time: validate, commit the transaction, then publish the resulting event
//! through the fan-out bus. Two `approve` calls on the same net can
//! therefore never both pass the speaker cap, and subscribers see events in
//! commit order. Different nets run on different actors in parallel.
//!
//! A failed publish never rolls back a committed command.
//!
//! After a successful `End` the actor answers anything still queued with
//! `InvalidState` and stops.

use super::messages::{NetActorState, NetMessage};
use super::metrics::{ActorType, MailboxMonitor};
use crate::errors::NetError;
use crate::fanout::events::{NetEnded, ParticipantLeft, RequestDenied};
use crate::fanout::{FanOutBus, NetEvent};
use crate::models::{ChatMessage, JoinOutcome, Net, Participant, SpeakRequest};
use crate::observability::metrics;
use crate::services::speak_requests::{Approval, SpeakRequestOutcome};
use crate::services::{ChatService, RoleService, SessionRegistry, SpeakRequestArbiter};
use common::types::{NetId, SpeakRequestId, UserId};
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for a net actor mailbox.
const NET_CHANNEL_BUFFER: usize = 256;

/// Shared dependencies handed to every net actor.
#[derive(Clone)]
pub struct NetContext {
    pub pool: SqlitePool,
    pub bus: FanOutBus,
    pub max_speakers: u32,
}

/// Handle to a `NetActor`.
#[derive(Clone, Debug)]
pub struct NetActorHandle {
    sender: mpsc::Sender<NetMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
    net_id: NetId,
}

impl NetActorHandle {
    #[must_use]
    pub fn net_id(&self) -> NetId {
        self.net_id
    }

    /// True once the actor has stopped accepting messages.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, NetError>>) -> NetMessage,
    ) -> Result<T, NetError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        if self.sender.send(build(tx)).await.is_err() {
            self.mailbox.record_send_failed();
            return Err(NetError::InvalidState(
                "Net is no longer accepting commands".to_string(),
            ));
        }

        rx.await
            .map_err(|e| NetError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn join(&self, user_id: UserId) -> Result<JoinOutcome, NetError> {
        self.request(|respond_to| NetMessage::Join {
            user_id,
            respond_to,
        })
        .await
    }

    pub async fn leave(&self, user_id: UserId) -> Result<bool, NetError> {
        self.request(|respond_to| NetMessage::Leave {
            user_id,
            respond_to,
        })
        .await
    }

    pub async fn end(&self, user_id: UserId) -> Result<Net, NetError> {
        self.request(|respond_to| NetMessage::End {
            user_id,
            respond_to,
        })
        .await
    }

    pub async fn invite_cohost(
        &self,
        target_id: UserId,
        actor_id: UserId,
    ) -> Result<Participant, NetError> {
        self.request(|respond_to| NetMessage::InviteCohost {
            target_id,
            actor_id,
            respond_to,
        })
        .await
    }

    pub async fn demote(&self, target_id: UserId, actor_id: UserId) -> Result<Participant, NetError> {
        self.request(|respond_to| NetMessage::Demote {
            target_id,
            actor_id,
            respond_to,
        })
        .await
    }

    pub async fn toggle_mute(&self, user_id: UserId) -> Result<Participant, NetError> {
        self.request(|respond_to| NetMessage::ToggleMute {
            user_id,
            respond_to,
        })
        .await
    }

    pub async fn request_speak(&self, user_id: UserId) -> Result<SpeakRequestOutcome, NetError> {
        self.request(|respond_to| NetMessage::RequestSpeak {
            user_id,
            respond_to,
        })
        .await
    }

    pub async fn approve(
        &self,
        request_id: SpeakRequestId,
        target_id: UserId,
        approver_id: UserId,
    ) -> Result<Approval, NetError> {
        self.request(|respond_to| NetMessage::Approve {
            request_id,
            target_id,
            approver_id,
            respond_to,
        })
        .await
    }

    pub async fn deny(
        &self,
        request_id: SpeakRequestId,
        approver_id: UserId,
    ) -> Result<SpeakRequest, NetError> {
        self.request(|respond_to| NetMessage::Deny {
            request_id,
            approver_id,
            respond_to,
        })
        .await
    }

    pub async fn post_message(
        &self,
        user_id: UserId,
        content: String,
    ) -> Result<ChatMessage, NetError> {
        self.request(|respond_to| NetMessage::PostMessage {
            user_id,
            content,
            respond_to,
        })
        .await
    }

    pub async fn get_state(&self) -> Result<NetActorState, NetError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        if self.sender.send(NetMessage::GetState { respond_to: tx }).await.is_err() {
            self.mailbox.record_send_failed();
            return Err(NetError::InvalidState(
                "Net is no longer accepting commands".to_string(),
            ));
        }
        rx.await
            .map_err(|e| NetError::Internal(format!("response receive failed: {e}")))
    }
}

/// The `NetActor` implementation.
pub struct NetActor {
    net_id: NetId,
    ctx: NetContext,
    receiver: mpsc::Receiver<NetMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
    ended: bool,
}

impl NetActor {
    /// Spawn an actor for `net_id` and return its handle and task.
    pub fn spawn(
        net_id: NetId,
        ctx: NetContext,
        cancel_token: CancellationToken,
    ) -> (NetActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(NET_CHANNEL_BUFFER);
        let mailbox = Arc::new(MailboxMonitor::new(ActorType::Net, format!("net-{net_id}")));

        let actor = Self {
            net_id,
            ctx,
            receiver,
            cancel_token: cancel_token.clone(),
            mailbox: Arc::clone(&mailbox),
            ended: false,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = NetActorHandle {
            sender,
            cancel_token,
            mailbox,
            net_id,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "net.actor.net", fields(net_id = %self.net_id))]
    async fn run(mut self) {
        debug!(target: "net.actor.net", net_id = %self.net_id, "NetActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(target: "net.actor.net", net_id = %self.net_id, "NetActor cancelled");
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                        }
                        None => break,
                    }
                }
            }

            if self.ended {
                self.drain_after_end().await;
                break;
            }
        }

        info!(
            target: "net.actor.net",
            net_id = %self.net_id,
            ended = self.ended,
            messages_processed = self.mailbox.messages_processed(),
            "NetActor stopped"
        );
    }

    async fn drain_after_end(&mut self) {
        self.receiver.close();
        while let Some(message) = self.receiver.recv().await {
            message.reject(
                || NetError::InvalidState("Net has ended".to_string()),
                self.state(),
            );
            self.mailbox.record_dequeue();
        }
    }

    fn state(&self) -> NetActorState {
        NetActorState {
            net_id: self.net_id,
            commands_processed: self.mailbox.messages_processed(),
            ended: self.ended,
        }
    }

    async fn handle_message(&mut self, message: NetMessage) {
        let net_id = self.net_id;
        let pool = self.ctx.pool.clone();

        match message {
            NetMessage::Join {
                user_id,
                respond_to,
            } => {
                let result = timed("join", SessionRegistry::join(&pool, net_id, user_id)).await;
                if let Ok(outcome) = &result {
                    if !outcome.already_present {
                        self.publish(NetEvent::ParticipantJoined(outcome.participant.clone()))
                            .await;
                    }
                }
                let _ = respond_to.send(result);
            }

            NetMessage::Leave {
                user_id,
                respond_to,
            } => {
                let result = timed("leave", SessionRegistry::leave(&pool, net_id, user_id)).await;
                if let Ok(true) = result {
                    self.publish(NetEvent::ParticipantLeft(ParticipantLeft { user_id }))
                        .await;
                }
                let _ = respond_to.send(result);
            }

            NetMessage::End {
                user_id,
                respond_to,
            } => {
                let result = timed("end", SessionRegistry::end(&pool, net_id, user_id)).await;
                if result.is_ok() {
                    self.ended = true;
                    let event = NetEvent::Ended(NetEnded { net_id });
                    let delivered = self.ctx.bus.broadcast_global(&event).await;
                    info!(target: "net.actor.net", net_id = %net_id, delivered, "Net ended");
                }
                let _ = respond_to.send(result);
            }

            NetMessage::InviteCohost {
                target_id,
                actor_id,
                respond_to,
            } => {
                let result = timed(
                    "invite_cohost",
                    RoleService::invite_cohost(&pool, net_id, target_id, actor_id),
                )
                .await;
                if let Ok(participant) = &result {
                    self.publish(NetEvent::role_changed(participant)).await;
                }
                let _ = respond_to.send(result);
            }

            NetMessage::Demote {
                target_id,
                actor_id,
                respond_to,
            } => {
                let result =
                    timed("demote", RoleService::demote(&pool, net_id, target_id, actor_id)).await;
                if let Ok(participant) = &result {
                    self.publish(NetEvent::role_changed(participant)).await;
                }
                let _ = respond_to.send(result);
            }

            NetMessage::ToggleMute {
                user_id,
                respond_to,
            } => {
                let result =
                    timed("toggle_mute", RoleService::toggle_mute(&pool, net_id, user_id)).await;
                if let Ok(participant) = &result {
                    self.publish(NetEvent::mute_changed(participant)).await;
                }
                let _ = respond_to.send(result);
            }

            NetMessage::RequestSpeak {
                user_id,
                respond_to,
            } => {
                let result = timed(
                    "request_speak",
                    SpeakRequestArbiter::request_speak(&pool, net_id, user_id),
                )
                .await;
                if let Ok(outcome) = &result {
                    if outcome.created {
                        self.publish(NetEvent::RequestCreated(outcome.request.clone()))
                            .await;
                    }
                }
                let _ = respond_to.send(result);
            }

            NetMessage::Approve {
                request_id,
                target_id,
                approver_id,
                respond_to,
            } => {
                let result = timed(
                    "approve",
                    SpeakRequestArbiter::approve(
                        &pool,
                        net_id,
                        request_id,
                        target_id,
                        approver_id,
                        self.ctx.max_speakers,
                    ),
                )
                .await;
                if let Ok(approval) = &result {
                    self.publish(NetEvent::role_changed(&approval.participant))
                        .await;
                }
                let _ = respond_to.send(result);
            }

            NetMessage::Deny {
                request_id,
                approver_id,
                respond_to,
            } => {
                let result = timed(
                    "deny",
                    SpeakRequestArbiter::deny(&pool, net_id, request_id, approver_id),
                )
                .await;
                if let Ok(request) = &result {
                    self.publish(NetEvent::RequestDenied(RequestDenied {
                        request_id: request.id,
                        user_id: request.user_id,
                    }))
                    .await;
                }
                let _ = respond_to.send(result);
            }

            NetMessage::PostMessage {
                user_id,
                content,
                respond_to,
            } => {
                let result = timed(
                    "post_message",
                    ChatService::post_message(&pool, net_id, user_id, &content),
                )
                .await;
                if let Ok(message) = &result {
                    self.publish(NetEvent::MessagePosted(message.clone())).await;
                }
                let _ = respond_to.send(result);
            }

            NetMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.state());
            }
        }
    }

    async fn publish(&self, event: NetEvent) {
        let delivered = self.ctx.bus.publish(self.net_id, &event).await;
        debug!(
            target: "net.actor.net",
            net_id = %self.net_id,
            event = event.event_type(),
            delivered,
            "Event published"
        );
    }
}

/// Run a command future and record its outcome.
async fn timed<T>(
    command: &'static str,
    fut: impl Future<Output = Result<T, NetError>>,
) -> Result<T, NetError> {
    let start = Instant::now();
    let result = fut.await;
    let status = match &result {
        Ok(_) => "success",
        Err(e) => e.error_type_label(),
    };
    metrics::record_command(command, status, start.elapsed());

    if let Err(e) = &result {
        if e.status_code() >= 500 {
            warn!(target: "net.actor.net", command, error = %e, "Command failed");
        } else {
            debug!(target: "net.actor.net", command, error = %e, "Command rejected");
        }
    }
    result
}
