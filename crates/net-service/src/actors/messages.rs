//! Message types for actor communication.
//!
//! Requests travel over `tokio::sync::mpsc`; replies come back on a
//! `tokio::sync::oneshot` carried in the message.

use super::net::NetActorHandle;
use crate::errors::NetError;
use crate::models::{ChatMessage, JoinOutcome, Net, Participant, SpeakRequest};
use crate::services::speak_requests::{Approval, SpeakRequestOutcome};
use common::types::{NetId, SpeakRequestId, UserId};
use tokio::sync::oneshot;

type Reply<T> = oneshot::Sender<Result<T, NetError>>;

/// Messages sent to `NetControllerActor`.
#[derive(Debug)]
pub enum ControllerMessage {
    /// Create a net and start its actor.
    CreateNet {
        host_id: UserId,
        name: String,
        description: Option<String>,
        respond_to: Reply<Net>,
    },

    /// Get the actor for a live net, spawning it if needed.
    GetNet {
        net_id: NetId,
        respond_to: Reply<NetActorHandle>,
    },

    GetStatus {
        respond_to: oneshot::Sender<ControllerStatus>,
    },
}

/// Messages sent to `NetActor`. Each one is a single serialized command.
#[derive(Debug)]
pub enum NetMessage {
    Join {
        user_id: UserId,
        respond_to: Reply<JoinOutcome>,
    },

    Leave {
        user_id: UserId,
        respond_to: Reply<bool>,
    },

    End {
        user_id: UserId,
        respond_to: Reply<Net>,
    },

    InviteCohost {
        target_id: UserId,
        actor_id: UserId,
        respond_to: Reply<Participant>,
    },

    Demote {
        target_id: UserId,
        actor_id: UserId,
        respond_to: Reply<Participant>,
    },

    ToggleMute {
        user_id: UserId,
        respond_to: Reply<Participant>,
    },

    RequestSpeak {
        user_id: UserId,
        respond_to: Reply<SpeakRequestOutcome>,
    },

    Approve {
        request_id: SpeakRequestId,
        target_id: UserId,
        approver_id: UserId,
        respond_to: Reply<Approval>,
    },

    Deny {
        request_id: SpeakRequestId,
        approver_id: UserId,
        respond_to: Reply<SpeakRequest>,
    },

    PostMessage {
        user_id: UserId,
        content: String,
        respond_to: Reply<ChatMessage>,
    },

    GetState {
        respond_to: oneshot::Sender<NetActorState>,
    },
}

impl NetMessage {
    /// Answer the sender with `err` without running the command.
    pub fn reject(self, err: impl FnOnce() -> NetError, state: NetActorState) {
        match self {
            NetMessage::Join { respond_to, .. } => {
                let _ = respond_to.send(Err(err()));
            }
            NetMessage::Leave { respond_to, .. } => {
                let _ = respond_to.send(Err(err()));
            }
            NetMessage::End { respond_to, .. } => {
                let _ = respond_to.send(Err(err()));
            }
            NetMessage::InviteCohost { respond_to, .. }
            | NetMessage::Demote { respond_to, .. }
            | NetMessage::ToggleMute { respond_to, .. } => {
                let _ = respond_to.send(Err(err()));
            }
            NetMessage::RequestSpeak { respond_to, .. } => {
                let _ = respond_to.send(Err(err()));
            }
            NetMessage::Approve { respond_to, .. } => {
                let _ = respond_to.send(Err(err()));
            }
            NetMessage::Deny { respond_to, .. } => {
                let _ = respond_to.send(Err(err()));
            }
            NetMessage::PostMessage { respond_to, .. } => {
                let _ = respond_to.send(Err(err()));
            }
            NetMessage::GetState { respond_to } => {
                let _ = respond_to.send(state);
            }
        }
    }
}

/// Controller status (for health checks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    pub net_actor_count: usize,
    pub connection_count: usize,
    pub mailbox_depth: usize,
}

/// Net actor status (for debugging and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetActorState {
    pub net_id: NetId,
    pub commands_processed: u64,
    pub ended: bool,
}
