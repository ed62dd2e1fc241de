//! Real-time event catalogue and the wire envelope.
//!
//! Outbound frames are `{"eventType": ..., "payload": ..., "netId": "..."}`,
//! with `netId` omitted for global broadcasts. Outbound `netId` is always a
//! string. Inbound control frames are
//! `{"type": "subscribe", "netId": ...}` and `{"type": "unsubscribe"}`.

use crate::models::{ChatMessage, Net, Participant, Role, SpeakRequest};
use common::types::{NetId, SpeakRequestId, UserId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// State-change notification. Serializes as its payload alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NetEvent {
    Created(Net),
    Ended(NetEnded),
    ParticipantJoined(Participant),
    ParticipantLeft(ParticipantLeft),
    RoleChanged(RoleChanged),
    MuteChanged(MuteChanged),
    RequestCreated(SpeakRequest),
    RequestDenied(RequestDenied),
    MessagePosted(ChatMessage),
}

impl NetEvent {
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            NetEvent::Created(_) => "net:created",
            NetEvent::Ended(_) => "net:ended",
            NetEvent::ParticipantJoined(_) => "net:participant:join",
            NetEvent::ParticipantLeft(_) => "net:participant:leave",
            NetEvent::RoleChanged(_) => "net:participant:role",
            NetEvent::MuteChanged(_) => "net:participant:mute",
            NetEvent::RequestCreated(_) => "net:request:new",
            NetEvent::RequestDenied(_) => "net:request:denied",
            NetEvent::MessagePosted(_) => "net:message",
        }
    }

    #[must_use]
    pub fn role_changed(participant: &Participant) -> Self {
        NetEvent::RoleChanged(RoleChanged {
            user_id: participant.user_id,
            role: participant.role,
            is_muted: participant.is_muted,
        })
    }

    #[must_use]
    pub fn mute_changed(participant: &Participant) -> Self {
        NetEvent::MuteChanged(MuteChanged {
            user_id: participant.user_id,
            is_muted: participant.is_muted,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetEnded {
    #[serde(serialize_with = "net_id_as_string")]
    pub net_id: NetId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantLeft {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChanged {
    pub user_id: UserId,
    pub role: Role,
    pub is_muted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteChanged {
    pub user_id: UserId,
    pub is_muted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDenied {
    pub request_id: SpeakRequestId,
    pub user_id: UserId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    event_type: &'static str,
    payload: &'a NetEvent,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "optional_net_id_as_string"
    )]
    net_id: Option<NetId>,
}

fn net_id_as_string<S: Serializer>(net_id: &NetId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(net_id)
}

fn optional_net_id_as_string<S: Serializer>(
    net_id: &Option<NetId>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match net_id {
        Some(net_id) => serializer.collect_str(net_id),
        None => serializer.serialize_none(),
    }
}

/// Serialize an event into its outbound frame.
pub fn encode(event: &NetEvent, net_id: Option<NetId>) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        event_type: event.event_type(),
        payload: event,
        net_id,
    })
}

/// Control frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Subscribe {
        #[serde(rename = "netId", deserialize_with = "net_id_from_number_or_string")]
        net_id: NetId,
    },
    Unsubscribe,
}

/// Browsers often send route parameters as strings.
fn net_id_from_number_or_string<'de, D>(deserializer: D) -> Result<NetId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(id) => Ok(NetId(id)),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map(NetId)
            .map_err(serde::de::Error::custom),
    }
}
