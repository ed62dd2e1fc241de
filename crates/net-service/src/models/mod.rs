//! Data models for nets, participants, speak requests, and chat.
//!
//! Row types derive `sqlx::FromRow` and serialize to the camelCase JSON
//! shape returned by the HTTP API and carried in real-time events.

use chrono::{DateTime, Utc};
use common::types::{MessageId, NetId, SpeakRequestId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Participant role within a net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Host,
    #[serde(rename = "co-host")]
    #[sqlx(rename = "co-host")]
    CoHost,
    Speaker,
    Listener,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::CoHost => "co-host",
            Role::Speaker => "speaker",
            Role::Listener => "listener",
        }
    }

    /// Host or co-host.
    #[must_use]
    pub const fn is_moderator(&self) -> bool {
        matches!(self, Role::Host | Role::CoHost)
    }
}

/// True for roles that may publish audio: host, co-host, speaker.
///
/// Both the authorization checks and the media credential grants go
/// through this one predicate.
#[must_use]
pub const fn has_speaking_privilege(role: Role) -> bool {
    matches!(role, Role::Host | Role::CoHost | Role::Speaker)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NetStatus {
    Live,
    Ended,
}

impl NetStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            NetStatus::Live => "live",
            NetStatus::Ended => "ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

/// A net (live audio room).
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Net {
    #[sqlx(try_from = "i64")]
    pub id: NetId,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(try_from = "i64")]
    pub host_id: UserId,
    pub status: NetStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Net {
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status == NetStatus::Live
    }
}

/// A user's membership record in one net.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[sqlx(try_from = "i64")]
    pub net_id: NetId,
    #[sqlx(try_from = "i64")]
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub is_muted: bool,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl Participant {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakRequest {
    pub id: SpeakRequestId,
    pub net_id: NetId,
    pub user_id: UserId,
    pub username: String,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Moderator who approved or denied the request.
    pub resolved_by: Option<UserId>,
}

// Mapped by hand: `resolved_by` is a nullable user reference.
impl<'r> sqlx::FromRow<'r, SqliteRow> for SpeakRequest {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: SpeakRequestId(row.try_get("id")?),
            net_id: NetId(row.try_get("net_id")?),
            user_id: UserId(row.try_get("user_id")?),
            username: row.try_get("username")?,
            status: row.try_get("status")?,
            requested_at: row.try_get("requested_at")?,
            resolved_at: row.try_get("resolved_at")?,
            resolved_by: row.try_get::<Option<i64>, _>("resolved_by")?.map(UserId),
        })
    }
}

/// Row in the net listing.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NetSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub net: Net,
    pub host_username: String,
    pub participant_count: i64,
    pub speaker_count: i64,
}

/// Full view of one net.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetDetail {
    #[serde(flatten)]
    pub net: Net,
    /// Active participants, host first then co-hosts, speakers, listeners.
    pub participants: Vec<Participant>,
    pub pending_requests: Vec<SpeakRequest>,
    pub speaker_count: usize,
    pub listener_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[sqlx(try_from = "i64")]
    pub id: MessageId,
    #[sqlx(try_from = "i64")]
    pub net_id: NetId,
    #[sqlx(try_from = "i64")]
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a join command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    pub participant: Participant,
    /// The net's original host rejoined and regained the host role.
    pub host_reclaimed: bool,
    /// An active row already existed; nothing changed.
    pub already_present: bool,
}

/// Body of `POST /api/nets`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNetRequest {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body carrying only the acting user.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest {
    pub user_id: UserId,
}

/// Body of invite-cohost and demote-speaker.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRequest {
    pub user_id: UserId,
    pub target_user_id: UserId,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveSpeakerRequest {
    pub user_id: UserId,
    pub target_user_id: UserId,
    pub request_id: SpeakRequestId,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenySpeakerRequest {
    pub user_id: UserId,
    pub request_id: SpeakRequestId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub user_id: UserId,
    pub content: String,
}

/// Query of `GET /api/nets`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListNetsQuery {
    pub status: Option<NetStatus>,
}

/// Query of `GET /api/nets/:id/messages`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<u32>,
}

/// Response of leave.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    pub left: bool,
}

/// Response of request-speak.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakRequestResponse {
    pub request: SpeakRequest,
    pub created: bool,
}

/// Response of approve-speaker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub request: SpeakRequest,
    pub participant: Participant,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
