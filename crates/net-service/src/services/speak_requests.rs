//! Speak-request arbitration.
//!
//! A request moves `pending -> approved` or `pending -> denied` exactly
//! once. Approval resolves the request and promotes the requester in the
//! same transaction.

use crate::errors::NetError;
use crate::models::{has_speaking_privilege, Participant, RequestStatus, Role, SpeakRequest};
use crate::repositories::{NetsRepository, ParticipantsRepository, SpeakRequestsRepository};
use crate::services::authorization;
use crate::services::roles::require_active;
use chrono::Utc;
use common::types::{NetId, SpeakRequestId, UserId};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, instrument};

/// Outcome of `request_speak`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakRequestOutcome {
    pub request: SpeakRequest,
    /// False when an existing pending request was returned.
    pub created: bool,
}

/// Outcome of a successful approval.
#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub request: SpeakRequest,
    pub participant: Participant,
}

pub struct SpeakRequestArbiter;

impl SpeakRequestArbiter {
    /// Ask to speak. At most one pending request exists per (net, user).
    #[instrument(skip_all, name = "net.speak.request", fields(net_id = %net_id, user_id = %user_id))]
    pub async fn request_speak(
        pool: &SqlitePool,
        net_id: NetId,
        user_id: UserId,
    ) -> Result<SpeakRequestOutcome, NetError> {
        let mut tx = pool.begin().await?;
        let net = NetsRepository::require(&mut tx, net_id).await?;
        authorization::ensure_live(&net)?;

        let participant = require_active(&mut tx, net_id, user_id).await?;
        if has_speaking_privilege(participant.role) {
            return Err(NetError::InvalidState(
                "Participant already has a speaking role".to_string(),
            ));
        }

        if let Some(existing) =
            SpeakRequestsRepository::find_pending(&mut tx, net_id, user_id).await?
        {
            return Ok(SpeakRequestOutcome {
                request: existing,
                created: false,
            });
        }

        let created =
            SpeakRequestsRepository::insert_pending(&mut tx, net_id, user_id, Utc::now()).await?;

        // The partial unique index turns a lost race into "use the existing row".
        let request = SpeakRequestsRepository::find_pending(&mut tx, net_id, user_id)
            .await?
            .ok_or_else(|| NetError::Internal("pending request missing after insert".to_string()))?;
        tx.commit().await?;

        Ok(SpeakRequestOutcome {
            created: created.is_some(),
            request,
        })
    }

    /// Approve a pending request and promote the requester to unmuted speaker.
    #[instrument(skip_all, name = "net.speak.approve", fields(net_id = %net_id, request_id = %request_id))]
    pub async fn approve(
        pool: &SqlitePool,
        net_id: NetId,
        request_id: SpeakRequestId,
        target_id: UserId,
        approver_id: UserId,
        max_speakers: u32,
    ) -> Result<Approval, NetError> {
        let mut tx = pool.begin().await?;
        let net = NetsRepository::require(&mut tx, net_id).await?;
        authorization::ensure_live(&net)?;

        let approver = ParticipantsRepository::find_active(&mut tx, net_id, approver_id).await?;
        authorization::ensure_moderator(approver.as_ref())?;

        let request = require_pending(&mut tx, net_id, request_id).await?;
        if request.user_id != target_id {
            return Err(NetError::Validation(
                "Target user does not match the speak request".to_string(),
            ));
        }

        let target = require_active(&mut tx, net_id, target_id).await?;
        if !has_speaking_privilege(target.role) {
            let speaking = ParticipantsRepository::count_speaking(&mut tx, net_id).await?;
            authorization::ensure_speaker_capacity(speaking, max_speakers)?;
        }

        let now = Utc::now();
        resolve(&mut tx, request_id, RequestStatus::Approved, approver_id, now).await?;
        if !has_speaking_privilege(target.role) {
            ParticipantsRepository::update_role(&mut tx, net_id, target_id, Role::Speaker, false)
                .await?;
        } else {
            debug!(target: "net.speak", net_id = %net_id, user_id = %target_id, "Requester already speaking");
        }

        let participant = require_active(&mut tx, net_id, target_id).await?;
        let request = require_request(&mut tx, request_id).await?;
        tx.commit().await?;

        Ok(Approval {
            request,
            participant,
        })
    }

    /// Deny a pending request. The requester's role is untouched.
    #[instrument(skip_all, name = "net.speak.deny", fields(net_id = %net_id, request_id = %request_id))]
    pub async fn deny(
        pool: &SqlitePool,
        net_id: NetId,
        request_id: SpeakRequestId,
        approver_id: UserId,
    ) -> Result<SpeakRequest, NetError> {
        let mut tx = pool.begin().await?;
        let net = NetsRepository::require(&mut tx, net_id).await?;
        authorization::ensure_live(&net)?;

        let approver = ParticipantsRepository::find_active(&mut tx, net_id, approver_id).await?;
        authorization::ensure_moderator(approver.as_ref())?;

        require_pending(&mut tx, net_id, request_id).await?;
        resolve(&mut tx, request_id, RequestStatus::Denied, approver_id, Utc::now()).await?;

        let request = require_request(&mut tx, request_id).await?;
        tx.commit().await?;

        Ok(request)
    }

    /// Pending requests, oldest first.
    pub async fn list_pending(
        pool: &SqlitePool,
        net_id: NetId,
    ) -> Result<Vec<SpeakRequest>, NetError> {
        let mut conn = pool.acquire().await?;
        NetsRepository::require(&mut conn, net_id).await?;
        SpeakRequestsRepository::list_pending(&mut conn, net_id).await
    }
}

async fn require_request(
    conn: &mut SqliteConnection,
    request_id: SpeakRequestId,
) -> Result<SpeakRequest, NetError> {
    SpeakRequestsRepository::find(conn, request_id)
        .await?
        .ok_or_else(|| NetError::NotFound("Speak request not found".to_string()))
}

/// The request must belong to `net_id` and still be pending.
async fn require_pending(
    conn: &mut SqliteConnection,
    net_id: NetId,
    request_id: SpeakRequestId,
) -> Result<SpeakRequest, NetError> {
    let request = require_request(conn, request_id).await?;
    if request.net_id != net_id {
        return Err(NetError::NotFound("Speak request not found".to_string()));
    }
    if request.status != RequestStatus::Pending {
        return Err(NetError::InvalidState(
            "Speak request has already been resolved".to_string(),
        ));
    }
    Ok(request)
}

async fn resolve(
    conn: &mut SqliteConnection,
    request_id: SpeakRequestId,
    status: RequestStatus,
    resolved_by: UserId,
    resolved_at: chrono::DateTime<Utc>,
) -> Result<(), NetError> {
    if SpeakRequestsRepository::resolve(conn, request_id, status, resolved_by, resolved_at).await? {
        Ok(())
    } else {
        Err(NetError::InvalidState(
            "Speak request has already been resolved".to_string(),
        ))
    }
}
