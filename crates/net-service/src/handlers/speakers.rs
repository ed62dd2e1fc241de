//! Role and speak-request handlers.
//!
//! - `POST /api/nets/{id}/invite-cohost` - fixed host promotes a member to co-host
//! - `POST /api/nets/{id}/request-speak` - listener asks for the floor
//! - `GET /api/nets/{id}/speak-requests` - pending requests, oldest first
//! - `POST /api/nets/{id}/approve-speaker` - moderator approves a request
//! - `POST /api/nets/{id}/deny-speaker` - moderator denies a request
//! - `POST /api/nets/{id}/demote-speaker` - moderator returns a speaker to the audience
//! - `POST /api/nets/{id}/toggle-mute` - participant flips their own mute

use crate::errors::NetError;
use crate::models::{
    ActorRequest, ApprovalResponse, ApproveSpeakerRequest, DenySpeakerRequest, Participant,
    SpeakRequest, SpeakRequestResponse, TargetRequest,
};
use crate::routes::AppState;
use crate::services::SpeakRequestArbiter;
use axum::{
    extract::{Path, State},
    Json,
};
use common::types::NetId;
use std::sync::Arc;
use tracing::{info, instrument};

#[instrument(skip_all, name = "net.handlers.invite_cohost", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn invite_cohost(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<TargetRequest>,
) -> Result<Json<Participant>, NetError> {
    let actor = state.controller.net(net_id).await?;
    let participant = actor
        .invite_cohost(body.target_user_id, body.user_id)
        .await?;

    info!(
        target: "net.handlers",
        net_id = %net_id,
        target_user_id = %body.target_user_id,
        "Co-host invited"
    );
    Ok(Json(participant))
}

/// Handler for POST /api/nets/{id}/request-speak
///
/// Idempotent while a request is pending: the existing request comes back
/// with `created: false`.
#[instrument(skip_all, name = "net.handlers.request_speak", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn request_speak(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<SpeakRequestResponse>, NetError> {
    let actor = state.controller.net(net_id).await?;
    let outcome = actor.request_speak(body.user_id).await?;
    Ok(Json(SpeakRequestResponse {
        request: outcome.request,
        created: outcome.created,
    }))
}

#[instrument(skip_all, name = "net.handlers.list_speak_requests", fields(net_id = %net_id))]
pub async fn list_speak_requests(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
) -> Result<Json<Vec<SpeakRequest>>, NetError> {
    Ok(Json(
        SpeakRequestArbiter::list_pending(&state.pool, net_id).await?,
    ))
}

/// Handler for POST /api/nets/{id}/approve-speaker
///
/// # Response
///
/// - 200 OK: resolved request and the promoted participant
/// - 403 Forbidden: approver is not host or co-host
/// - 409 Conflict: request already resolved, or the speaker cap is reached
#[instrument(skip_all, name = "net.handlers.approve_speaker", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn approve_speaker(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<ApproveSpeakerRequest>,
) -> Result<Json<ApprovalResponse>, NetError> {
    let actor = state.controller.net(net_id).await?;
    let approval = actor
        .approve(body.request_id, body.target_user_id, body.user_id)
        .await?;

    info!(
        target: "net.handlers",
        net_id = %net_id,
        request_id = %body.request_id,
        "Speak request approved"
    );
    Ok(Json(ApprovalResponse {
        request: approval.request,
        participant: approval.participant,
    }))
}

#[instrument(skip_all, name = "net.handlers.deny_speaker", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn deny_speaker(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<DenySpeakerRequest>,
) -> Result<Json<SpeakRequest>, NetError> {
    let actor = state.controller.net(net_id).await?;
    Ok(Json(actor.deny(body.request_id, body.user_id).await?))
}

#[instrument(skip_all, name = "net.handlers.demote_speaker", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn demote_speaker(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<TargetRequest>,
) -> Result<Json<Participant>, NetError> {
    let actor = state.controller.net(net_id).await?;
    Ok(Json(actor.demote(body.target_user_id, body.user_id).await?))
}

#[instrument(skip_all, name = "net.handlers.toggle_mute", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn toggle_mute(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<Participant>, NetError> {
    let actor = state.controller.net(net_id).await?;
    Ok(Json(actor.toggle_mute(body.user_id).await?))
}
