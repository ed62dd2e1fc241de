//! Net lifecycle and chat handlers.
//!
//! - `GET /api/nets?status=` - list nets
//! - `POST /api/nets` - create a net
//! - `GET /api/nets/{id}` - net detail with participants and pending requests
//! - `POST /api/nets/{id}/join`, `/leave`, `/end`
//! - `GET|POST /api/nets/{id}/messages`
//!
//! Mutations are forwarded to the net's actor; reads query the store directly.

use crate::errors::NetError;
use crate::models::{
    ActorRequest, ChatMessage, CreateNetRequest, JoinOutcome, LeaveResponse, ListMessagesQuery,
    ListNetsQuery, Net, NetDetail, NetStatus, NetSummary, PostMessageRequest,
};
use crate::routes::AppState;
use crate::services::{ChatService, SessionRegistry};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use common::types::NetId;
use std::sync::Arc;
use tracing::{info, instrument};

#[instrument(skip_all, name = "net.handlers.list_nets")]
pub async fn list_nets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListNetsQuery>,
) -> Result<Json<Vec<NetSummary>>, NetError> {
    let status = query.status.unwrap_or(NetStatus::Live);
    Ok(Json(SessionRegistry::list_nets(&state.pool, status).await?))
}

/// Handler for POST /api/nets
///
/// The requesting user becomes the host and is seated unmuted.
///
/// # Response
///
/// - 201 Created: the new net
/// - 400 Bad Request: empty name
/// - 404 Not Found: unknown user
#[instrument(skip_all, name = "net.handlers.create_net", fields(user_id = %body.user_id))]
pub async fn create_net(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateNetRequest>,
) -> Result<(StatusCode, Json<Net>), NetError> {
    let net = state
        .controller
        .create_net(body.user_id, body.name, body.description)
        .await?;

    info!(target: "net.handlers", net_id = %net.id, "Net created");
    Ok((StatusCode::CREATED, Json(net)))
}

#[instrument(skip_all, name = "net.handlers.get_net", fields(net_id = %net_id))]
pub async fn get_net(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
) -> Result<Json<NetDetail>, NetError> {
    Ok(Json(SessionRegistry::get_net(&state.pool, net_id).await?))
}

/// Handler for POST /api/nets/{id}/join
///
/// Idempotent. The net's original host reclaims the host role;
/// `hostReclaimed` reports when that happened.
#[instrument(skip_all, name = "net.handlers.join", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn join_net(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<JoinOutcome>, NetError> {
    let actor = state.controller.net(net_id).await?;
    Ok(Json(actor.join(body.user_id).await?))
}

#[instrument(skip_all, name = "net.handlers.leave", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn leave_net(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<LeaveResponse>, NetError> {
    let actor = state.controller.net(net_id).await?;
    let left = actor.leave(body.user_id).await?;
    Ok(Json(LeaveResponse { left }))
}

/// Handler for POST /api/nets/{id}/end
///
/// Host or co-host only. Terminal: every participant is marked as left.
#[instrument(skip_all, name = "net.handlers.end", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn end_net(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<Net>, NetError> {
    let actor = state.controller.net(net_id).await?;
    let net = actor.end(body.user_id).await?;

    info!(target: "net.handlers", net_id = %net_id, ended_by = %body.user_id, "Net ended");
    Ok(Json(net))
}

#[instrument(skip_all, name = "net.handlers.list_messages", fields(net_id = %net_id))]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<ChatMessage>>, NetError> {
    Ok(Json(
        ChatService::list_messages(&state.pool, net_id, query.limit).await?,
    ))
}

#[instrument(skip_all, name = "net.handlers.post_message", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), NetError> {
    let actor = state.controller.net(net_id).await?;
    let message = actor.post_message(body.user_id, body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
