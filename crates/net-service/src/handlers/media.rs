//! Media credential handlers.
//!
//! - `GET /api/media/config` - whether audio is available and where
//! - `POST /api/nets/{id}/token` - mint a credential for an active participant
//! - `POST /api/nets/{id}/refresh-token` - re-mint after a role change

use crate::errors::NetError;
use crate::models::ActorRequest;
use crate::routes::AppState;
use crate::services::media_credentials::{MediaConfig, MediaCredential};
use axum::{
    extract::{Path, State},
    Json,
};
use common::types::NetId;
use std::sync::Arc;
use tracing::instrument;

pub async fn media_config(State(state): State<Arc<AppState>>) -> Json<MediaConfig> {
    Json(state.media.config())
}

/// Handler for POST /api/nets/{id}/token
///
/// # Response
///
/// - 200 OK: `{token, url, room, identity, canPublish}`
/// - 404 Not Found: caller is not an active participant
/// - 503 Service Unavailable: media transport not configured
#[instrument(skip_all, name = "net.handlers.media_token", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn mint_token(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<MediaCredential>, NetError> {
    Ok(Json(
        state.media.mint(&state.pool, net_id, body.user_id).await?,
    ))
}

#[instrument(skip_all, name = "net.handlers.media_refresh", fields(net_id = %net_id, user_id = %body.user_id))]
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Path(net_id): Path<NetId>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<MediaCredential>, NetError> {
    Ok(Json(
        state.media.refresh(&state.pool, net_id, body.user_id).await?,
    ))
}
