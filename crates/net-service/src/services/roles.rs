//! Role transitions that do not involve a speak request.

use crate::errors::NetError;
use crate::models::{Participant, Role};
use crate::repositories::{NetsRepository, ParticipantsRepository};
use crate::services::authorization;
use common::types::{NetId, UserId};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

pub struct RoleService;

impl RoleService {
    /// Promote an active participant to co-host, unmuted. Fixed host only.
    #[instrument(skip_all, name = "net.roles.invite_cohost", fields(net_id = %net_id, target = %target_id))]
    pub async fn invite_cohost(
        pool: &SqlitePool,
        net_id: NetId,
        target_id: UserId,
        actor_id: UserId,
    ) -> Result<Participant, NetError> {
        let mut tx = pool.begin().await?;
        let net = NetsRepository::require(&mut tx, net_id).await?;
        authorization::ensure_live(&net)?;
        authorization::ensure_fixed_host(&net, actor_id)?;

        if target_id == net.host_id {
            return Err(NetError::Validation(
                "The host cannot be invited as a co-host".to_string(),
            ));
        }
        require_active(&mut tx, net_id, target_id).await?;

        ParticipantsRepository::update_role(&mut tx, net_id, target_id, Role::CoHost, false)
            .await?;
        let updated = require_active(&mut tx, net_id, target_id).await?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Return a co-host or speaker to the audience, muted.
    #[instrument(skip_all, name = "net.roles.demote", fields(net_id = %net_id, target = %target_id))]
    pub async fn demote(
        pool: &SqlitePool,
        net_id: NetId,
        target_id: UserId,
        actor_id: UserId,
    ) -> Result<Participant, NetError> {
        let mut tx = pool.begin().await?;
        let net = NetsRepository::require(&mut tx, net_id).await?;
        authorization::ensure_live(&net)?;

        let actor = ParticipantsRepository::find_active(&mut tx, net_id, actor_id).await?;
        authorization::ensure_moderator(actor.as_ref())?;

        let target = require_active(&mut tx, net_id, target_id).await?;
        authorization::ensure_can_demote(&net, actor_id, &target)?;

        ParticipantsRepository::update_role(&mut tx, net_id, target_id, Role::Listener, true)
            .await?;
        let updated = require_active(&mut tx, net_id, target_id).await?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Flip the caller's own mute flag.
    #[instrument(skip_all, name = "net.roles.toggle_mute", fields(net_id = %net_id, user_id = %user_id))]
    pub async fn toggle_mute(
        pool: &SqlitePool,
        net_id: NetId,
        user_id: UserId,
    ) -> Result<Participant, NetError> {
        let mut tx = pool.begin().await?;
        let net = NetsRepository::require(&mut tx, net_id).await?;
        authorization::ensure_live(&net)?;

        let current = ParticipantsRepository::find_active(&mut tx, net_id, user_id).await?;
        let participant = authorization::ensure_can_toggle_mute(current.as_ref())?;

        ParticipantsRepository::set_muted(&mut tx, net_id, user_id, !participant.is_muted).await?;
        let updated = require_active(&mut tx, net_id, user_id).await?;
        tx.commit().await?;

        Ok(updated)
    }
}

/// Active participant or `NotFound`.
pub(crate) async fn require_active(
    conn: &mut SqliteConnection,
    net_id: NetId,
    user_id: UserId,
) -> Result<Participant, NetError> {
    ParticipantsRepository::find_active(conn, net_id, user_id)
        .await?
        .ok_or_else(|| NetError::NotFound("Participant is not in this net".to_string()))
}
