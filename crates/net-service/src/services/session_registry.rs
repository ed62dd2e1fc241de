//! Session registry: nets and their participants.
//!
//! Each mutating function runs in its own transaction. Callers that need
//! per-net ordering go through the net actor, which invokes these one at a
//! time.

use crate::errors::NetError;
use crate::models::{
    has_speaking_privilege, JoinOutcome, Net, NetDetail, NetStatus, NetSummary, Participant, Role,
};
use crate::repositories::{
    NetsRepository, ParticipantsRepository, SpeakRequestsRepository, UsersRepository,
};
use crate::services::authorization;
use chrono::Utc;
use common::types::{NetId, UserId};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

/// Maximum length of a net name.
pub const MAX_NET_NAME_LENGTH: usize = 100;

/// What a join finds for the (net, user) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinState {
    /// No row has ever existed.
    Absent,
    /// The net's fixed host is already present.
    ActiveHost(Participant),
    /// Someone else is already present.
    ActiveOther(Participant),
    /// A historical row from an earlier visit.
    Inactive(Participant),
}

impl JoinState {
    #[must_use]
    pub fn classify(net: &Net, user_id: UserId, existing: Option<Participant>) -> Self {
        match existing {
            None => JoinState::Absent,
            Some(p) if !p.is_active() => JoinState::Inactive(p),
            Some(p) if net.host_id == user_id => JoinState::ActiveHost(p),
            Some(p) => JoinState::ActiveOther(p),
        }
    }
}

/// Role and mute state assigned on (re)entry. The fixed host reclaims
/// `host` unmuted; everyone else starts as a muted listener.
#[must_use]
pub fn entry_role(net: &Net, user_id: UserId) -> (Role, bool) {
    if net.host_id == user_id {
        (Role::Host, false)
    } else {
        (Role::Listener, true)
    }
}

pub struct SessionRegistry;

impl SessionRegistry {
    /// Create a live net with the creator seated as unmuted host.
    #[instrument(skip_all, name = "net.registry.create", fields(host_id = %host_id))]
    pub async fn create_net(
        pool: &SqlitePool,
        host_id: UserId,
        name: &str,
        description: Option<&str>,
    ) -> Result<Net, NetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NetError::Validation("Net name is required".to_string()));
        }
        if name.chars().count() > MAX_NET_NAME_LENGTH {
            return Err(NetError::Validation(format!(
                "Net name must be at most {MAX_NET_NAME_LENGTH} characters"
            )));
        }
        let description = description.map(str::trim).filter(|d| !d.is_empty());

        let mut tx = pool.begin().await?;
        UsersRepository::require(&mut tx, host_id).await?;

        let now = Utc::now();
        let net = NetsRepository::insert(&mut tx, host_id, name, description, now).await?;
        ParticipantsRepository::insert(&mut tx, net.id, host_id, Role::Host, false, now).await?;
        tx.commit().await?;

        Ok(net)
    }

    /// Net with active participants, pending requests, and live counts.
    pub async fn get_net(pool: &SqlitePool, net_id: NetId) -> Result<NetDetail, NetError> {
        let mut conn = pool.acquire().await?;
        let net = NetsRepository::require(&mut conn, net_id).await?;
        let participants = ParticipantsRepository::list_active(&mut conn, net_id).await?;
        let pending_requests = SpeakRequestsRepository::list_pending(&mut conn, net_id).await?;

        let speaker_count = participants
            .iter()
            .filter(|p| has_speaking_privilege(p.role))
            .count();
        let listener_count = participants.len() - speaker_count;

        Ok(NetDetail {
            net,
            participants,
            pending_requests,
            speaker_count,
            listener_count,
        })
    }

    pub async fn find_net(pool: &SqlitePool, net_id: NetId) -> Result<Option<Net>, NetError> {
        let mut conn = pool.acquire().await?;
        NetsRepository::find(&mut conn, net_id).await
    }

    pub async fn list_nets(
        pool: &SqlitePool,
        status: NetStatus,
    ) -> Result<Vec<NetSummary>, NetError> {
        let mut conn = pool.acquire().await?;
        NetsRepository::list_by_status(&mut conn, status).await
    }

    /// Join a net. Idempotent while the user is present.
    #[instrument(skip_all, name = "net.registry.join", fields(net_id = %net_id, user_id = %user_id))]
    pub async fn join(
        pool: &SqlitePool,
        net_id: NetId,
        user_id: UserId,
    ) -> Result<JoinOutcome, NetError> {
        let mut tx = pool.begin().await?;
        let net = NetsRepository::require(&mut tx, net_id).await?;
        authorization::ensure_live(&net)?;
        UsersRepository::require(&mut tx, user_id).await?;

        let existing = ParticipantsRepository::find(&mut tx, net_id, user_id).await?;
        let (role, is_muted) = entry_role(&net, user_id);
        let now = Utc::now();

        match JoinState::classify(&net, user_id, existing) {
            JoinState::ActiveHost(participant) | JoinState::ActiveOther(participant) => {
                debug!(target: "net.registry", net_id = %net_id, user_id = %user_id, "Already in net");
                return Ok(JoinOutcome {
                    participant,
                    host_reclaimed: false,
                    already_present: true,
                });
            }
            JoinState::Absent => {
                ParticipantsRepository::insert(&mut tx, net_id, user_id, role, is_muted, now)
                    .await?;
            }
            JoinState::Inactive(_) => {
                ParticipantsRepository::reactivate(&mut tx, net_id, user_id, role, is_muted, now)
                    .await?;
            }
        }

        let participant = ParticipantsRepository::find(&mut tx, net_id, user_id)
            .await?
            .ok_or_else(|| NetError::Internal("participant row missing after join".to_string()))?;
        tx.commit().await?;

        Ok(JoinOutcome {
            host_reclaimed: role == Role::Host,
            participant,
            already_present: false,
        })
    }

    /// Leave a net. Returns false if the user was not present.
    #[instrument(skip_all, name = "net.registry.leave", fields(net_id = %net_id, user_id = %user_id))]
    pub async fn leave(pool: &SqlitePool, net_id: NetId, user_id: UserId) -> Result<bool, NetError> {
        let mut tx = pool.begin().await?;
        let net = NetsRepository::require(&mut tx, net_id).await?;
        authorization::ensure_live(&net)?;

        let left = ParticipantsRepository::mark_left(&mut tx, net_id, user_id, Utc::now()).await?;
        tx.commit().await?;

        Ok(left > 0)
    }

    /// End a net and mark every active participant as left.
    #[instrument(skip_all, name = "net.registry.end", fields(net_id = %net_id, user_id = %acting_user))]
    pub async fn end(pool: &SqlitePool, net_id: NetId, acting_user: UserId) -> Result<Net, NetError> {
        let mut tx = pool.begin().await?;
        let net = NetsRepository::require(&mut tx, net_id).await?;
        authorization::ensure_live(&net)?;

        let actor = ParticipantsRepository::find_active(&mut tx, net_id, acting_user).await?;
        authorization::ensure_can_end(&net, acting_user, actor.as_ref())?;

        let now = Utc::now();
        let ended = NetsRepository::mark_ended(&mut tx, net_id, now).await?;
        let removed = ParticipantsRepository::mark_all_left(&mut tx, net_id, now).await?;
        tx.commit().await?;

        debug!(target: "net.registry", net_id = %net_id, participants_removed = removed, "Net ended");
        Ok(ended)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn net(host: i64) -> Net {
        Net {
            id: NetId(9),
            name: "Morning check-in".to_string(),
            description: None,
            host_id: UserId(host),
            status: NetStatus::Live,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    fn row(user: i64, role: Role, active: bool) -> Participant {
        Participant {
            net_id: NetId(9),
            user_id: UserId(user),
            username: format!("user{user}"),
            role,
            is_muted: true,
            joined_at: Utc::now(),
            left_at: (!active).then(Utc::now),
        }
    }

    #[test]
    fn test_classify_absent() {
        assert_eq!(JoinState::classify(&net(1), UserId(2), None), JoinState::Absent);
    }

    #[test]
    fn test_classify_active_host_and_other() {
        let host = row(1, Role::Host, true);
        assert!(matches!(
            JoinState::classify(&net(1), UserId(1), Some(host)),
            JoinState::ActiveHost(_)
        ));

        let listener = row(2, Role::Listener, true);
        assert!(matches!(
            JoinState::classify(&net(1), UserId(2), Some(listener)),
            JoinState::ActiveOther(_)
        ));
    }

    #[test]
    fn test_classify_inactive_wins_over_host() {
        let left_host = row(1, Role::Host, false);
        assert!(matches!(
            JoinState::classify(&net(1), UserId(1), Some(left_host)),
            JoinState::Inactive(_)
        ));
    }

    #[test]
    fn test_entry_role() {
        assert_eq!(entry_role(&net(1), UserId(1)), (Role::Host, false));
        assert_eq!(entry_role(&net(1), UserId(2)), (Role::Listener, true));
    }
}
