//! Speak-request arbitration integration tests.
//!
//! Covers the pending/approved/denied state machine, the speaker cap, and
//! concurrent commands on the same net.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use common::types::{NetId, UserId};
use net_service::actors::{NetActorHandle, NetContext, NetControllerHandle};
use net_service::errors::NetError;
use net_service::fanout::FanOutBus;
use net_service::models::{RequestStatus, Role};
use net_service::services::authorization::CAPACITY_MESSAGE;
use net_service::services::{SessionRegistry, SpeakRequestArbiter};
use net_test_utils::{seed_user, seed_users};
use sqlx::SqlitePool;

struct Fixture {
    host: UserId,
    net_id: NetId,
    actor: NetActorHandle,
    controller: NetControllerHandle,
}

async fn live_net(pool: &SqlitePool) -> Result<Fixture> {
    let host = seed_user(pool, "host").await?;
    let controller = NetControllerHandle::new(NetContext {
        pool: pool.clone(),
        bus: FanOutBus::new(),
        max_speakers: 10,
    });
    let net = controller.create_net(host, "Net".to_string(), None).await?;
    let actor = controller.net(net.id).await?;
    Ok(Fixture {
        host,
        net_id: net.id,
        actor,
        controller,
    })
}

/// Fill the net so that `speaking` participants hold a speaking role.
async fn fill_speakers(pool: &SqlitePool, fx: &Fixture, speaking: usize) -> Result<()> {
    let extra = seed_users(pool, "speaker", speaking.saturating_sub(1)).await?;
    for user in extra {
        fx.actor.join(user).await?;
        let outcome = fx.actor.request_speak(user).await?;
        fx.actor
            .approve(outcome.request.id, user, fx.host)
            .await?;
    }
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_request_speak_is_idempotent(pool: SqlitePool) -> Result<()> {
    let fx = live_net(&pool).await?;
    let listener = seed_user(&pool, "listener").await?;
    fx.actor.join(listener).await?;

    let first = fx.actor.request_speak(listener).await?;
    assert!(first.created);
    assert_eq!(first.request.status, RequestStatus::Pending);

    let second = fx.actor.request_speak(listener).await?;
    assert!(!second.created);
    assert_eq!(second.request.id, first.request.id);

    let pending = SpeakRequestArbiter::list_pending(&pool, fx.net_id).await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].username, "listener");
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_request_speak_requires_listener(pool: SqlitePool) -> Result<()> {
    let fx = live_net(&pool).await?;

    let err = fx.actor.request_speak(fx.host).await.unwrap_err();
    assert!(matches!(err, NetError::InvalidState(_)));

    let outsider = seed_user(&pool, "outsider").await?;
    let err = fx.actor.request_speak(outsider).await.unwrap_err();
    assert!(matches!(err, NetError::NotFound(_)));
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_requests_produce_one_pending(pool: SqlitePool) -> Result<()> {
    let fx = live_net(&pool).await?;
    let listener = seed_user(&pool, "listener").await?;
    fx.actor.join(listener).await?;

    let (a, b) = tokio::join!(
        fx.actor.request_speak(listener),
        fx.actor.request_speak(listener)
    );
    let (a, b) = (a?, b?);

    assert_eq!(a.request.id, b.request.id);
    assert_eq!(u8::from(a.created) + u8::from(b.created), 1);

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM speak_requests WHERE net_id = ? AND user_id = ? AND status = 'pending'",
    )
    .bind(fx.net_id.0)
    .bind(listener.0)
    .fetch_one(&pool)
    .await?;
    assert_eq!(pending, 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_approve_promotes_unmuted_speaker(pool: SqlitePool) -> Result<()> {
    let fx = live_net(&pool).await?;
    let listener = seed_user(&pool, "listener").await?;
    fx.actor.join(listener).await?;
    let request = fx.actor.request_speak(listener).await?.request;

    let approval = fx.actor.approve(request.id, listener, fx.host).await?;
    assert_eq!(approval.request.status, RequestStatus::Approved);
    assert_eq!(approval.request.resolved_by, Some(fx.host));
    assert!(approval.request.resolved_at.is_some());
    assert_eq!(approval.participant.role, Role::Speaker);
    assert!(!approval.participant.is_muted);

    assert!(SpeakRequestArbiter::list_pending(&pool, fx.net_id)
        .await?
        .is_empty());
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_resolved_requests_are_immutable(pool: SqlitePool) -> Result<()> {
    let fx = live_net(&pool).await?;
    let listener = seed_user(&pool, "listener").await?;
    fx.actor.join(listener).await?;
    let request = fx.actor.request_speak(listener).await?.request;

    let denied = fx.actor.deny(request.id, fx.host).await?;
    assert_eq!(denied.status, RequestStatus::Denied);
    assert_eq!(denied.resolved_by, Some(fx.host));
    assert!(denied.resolved_at.is_some());

    let err = fx
        .actor
        .approve(request.id, listener, fx.host)
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::InvalidState(_)));

    let err = fx.actor.deny(request.id, fx.host).await.unwrap_err();
    assert!(matches!(err, NetError::InvalidState(_)));

    let detail = SessionRegistry::get_net(&pool, fx.net_id).await?;
    let row = detail
        .participants
        .iter()
        .find(|p| p.user_id == listener)
        .unwrap();
    assert_eq!(row.role, Role::Listener);

    // A fresh request is allowed after the old one resolved.
    assert!(fx.actor.request_speak(listener).await?.created);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_only_moderators_resolve_requests(pool: SqlitePool) -> Result<()> {
    let fx = live_net(&pool).await?;
    let listener = seed_user(&pool, "listener").await?;
    let bystander = seed_user(&pool, "bystander").await?;
    fx.actor.join(listener).await?;
    fx.actor.join(bystander).await?;
    let request = fx.actor.request_speak(listener).await?.request;

    let err = fx
        .actor
        .approve(request.id, listener, bystander)
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::Forbidden(_)));

    let err = fx.actor.deny(request.id, bystander).await.unwrap_err();
    assert!(matches!(err, NetError::Forbidden(_)));

    let err = fx
        .actor
        .approve(request.id, bystander, fx.host)
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::Validation(_)));

    let still = SpeakRequestArbiter::list_pending(&pool, fx.net_id).await?;
    assert_eq!(still.len(), 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_speaker_cap_rejects_eleventh(pool: SqlitePool) -> Result<()> {
    let fx = live_net(&pool).await?;
    fill_speakers(&pool, &fx, 10).await?;

    let detail = SessionRegistry::get_net(&pool, fx.net_id).await?;
    assert_eq!(detail.speaker_count, 10);

    let listener = seed_user(&pool, "eleventh").await?;
    fx.actor.join(listener).await?;
    let request = fx.actor.request_speak(listener).await?.request;

    let err = fx
        .actor
        .approve(request.id, listener, fx.host)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, NetError::Capacity(message) if message == CAPACITY_MESSAGE),
        "expected capacity error, got {err:?}"
    );

    let pending = SpeakRequestArbiter::list_pending(&pool, fx.net_id).await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, request.id);

    let detail = SessionRegistry::get_net(&pool, fx.net_id).await?;
    let row = detail
        .participants
        .iter()
        .find(|p| p.user_id == listener)
        .unwrap();
    assert_eq!(row.role, Role::Listener);
    assert!(row.is_muted);

    // Demoting someone frees a slot.
    let speaker = detail
        .participants
        .iter()
        .find(|p| p.role == Role::Speaker)
        .unwrap()
        .user_id;
    fx.actor.demote(speaker, fx.host).await?;
    let approval = fx.actor.approve(request.id, listener, fx.host).await?;
    assert_eq!(approval.participant.role, Role::Speaker);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_approvals_respect_cap(pool: SqlitePool) -> Result<()> {
    let fx = live_net(&pool).await?;
    fill_speakers(&pool, &fx, 9).await?;

    let [a, b]: [UserId; 2] = seed_users(&pool, "contender", 2).await?.try_into().unwrap();
    fx.actor.join(a).await?;
    fx.actor.join(b).await?;
    let req_a = fx.actor.request_speak(a).await?.request;
    let req_b = fx.actor.request_speak(b).await?.request;

    let (ra, rb) = tokio::join!(
        fx.actor.approve(req_a.id, a, fx.host),
        fx.actor.approve(req_b.id, b, fx.host)
    );

    let outcomes = [ra.is_ok(), rb.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    for result in [ra, rb] {
        if let Err(err) = result {
            assert!(matches!(err, NetError::Capacity(_)));
        }
    }

    let detail = SessionRegistry::get_net(&pool, fx.net_id).await?;
    assert_eq!(detail.speaker_count, 10);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_requests_are_scoped_to_their_net(pool: SqlitePool) -> Result<()> {
    let fx = live_net(&pool).await?;
    let listener = seed_user(&pool, "listener").await?;
    fx.actor.join(listener).await?;
    let request = fx.actor.request_speak(listener).await?.request;

    let other_net = fx
        .controller
        .create_net(fx.host, "Other".to_string(), None)
        .await?;
    let other = fx.controller.net(other_net.id).await?;

    let err = other
        .approve(request.id, listener, fx.host)
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::NotFound(_)));
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_scenario_from_creation_to_end(pool: SqlitePool) -> Result<()> {
    let fx = live_net(&pool).await?;
    let listener = seed_user(&pool, "listener").await?;
    let cohost = seed_user(&pool, "cohost").await?;

    let joined = fx.actor.join(listener).await?;
    assert_eq!(joined.participant.role, Role::Listener);
    assert!(joined.participant.is_muted);

    let request = fx.actor.request_speak(listener).await?.request;
    assert_eq!(
        SpeakRequestArbiter::list_pending(&pool, fx.net_id)
            .await?
            .len(),
        1
    );

    fx.actor.join(cohost).await?;
    let err = fx
        .actor
        .invite_cohost(listener, cohost)
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::Forbidden(_)));

    let promoted = fx.actor.invite_cohost(cohost, fx.host).await?;
    assert_eq!(promoted.role, Role::CoHost);
    assert!(!promoted.is_muted);

    let approval = fx.actor.approve(request.id, listener, cohost).await?;
    assert_eq!(approval.request.status, RequestStatus::Approved);
    assert_eq!(approval.participant.role, Role::Speaker);
    assert!(!approval.participant.is_muted);

    let detail = SessionRegistry::get_net(&pool, fx.net_id).await?;
    assert_eq!(detail.speaker_count, 3);
    assert_eq!(detail.listener_count, 0);

    fx.actor.end(fx.host).await?;
    let left: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM net_participants WHERE net_id = ? AND left_at IS NOT NULL",
    )
    .bind(fx.net_id.0)
    .fetch_one(&pool)
    .await?;
    assert_eq!(left, 3);

    let late = seed_user(&pool, "late").await?;
    let err = match fx.controller.net(fx.net_id).await {
        Ok(actor) => actor.join(late).await.unwrap_err(),
        Err(err) => err,
    };
    assert!(matches!(err, NetError::InvalidState(_)));
    Ok(())
}
