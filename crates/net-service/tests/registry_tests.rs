//! Session registry and role integration tests.
//!
//! Commands go through the controller and net actors against a migrated
//! SQLite database, the same path the HTTP handlers use.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use common::types::{NetId, UserId};
use net_service::actors::{NetContext, NetControllerHandle};
use net_service::errors::NetError;
use net_service::fanout::FanOutBus;
use net_service::models::{NetStatus, Role};
use net_service::services::SessionRegistry;
use net_test_utils::seed_user;
use sqlx::SqlitePool;

fn controller(pool: &SqlitePool) -> NetControllerHandle {
    NetControllerHandle::new(NetContext {
        pool: pool.clone(),
        bus: FanOutBus::new(),
        max_speakers: 10,
    })
}

async fn active_rows(pool: &SqlitePool, net_id: NetId, user_id: UserId) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM net_participants WHERE net_id = ? AND user_id = ? AND left_at IS NULL",
    )
    .bind(net_id.0)
    .bind(user_id.0)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_net_seats_host_unmuted(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let controller = controller(&pool);

    let net = controller
        .create_net(host, "Morning net".to_string(), Some("Check-ins".to_string()))
        .await?;
    assert_eq!(net.status, NetStatus::Live);
    assert_eq!(net.description.as_deref(), Some("Check-ins"));

    let detail = SessionRegistry::get_net(&pool, net.id).await?;
    assert_eq!(detail.participants.len(), 1);
    let seated = &detail.participants[0];
    assert_eq!(seated.user_id, host);
    assert_eq!(seated.role, Role::Host);
    assert!(!seated.is_muted);
    assert_eq!(detail.speaker_count, 1);
    assert_eq!(detail.listener_count, 0);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_net_requires_name_and_known_host(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let controller = controller(&pool);

    let err = controller
        .create_net(host, String::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::Validation(_)));

    let err = controller
        .create_net(UserId(9999), "Ghost".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::NotFound(_)));

    let nets = SessionRegistry::list_nets(&pool, NetStatus::Live).await?;
    assert!(nets.is_empty());
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_join_is_idempotent(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let listener = seed_user(&pool, "listener").await?;
    let controller = controller(&pool);
    let net = controller.create_net(host, "Net".to_string(), None).await?;
    let actor = controller.net(net.id).await?;

    let first = actor.join(listener).await?;
    assert!(!first.already_present);
    assert!(!first.host_reclaimed);
    assert_eq!(first.participant.role, Role::Listener);
    assert!(first.participant.is_muted);

    let second = actor.join(listener).await?;
    assert!(second.already_present);
    assert_eq!(second.participant, first.participant);
    assert_eq!(active_rows(&pool, net.id, listener).await, 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_rejoin_reactivates_row(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let listener = seed_user(&pool, "listener").await?;
    let controller = controller(&pool);
    let net = controller.create_net(host, "Net".to_string(), None).await?;
    let actor = controller.net(net.id).await?;

    let joined = actor.join(listener).await?;
    assert!(actor.leave(listener).await?);
    assert!(!actor.leave(listener).await?);
    assert_eq!(active_rows(&pool, net.id, listener).await, 0);

    let rejoined = actor.join(listener).await?;
    assert!(!rejoined.already_present);
    assert!(rejoined.participant.left_at.is_none());
    assert!(rejoined.participant.joined_at >= joined.participant.joined_at);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM net_participants WHERE net_id = ? AND user_id = ?",
    )
    .bind(net.id.0)
    .bind(listener.0)
    .fetch_one(&pool)
    .await?;
    assert_eq!(total, 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_host_reclaims_after_leaving(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let cohost = seed_user(&pool, "cohost").await?;
    let controller = controller(&pool);
    let net = controller.create_net(host, "Net".to_string(), None).await?;
    let actor = controller.net(net.id).await?;

    actor.join(cohost).await?;
    actor.invite_cohost(cohost, host).await?;
    actor.toggle_mute(host).await?;
    assert!(actor.leave(host).await?);

    let back = actor.join(host).await?;
    assert!(back.host_reclaimed);
    assert_eq!(back.participant.role, Role::Host);
    assert!(!back.participant.is_muted);

    let detail = SessionRegistry::get_net(&pool, net.id).await?;
    let hosts = detail
        .participants
        .iter()
        .filter(|p| p.role == Role::Host)
        .count();
    assert_eq!(hosts, 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_end_is_terminal(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let listener = seed_user(&pool, "listener").await?;
    let controller = controller(&pool);
    let net = controller.create_net(host, "Net".to_string(), None).await?;
    let actor = controller.net(net.id).await?;
    actor.join(listener).await?;

    let err = actor.end(listener).await.unwrap_err();
    assert!(matches!(err, NetError::Forbidden(_)));

    let ended = actor.end(host).await?;
    assert_eq!(ended.status, NetStatus::Ended);
    assert!(ended.ended_at.is_some());

    let detail = SessionRegistry::get_net(&pool, net.id).await?;
    assert!(detail.participants.is_empty());

    let err = controller.net(net.id).await.unwrap_err();
    assert!(matches!(err, NetError::InvalidState(_)));

    let live = SessionRegistry::list_nets(&pool, NetStatus::Live).await?;
    assert!(live.is_empty());
    let ended_nets = SessionRegistry::list_nets(&pool, NetStatus::Ended).await?;
    assert_eq!(ended_nets.len(), 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_cohost_can_end(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let cohost = seed_user(&pool, "cohost").await?;
    let controller = controller(&pool);
    let net = controller.create_net(host, "Net".to_string(), None).await?;
    let actor = controller.net(net.id).await?;

    actor.join(cohost).await?;
    actor.invite_cohost(cohost, host).await?;
    assert_eq!(actor.end(cohost).await?.status, NetStatus::Ended);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_only_fixed_host_invites_cohosts(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let cohost = seed_user(&pool, "cohost").await?;
    let other = seed_user(&pool, "other").await?;
    let controller = controller(&pool);
    let net = controller.create_net(host, "Net".to_string(), None).await?;
    let actor = controller.net(net.id).await?;
    actor.join(cohost).await?;
    actor.join(other).await?;

    let promoted = actor.invite_cohost(cohost, host).await?;
    assert_eq!(promoted.role, Role::CoHost);
    assert!(!promoted.is_muted);

    let err = actor.invite_cohost(other, cohost).await.unwrap_err();
    assert!(matches!(err, NetError::Forbidden(_)));

    let err = actor.invite_cohost(host, host).await.unwrap_err();
    assert!(matches!(err, NetError::Validation(_)));

    let outsider = seed_user(&pool, "outsider").await?;
    let err = actor.invite_cohost(outsider, host).await.unwrap_err();
    assert!(matches!(err, NetError::NotFound(_)));
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_toggle_mute_rules(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let listener = seed_user(&pool, "listener").await?;
    let controller = controller(&pool);
    let net = controller.create_net(host, "Net".to_string(), None).await?;
    let actor = controller.net(net.id).await?;
    actor.join(listener).await?;

    assert!(actor.toggle_mute(host).await?.is_muted);
    assert!(!actor.toggle_mute(host).await?.is_muted);

    let err = actor.toggle_mute(listener).await.unwrap_err();
    assert!(matches!(err, NetError::Forbidden(_)));

    let stranger = seed_user(&pool, "stranger").await?;
    let err = actor.toggle_mute(stranger).await.unwrap_err();
    assert!(matches!(err, NetError::NotFound(_)));
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_demote_rules(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let cohost = seed_user(&pool, "cohost").await?;
    let second = seed_user(&pool, "second").await?;
    let listener = seed_user(&pool, "listener").await?;
    let controller = controller(&pool);
    let net = controller.create_net(host, "Net".to_string(), None).await?;
    let actor = controller.net(net.id).await?;
    for user in [cohost, second, listener] {
        actor.join(user).await?;
    }
    actor.invite_cohost(cohost, host).await?;
    actor.invite_cohost(second, host).await?;

    let err = actor.demote(host, cohost).await.unwrap_err();
    assert!(matches!(err, NetError::Forbidden(_)));

    let err = actor.demote(second, cohost).await.unwrap_err();
    assert!(matches!(err, NetError::Forbidden(_)));

    let err = actor.demote(cohost, listener).await.unwrap_err();
    assert!(matches!(err, NetError::Forbidden(_)));

    let err = actor.demote(listener, host).await.unwrap_err();
    assert!(matches!(err, NetError::InvalidState(_)));

    let demoted = actor.demote(second, host).await?;
    assert_eq!(demoted.role, Role::Listener);
    assert!(demoted.is_muted);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_chat_messages(pool: SqlitePool) -> Result<()> {
    let host = seed_user(&pool, "host").await?;
    let listener = seed_user(&pool, "listener").await?;
    let controller = controller(&pool);
    let net = controller.create_net(host, "Net".to_string(), None).await?;
    let actor = controller.net(net.id).await?;

    let err = actor
        .post_message(listener, "hello".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::Forbidden(_)));

    actor.join(listener).await?;
    let err = actor
        .post_message(listener, "   ".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::Validation(_)));

    let err = actor
        .post_message(listener, "x".repeat(2001))
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::Validation(_)));

    for n in 0..5 {
        actor.post_message(listener, format!("message {n}")).await?;
    }

    let recent =
        net_service::services::ChatService::list_messages(&pool, net.id, Some(3)).await?;
    let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["message 2", "message 3", "message 4"]);
    assert_eq!(recent[0].username, "listener");
    Ok(())
}
