//! Member fixtures.
//!
//! The member directory is owned elsewhere; tests insert rows directly.

use common::types::UserId;
use sqlx::SqlitePool;

/// Insert a member and return their id.
pub async fn seed_user(pool: &SqlitePool, username: &str) -> Result<UserId, anyhow::Error> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, display_name) VALUES (?, ?) RETURNING id",
    )
    .bind(username)
    .bind(format!("{username} (display)"))
    .fetch_one(pool)
    .await?;
    Ok(UserId(id))
}

/// Insert `count` members named `{prefix}-{n}`.
pub async fn seed_users(
    pool: &SqlitePool,
    prefix: &str,
    count: usize,
) -> Result<Vec<UserId>, anyhow::Error> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        ids.push(seed_user(pool, &format!("{prefix}-{n}")).await?);
    }
    Ok(ids)
}
