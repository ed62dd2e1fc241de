//! Net chat messages repository.

use crate::errors::NetError;
use crate::models::ChatMessage;
use chrono::{DateTime, Utc};
use common::types::{NetId, UserId};
use sqlx::SqliteConnection;

const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.net_id, m.user_id, u.username, m.content, m.created_at
    FROM net_messages m
    JOIN users u ON u.id = m.user_id
"#;

pub struct MessagesRepository;

impl MessagesRepository {
    pub async fn insert(
        conn: &mut SqliteConnection,
        net_id: NetId,
        user_id: UserId,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ChatMessage, NetError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO net_messages (net_id, user_id, content, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(net_id.0)
        .bind(user_id.0)
        .bind(content)
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await?;

        let message = sqlx::query_as::<_, ChatMessage>(&format!("{MESSAGE_SELECT} WHERE m.id = ?"))
            .bind(id)
            .fetch_one(conn)
            .await?;

        Ok(message)
    }

    /// The most recent `limit` messages, returned oldest first.
    pub async fn list_recent(
        conn: &mut SqliteConnection,
        net_id: NetId,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, NetError> {
        let rows = sqlx::query_as::<_, ChatMessage>(&format!(
            r#"
            SELECT * FROM (
                {MESSAGE_SELECT}
                WHERE m.net_id = ?
                ORDER BY m.created_at DESC, m.id DESC
                LIMIT ?
            ) ORDER BY created_at, id
            "#
        ))
        .bind(net_id.0)
        .bind(i64::from(limit))
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }
}
