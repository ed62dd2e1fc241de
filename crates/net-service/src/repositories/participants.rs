//! Net participants repository.
//!
//! There is one row per (net, user). Leaving sets `left_at`; rejoining
//! reactivates the same row.

use crate::errors::NetError;
use crate::models::{Participant, Role};
use chrono::{DateTime, Utc};
use common::types::{NetId, UserId};
use sqlx::SqliteConnection;

const PARTICIPANT_SELECT: &str = r#"
    SELECT p.net_id, p.user_id, u.username, p.role, p.is_muted, p.joined_at, p.left_at
    FROM net_participants p
    JOIN users u ON u.id = p.user_id
"#;

pub struct ParticipantsRepository;

impl ParticipantsRepository {
    /// The (net, user) row whether active or not.
    pub async fn find(
        conn: &mut SqliteConnection,
        net_id: NetId,
        user_id: UserId,
    ) -> Result<Option<Participant>, NetError> {
        let row = sqlx::query_as::<_, Participant>(&format!(
            "{PARTICIPANT_SELECT} WHERE p.net_id = ? AND p.user_id = ?"
        ))
        .bind(net_id.0)
        .bind(user_id.0)
        .fetch_optional(conn)
        .await?;

        Ok(row)
    }

    /// The active row, if any.
    pub async fn find_active(
        conn: &mut SqliteConnection,
        net_id: NetId,
        user_id: UserId,
    ) -> Result<Option<Participant>, NetError> {
        Ok(Self::find(conn, net_id, user_id)
            .await?
            .filter(Participant::is_active))
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        net_id: NetId,
        user_id: UserId,
        role: Role,
        is_muted: bool,
        joined_at: DateTime<Utc>,
    ) -> Result<(), NetError> {
        sqlx::query(
            r#"
            INSERT INTO net_participants (net_id, user_id, role, is_muted, joined_at, left_at)
            VALUES (?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(net_id.0)
        .bind(user_id.0)
        .bind(role)
        .bind(is_muted)
        .bind(joined_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Clear `left_at` on a historical row and assign a fresh role.
    pub async fn reactivate(
        conn: &mut SqliteConnection,
        net_id: NetId,
        user_id: UserId,
        role: Role,
        is_muted: bool,
        joined_at: DateTime<Utc>,
    ) -> Result<(), NetError> {
        sqlx::query(
            r#"
            UPDATE net_participants
            SET role = ?, is_muted = ?, joined_at = ?, left_at = NULL
            WHERE net_id = ? AND user_id = ?
            "#,
        )
        .bind(role)
        .bind(is_muted)
        .bind(joined_at)
        .bind(net_id.0)
        .bind(user_id.0)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Returns the number of rows marked left (0 if already left).
    pub async fn mark_left(
        conn: &mut SqliteConnection,
        net_id: NetId,
        user_id: UserId,
        left_at: DateTime<Utc>,
    ) -> Result<u64, NetError> {
        let result = sqlx::query(
            r#"
            UPDATE net_participants SET left_at = ?
            WHERE net_id = ? AND user_id = ? AND left_at IS NULL
            "#,
        )
        .bind(left_at)
        .bind(net_id.0)
        .bind(user_id.0)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn mark_all_left(
        conn: &mut SqliteConnection,
        net_id: NetId,
        left_at: DateTime<Utc>,
    ) -> Result<u64, NetError> {
        let result = sqlx::query(
            "UPDATE net_participants SET left_at = ? WHERE net_id = ? AND left_at IS NULL",
        )
        .bind(left_at)
        .bind(net_id.0)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn update_role(
        conn: &mut SqliteConnection,
        net_id: NetId,
        user_id: UserId,
        role: Role,
        is_muted: bool,
    ) -> Result<(), NetError> {
        sqlx::query(
            r#"
            UPDATE net_participants SET role = ?, is_muted = ?
            WHERE net_id = ? AND user_id = ? AND left_at IS NULL
            "#,
        )
        .bind(role)
        .bind(is_muted)
        .bind(net_id.0)
        .bind(user_id.0)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn set_muted(
        conn: &mut SqliteConnection,
        net_id: NetId,
        user_id: UserId,
        is_muted: bool,
    ) -> Result<(), NetError> {
        sqlx::query(
            r#"
            UPDATE net_participants SET is_muted = ?
            WHERE net_id = ? AND user_id = ? AND left_at IS NULL
            "#,
        )
        .bind(is_muted)
        .bind(net_id.0)
        .bind(user_id.0)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Active participants ordered host, co-host, speaker, listener, then join time.
    pub async fn list_active(
        conn: &mut SqliteConnection,
        net_id: NetId,
    ) -> Result<Vec<Participant>, NetError> {
        let rows = sqlx::query_as::<_, Participant>(&format!(
            r#"{PARTICIPANT_SELECT}
            WHERE p.net_id = ? AND p.left_at IS NULL
            ORDER BY CASE p.role
                WHEN 'host' THEN 0
                WHEN 'co-host' THEN 1
                WHEN 'speaker' THEN 2
                ELSE 3
            END, p.joined_at, p.user_id
            "#
        ))
        .bind(net_id.0)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }

    /// Active participants holding host, co-host, or speaker.
    pub async fn count_speaking(
        conn: &mut SqliteConnection,
        net_id: NetId,
    ) -> Result<i64, NetError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM net_participants
            WHERE net_id = ? AND left_at IS NULL AND role IN ('host', 'co-host', 'speaker')
            "#,
        )
        .bind(net_id.0)
        .fetch_one(conn)
        .await?;

        Ok(count)
    }
}
