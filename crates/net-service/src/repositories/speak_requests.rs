//! Speak requests repository.

use crate::errors::NetError;
use crate::models::{RequestStatus, SpeakRequest};
use chrono::{DateTime, Utc};
use common::types::{NetId, SpeakRequestId, UserId};
use sqlx::SqliteConnection;

const REQUEST_SELECT: &str = r#"
    SELECT r.id, r.net_id, r.user_id, u.username, r.status,
           r.requested_at, r.resolved_at, r.resolved_by
    FROM speak_requests r
    JOIN users u ON u.id = r.user_id
"#;

pub struct SpeakRequestsRepository;

impl SpeakRequestsRepository {
    pub async fn find(
        conn: &mut SqliteConnection,
        request_id: SpeakRequestId,
    ) -> Result<Option<SpeakRequest>, NetError> {
        let row = sqlx::query_as::<_, SpeakRequest>(&format!("{REQUEST_SELECT} WHERE r.id = ?"))
            .bind(request_id.0)
            .fetch_optional(conn)
            .await?;

        Ok(row)
    }

    pub async fn find_pending(
        conn: &mut SqliteConnection,
        net_id: NetId,
        user_id: UserId,
    ) -> Result<Option<SpeakRequest>, NetError> {
        let row = sqlx::query_as::<_, SpeakRequest>(&format!(
            "{REQUEST_SELECT} WHERE r.net_id = ? AND r.user_id = ? AND r.status = 'pending'"
        ))
        .bind(net_id.0)
        .bind(user_id.0)
        .fetch_optional(conn)
        .await?;

        Ok(row)
    }

    /// Insert a pending request.
    ///
    /// Returns `None` when a pending request for the pair already exists
    /// (the partial unique index rejects the row).
    pub async fn insert_pending(
        conn: &mut SqliteConnection,
        net_id: NetId,
        user_id: UserId,
        requested_at: DateTime<Utc>,
    ) -> Result<Option<SpeakRequestId>, NetError> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO speak_requests (net_id, user_id, status, requested_at)
            VALUES (?, ?, 'pending', ?)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(net_id.0)
        .bind(user_id.0)
        .bind(requested_at)
        .fetch_optional(conn)
        .await?;

        Ok(id.map(SpeakRequestId))
    }

    /// Resolve a pending request. Returns false if it was no longer pending.
    pub async fn resolve(
        conn: &mut SqliteConnection,
        request_id: SpeakRequestId,
        status: RequestStatus,
        resolved_by: UserId,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, NetError> {
        let result = sqlx::query(
            r#"
            UPDATE speak_requests SET status = ?, resolved_at = ?, resolved_by = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status)
        .bind(resolved_at)
        .bind(resolved_by.0)
        .bind(request_id.0)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Pending requests for a net, oldest first.
    pub async fn list_pending(
        conn: &mut SqliteConnection,
        net_id: NetId,
    ) -> Result<Vec<SpeakRequest>, NetError> {
        let rows = sqlx::query_as::<_, SpeakRequest>(&format!(
            "{REQUEST_SELECT} WHERE r.net_id = ? AND r.status = 'pending' ORDER BY r.requested_at, r.id"
        ))
        .bind(net_id.0)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }
}
