//! Nets repository.

use crate::errors::NetError;
use crate::models::{Net, NetStatus, NetSummary};
use chrono::{DateTime, Utc};
use common::types::{NetId, UserId};
use sqlx::SqliteConnection;
use tracing::instrument;

const NET_COLUMNS: &str = "n.id, n.name, n.description, n.host_id, n.status, n.started_at, n.ended_at";

pub struct NetsRepository;

impl NetsRepository {
    #[instrument(skip_all, name = "net.repo.insert_net")]
    pub async fn insert(
        conn: &mut SqliteConnection,
        host_id: UserId,
        name: &str,
        description: Option<&str>,
        started_at: DateTime<Utc>,
    ) -> Result<Net, NetError> {
        let net = sqlx::query_as::<_, Net>(
            r#"
            INSERT INTO nets (name, description, host_id, status, started_at)
            VALUES (?, ?, ?, 'live', ?)
            RETURNING id, name, description, host_id, status, started_at, ended_at
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(host_id.0)
        .bind(started_at)
        .fetch_one(conn)
        .await?;

        Ok(net)
    }

    pub async fn find(conn: &mut SqliteConnection, net_id: NetId) -> Result<Option<Net>, NetError> {
        let net = sqlx::query_as::<_, Net>(&format!("SELECT {NET_COLUMNS} FROM nets n WHERE n.id = ?"))
            .bind(net_id.0)
            .fetch_optional(conn)
            .await?;

        Ok(net)
    }

    /// Find a net or fail with `NotFound`.
    pub async fn require(conn: &mut SqliteConnection, net_id: NetId) -> Result<Net, NetError> {
        Self::find(conn, net_id)
            .await?
            .ok_or_else(|| NetError::NotFound("Net not found".to_string()))
    }

    pub async fn mark_ended(
        conn: &mut SqliteConnection,
        net_id: NetId,
        ended_at: DateTime<Utc>,
    ) -> Result<Net, NetError> {
        let net = sqlx::query_as::<_, Net>(
            r#"
            UPDATE nets SET status = 'ended', ended_at = ?
            WHERE id = ?
            RETURNING id, name, description, host_id, status, started_at, ended_at
            "#,
        )
        .bind(ended_at)
        .bind(net_id.0)
        .fetch_one(conn)
        .await?;

        Ok(net)
    }

    /// Nets with the given status, newest first, with host name and live counts.
    #[instrument(skip_all, name = "net.repo.list_nets", fields(status = status.as_str()))]
    pub async fn list_by_status(
        conn: &mut SqliteConnection,
        status: NetStatus,
    ) -> Result<Vec<NetSummary>, NetError> {
        let rows = sqlx::query_as::<_, NetSummary>(&format!(
            r#"
            SELECT {NET_COLUMNS},
                   u.username AS host_username,
                   (SELECT COUNT(*) FROM net_participants p
                     WHERE p.net_id = n.id AND p.left_at IS NULL) AS participant_count,
                   (SELECT COUNT(*) FROM net_participants p
                     WHERE p.net_id = n.id AND p.left_at IS NULL
                       AND p.role IN ('host', 'co-host', 'speaker')) AS speaker_count
            FROM nets n
            JOIN users u ON u.id = n.host_id
            WHERE n.status = ?
            ORDER BY n.started_at DESC, n.id DESC
            "#
        ))
        .bind(status)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }
}
