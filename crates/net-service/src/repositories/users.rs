//! Read-only access to the member directory.

use crate::errors::NetError;
use common::types::UserId;
use sqlx::SqliteConnection;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRow {
    #[sqlx(try_from = "i64")]
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
}

impl UserRow {
    /// Display name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

pub struct UsersRepository;

impl UsersRepository {
    pub async fn find(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Option<UserRow>, NetError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, display_name FROM users WHERE id = ?",
        )
        .bind(user_id.0)
        .fetch_optional(conn)
        .await?;

        Ok(row)
    }

    /// Find a user or fail with `NotFound`.
    pub async fn require(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<UserRow, NetError> {
        Self::find(conn, user_id)
            .await?
            .ok_or_else(|| NetError::NotFound("User not found".to_string()))
    }
}
