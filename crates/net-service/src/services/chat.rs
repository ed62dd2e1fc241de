//! Text chat inside a net.

use crate::errors::NetError;
use crate::models::ChatMessage;
use crate::repositories::{MessagesRepository, NetsRepository, ParticipantsRepository};
use crate::services::authorization;
use chrono::Utc;
use common::types::{NetId, UserId};
use sqlx::SqlitePool;

pub const MAX_MESSAGE_LENGTH: usize = 2000;
pub const DEFAULT_MESSAGE_LIMIT: u32 = 100;
pub const MAX_MESSAGE_LIMIT: u32 = 500;

pub struct ChatService;

impl ChatService {
    /// Post a message. Only active participants of a live net may post.
    pub async fn post_message(
        pool: &SqlitePool,
        net_id: NetId,
        user_id: UserId,
        content: &str,
    ) -> Result<ChatMessage, NetError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(NetError::Validation("Message content is required".to_string()));
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(NetError::Validation(format!(
                "Message must be at most {MAX_MESSAGE_LENGTH} characters"
            )));
        }

        let mut tx = pool.begin().await?;
        let net = NetsRepository::require(&mut tx, net_id).await?;
        authorization::ensure_live(&net)?;

        if ParticipantsRepository::find_active(&mut tx, net_id, user_id)
            .await?
            .is_none()
        {
            return Err(NetError::Forbidden(
                "Must be in the net to post messages".to_string(),
            ));
        }

        let message =
            MessagesRepository::insert(&mut tx, net_id, user_id, content, Utc::now()).await?;
        tx.commit().await?;

        Ok(message)
    }

    /// Most recent messages, oldest first. `limit` is clamped to 1..=500.
    pub async fn list_messages(
        pool: &SqlitePool,
        net_id: NetId,
        limit: Option<u32>,
    ) -> Result<Vec<ChatMessage>, NetError> {
        let limit = clamp_limit(limit);
        let mut conn = pool.acquire().await?;
        NetsRepository::require(&mut conn, net_id).await?;
        MessagesRepository::list_recent(&mut conn, net_id, limit).await
    }
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_MESSAGE_LIMIT)
        .clamp(1, MAX_MESSAGE_LIMIT)
}
