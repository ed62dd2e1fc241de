//! Media credential adapter.
//!
//! Turns a participant's current role into a scoped access grant for the
//! external real-time media transport. Publish rights come from
//! [`has_speaking_privilege`]; every active participant may subscribe.
//!
//! The transport is optional. Without issuer credentials the adapter
//! reports `enabled: false` and both `mint` and `refresh` fail with
//! `Unavailable`.

use crate::config::MediaTransportConfig;
use crate::errors::NetError;
use crate::models::{has_speaking_privilege, Role};
use crate::observability::metrics;
use crate::repositories::{ParticipantsRepository, UsersRepository};
use common::secret::{ExposeSecret, SecretString};
use common::types::{NetId, UserId};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Room name on the media transport for a net.
#[must_use]
pub fn room_name(net_id: NetId) -> String {
    format!("net-{net_id}")
}

/// Everything the issuer needs to mint one credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialGrant {
    pub identity: String,
    pub display_name: String,
    pub metadata: GrantMetadata,
    pub room: String,
    pub can_publish: bool,
    pub can_subscribe: bool,
    pub can_publish_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantMetadata {
    pub role: Role,
    pub net_id: NetId,
}

/// Token and connection URL returned by an issuer.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    pub token: String,
    pub url: String,
}

/// Credential handed back to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaCredential {
    pub token: String,
    pub url: String,
    pub room: String,
    pub identity: String,
    pub can_publish: bool,
}

/// Whether audio is available, and where to connect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConfig {
    pub enabled: bool,
    pub url: Option<String>,
}

/// Issues access tokens for the media transport.
#[async_trait::async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Transport connection URL given to clients.
    fn url(&self) -> &str;

    async fn issue(&self, grant: &CredentialGrant) -> Result<IssuedToken, NetError>;
}

/// Video grant section of a LiveKit access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
    pub can_publish_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub sub: String,
    pub name: String,
    /// JSON-encoded [`GrantMetadata`].
    pub metadata: String,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
}

/// Signs HS256 access tokens with the transport's API key and secret.
pub struct LiveKitIssuer {
    api_key: String,
    api_secret: SecretString,
    url: String,
    ttl_seconds: i64,
}

impl LiveKitIssuer {
    #[must_use]
    pub fn new(config: &MediaTransportConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            url: config.url.clone(),
            ttl_seconds: i64::try_from(config.token_ttl_seconds).unwrap_or(i64::MAX),
        }
    }

    fn claims(&self, grant: &CredentialGrant, now: i64) -> Result<AccessTokenClaims, NetError> {
        let metadata = serde_json::to_string(&grant.metadata)
            .map_err(|e| NetError::Internal(format!("metadata encoding failed: {e}")))?;

        Ok(AccessTokenClaims {
            iss: self.api_key.clone(),
            sub: grant.identity.clone(),
            name: grant.display_name.clone(),
            metadata,
            nbf: now,
            exp: now.saturating_add(self.ttl_seconds),
            video: VideoGrant {
                room: grant.room.clone(),
                room_join: true,
                can_publish: grant.can_publish,
                can_subscribe: grant.can_subscribe,
                can_publish_data: grant.can_publish_data,
            },
        })
    }
}

#[async_trait::async_trait]
impl CredentialIssuer for LiveKitIssuer {
    fn url(&self) -> &str {
        &self.url
    }

    #[instrument(skip_all, name = "net.media.sign")]
    async fn issue(&self, grant: &CredentialGrant) -> Result<IssuedToken, NetError> {
        let claims = self.claims(grant, chrono::Utc::now().timestamp())?;
        let key = EncodingKey::from_secret(self.api_secret.expose_secret().as_bytes());

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());

        let token = encode(&header, &claims, &key)
            .map_err(|e| NetError::Internal(format!("access token signing failed: {e}")))?;

        Ok(IssuedToken {
            token,
            url: self.url.clone(),
        })
    }
}

/// Role-to-grant adapter in front of an optional issuer.
#[derive(Clone, Default)]
pub struct MediaCredentialAdapter {
    issuer: Option<Arc<dyn CredentialIssuer>>,
}

impl MediaCredentialAdapter {
    #[must_use]
    pub fn new(issuer: Option<Arc<dyn CredentialIssuer>>) -> Self {
        Self { issuer }
    }

    /// Adapter with the LiveKit issuer when the transport is configured.
    #[must_use]
    pub fn from_config(config: Option<&MediaTransportConfig>) -> Self {
        Self::new(config.map(|c| Arc::new(LiveKitIssuer::new(c)) as Arc<dyn CredentialIssuer>))
    }

    #[must_use]
    pub fn config(&self) -> MediaConfig {
        MediaConfig {
            enabled: self.issuer.is_some(),
            url: self.issuer.as_ref().map(|i| i.url().to_string()),
        }
    }

    /// Mint a credential reflecting the participant's current role.
    pub async fn mint(
        &self,
        pool: &SqlitePool,
        net_id: NetId,
        user_id: UserId,
    ) -> Result<MediaCredential, NetError> {
        self.issue_for(pool, net_id, user_id, "mint").await
    }

    /// Re-mint after a role change. Earlier tokens are not revoked.
    pub async fn refresh(
        &self,
        pool: &SqlitePool,
        net_id: NetId,
        user_id: UserId,
    ) -> Result<MediaCredential, NetError> {
        self.issue_for(pool, net_id, user_id, "refresh").await
    }

    #[instrument(skip_all, name = "net.media.issue", fields(net_id = %net_id, user_id = %user_id, op = op))]
    async fn issue_for(
        &self,
        pool: &SqlitePool,
        net_id: NetId,
        user_id: UserId,
        op: &'static str,
    ) -> Result<MediaCredential, NetError> {
        let Some(issuer) = self.issuer.as_ref() else {
            metrics::record_media_credential("unavailable");
            return Err(NetError::Unavailable(
                "Audio is not configured on this server".to_string(),
            ));
        };

        let mut conn = pool.acquire().await?;
        let participant = ParticipantsRepository::find_active(&mut conn, net_id, user_id)
            .await?
            .ok_or_else(|| {
                NetError::NotFound("Join the net before requesting audio access".to_string())
            })?;
        let user = UsersRepository::require(&mut conn, user_id).await?;
        drop(conn);

        let grant = build_grant(
            net_id,
            &user.username,
            user.display_name(),
            participant.role,
        );

        let issued = issuer.issue(&grant).await.map_err(|e| {
            warn!(target: "net.media", error = %e, "Credential issuer failed");
            metrics::record_media_credential("error");
            e
        })?;
        metrics::record_media_credential("success");

        debug!(
            target: "net.media",
            room = %grant.room,
            can_publish = grant.can_publish,
            "Media credential issued"
        );

        Ok(MediaCredential {
            token: issued.token,
            url: issued.url,
            room: grant.room,
            identity: grant.identity,
            can_publish: grant.can_publish,
        })
    }
}

/// Grant for a participant with `role`. Identity is the username.
#[must_use]
pub fn build_grant(net_id: NetId, username: &str, display_name: &str, role: Role) -> CredentialGrant {
    CredentialGrant {
        identity: username.to_string(),
        display_name: display_name.to_string(),
        metadata: GrantMetadata { role, net_id },
        room: room_name(net_id),
        can_publish: has_speaking_privilege(role),
        can_subscribe: true,
        can_publish_data: true,
    }
}

/// Mock issuer for tests.
pub mod mock {
    use super::*;
    use tokio::sync::Mutex;

    pub struct MockCredentialIssuer {
        url: String,
        fail: bool,
        grants: Mutex<Vec<CredentialGrant>>,
    }

    impl MockCredentialIssuer {
        /// Issues `mock-token-<n>` for every grant.
        pub fn accepting() -> Self {
            Self {
                url: "wss://media.test".to_string(),
                fail: false,
                grants: Mutex::new(Vec::new()),
            }
        }

        /// Fails every request.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::accepting()
            }
        }

        /// Grants received so far.
        pub async fn grants(&self) -> Vec<CredentialGrant> {
            self.grants.lock().await.clone()
        }
    }

    #[async_trait::async_trait]
    impl CredentialIssuer for MockCredentialIssuer {
        fn url(&self) -> &str {
            &self.url
        }

        async fn issue(&self, grant: &CredentialGrant) -> Result<IssuedToken, NetError> {
            if self.fail {
                return Err(NetError::Internal("mock issuer failure".to_string()));
            }
            let mut grants = self.grants.lock().await;
            grants.push(grant.clone());
            Ok(IssuedToken {
                token: format!("mock-token-{}", grants.len()),
                url: self.url.clone(),
            })
        }
    }
}
