//! Test server harness for end-to-end testing.
//!
//! Provides `TestNetServer` for spawning real net service instances in tests.

use net_service::config::Config;
use net_service::fanout::FanOutBus;
use net_service::routes::{self, AppState};
use net_service::services::{CredentialIssuer, MediaCredentialAdapter};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Test harness for spawning the net service in end-to-end tests.
///
/// # Example
/// ```rust,ignore
/// #[sqlx::test(migrations = "../../migrations")]
/// async fn test_health(pool: SqlitePool) -> Result<()> {
///     let server = TestNetServer::spawn(pool).await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestNetServer {
    addr: SocketAddr,
    pool: SqlitePool,
    state: Arc<AppState>,
    _handle: JoinHandle<()>,
}

impl TestNetServer {
    /// Spawn a server with no media transport configured.
    pub async fn spawn(pool: SqlitePool) -> Result<Self, anyhow::Error> {
        Self::spawn_with(pool, MediaCredentialAdapter::new(None), HashMap::new()).await
    }

    /// Spawn a server whose credentials come from `issuer`.
    pub async fn spawn_with_media(
        pool: SqlitePool,
        issuer: Arc<dyn CredentialIssuer>,
    ) -> Result<Self, anyhow::Error> {
        Self::spawn_with(pool, MediaCredentialAdapter::new(Some(issuer)), HashMap::new()).await
    }

    /// Spawn a server with extra environment overrides (e.g. `NET_MAX_SPEAKERS`).
    pub async fn spawn_with(
        pool: SqlitePool,
        media: MediaCredentialAdapter,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::new(pool.clone(), config, media));
        state.health.set_live();
        state.health.set_ready();

        let app = routes::build_routes(Arc::clone(&state), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            pool,
            state,
            _handle: handle,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of the real-time endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn bus(&self) -> &FanOutBus {
        &self.state.bus
    }

    /// Wait until `count` connections are registered with the bus.
    pub async fn wait_for_connections(&self, count: usize) -> Result<(), anyhow::Error> {
        for _ in 0..200 {
            if self.bus().connection_count().await >= count {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        anyhow::bail!("timed out waiting for {count} connections")
    }

    /// Wait until `count` connections observe `net_id`.
    pub async fn wait_for_subscribers(
        &self,
        net_id: common::types::NetId,
        count: usize,
    ) -> Result<(), anyhow::Error> {
        for _ in 0..200 {
            if self.bus().subscriber_count(net_id).await == count {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        anyhow::bail!("timed out waiting for {count} subscribers on net {net_id}")
    }
}

impl Drop for TestNetServer {
    fn drop(&mut self) {
        self._handle.abort();
        self.state.controller.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_server_spawns_successfully(pool: SqlitePool) -> Result<(), anyhow::Error> {
        let server = TestNetServer::spawn(pool).await?;
        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);

        let response = reqwest::get(format!("{}/ready", server.url())).await?;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["status"], "ready");

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_server_provides_pool_access(pool: SqlitePool) -> Result<(), anyhow::Error> {
        let server = TestNetServer::spawn(pool).await?;
        let result: (i32,) = sqlx::query_as("SELECT 1").fetch_one(server.pool()).await?;
        assert_eq!(result.0, 1);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_server_provides_addr(pool: SqlitePool) -> Result<(), anyhow::Error> {
        let server = TestNetServer::spawn(pool).await?;
        let addr = server.addr();
        assert!(addr.ip().is_loopback());
        assert!(addr.port() > 0);
        assert_eq!(server.ws_url(), format!("ws://{addr}/ws"));
        Ok(())
    }
}
