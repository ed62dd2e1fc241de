//! # Net Test Utilities
//!
//! Shared test utilities for the net service.
//!
//! This crate provides:
//! - Server test harness (`TestNetServer` for end-to-end tests)
//! - Member fixtures (`seed_user`, `seed_users`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use net_test_utils::*;
//!
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_example(pool: SqlitePool) -> Result<()> {
//!     let host = seed_user(&pool, "alice").await?;
//!     let server = TestNetServer::spawn(pool).await?;
//!
//!     let response = reqwest::Client::new()
//!         .post(format!("{}/api/nets", server.url()))
//!         .json(&serde_json::json!({"userId": host, "name": "Morning net"}))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 201);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;
