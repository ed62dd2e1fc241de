//! Net Service Library
//!
//! Backend for live audio rooms ("nets"): session lifecycle, role
//! authorization, speak-request arbitration, real-time fan-out of state
//! changes, and media transport credentials.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> actors (one per net) -> services/*.rs -> repositories/*.rs
//!                                         └── fanout::FanOutBus -> WebSocket connections
//! ```
//!
//! Mutations for a net are serialized through that net's actor; reads go
//! straight to the services.
//!
//! # Modules
//!
//! - `actors` - Controller and per-net actors
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `fanout` - Subscription registry and event delivery
//! - `handlers` - HTTP and WebSocket handlers
//! - `models` - Data models and API bodies
//! - `observability` - Metrics and health state
//! - `repositories` - SQLite access
//! - `routes` - Axum router setup
//! - `services` - Business rules

pub mod actors;
pub mod config;
pub mod errors;
pub mod fanout;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
