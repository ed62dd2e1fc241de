//! HTTP and WebSocket request handlers.

pub mod health;
pub mod media;
pub mod metrics;
pub mod nets;
pub mod speakers;
pub mod ws;

pub use health::{liveness, readiness};
pub use metrics::metrics_handler;
