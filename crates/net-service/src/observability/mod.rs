//! Observability for the net service: Prometheus metrics and health state.

pub mod health;
pub mod metrics;
