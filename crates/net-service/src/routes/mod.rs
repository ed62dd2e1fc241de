//! HTTP routes for the net service.
//!
//! Defines the Axum router and application state.

use crate::actors::{NetContext, NetControllerHandle};
use crate::config::Config;
use crate::fanout::FanOutBus;
use crate::handlers::{self, media, nets, speakers, ws};
use crate::observability::health::HealthState;
use crate::services::MediaCredentialAdapter;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    /// Entry point for every mutating net command.
    pub controller: NetControllerHandle,
    pub bus: FanOutBus,
    pub media: MediaCredentialAdapter,
    pub health: Arc<HealthState>,
}

impl AppState {
    /// Start the controller actor and assemble the shared state.
    #[must_use]
    pub fn new(pool: SqlitePool, config: Config, media: MediaCredentialAdapter) -> Self {
        let bus = FanOutBus::new();
        let controller = NetControllerHandle::new(NetContext {
            pool: pool.clone(),
            bus: bus.clone(),
            max_speakers: config.max_speakers,
        });

        Self {
            pool,
            config,
            controller,
            bus,
            media,
            health: Arc::new(HealthState::new()),
        }
    }
}

/// Build the application routes.
///
/// `/metrics` is mounted only when a Prometheus handle is supplied.
/// Layer order: 30 second `TimeoutLayer` innermost, `TraceLayer` outside it.
/// The timeout does not apply to an upgraded WebSocket.
pub fn build_routes(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::liveness))
        .route("/ready", get(handlers::readiness))
        .route("/api/nets", get(nets::list_nets).post(nets::create_net))
        .route("/api/nets/:id", get(nets::get_net))
        .route("/api/nets/:id/join", post(nets::join_net))
        .route("/api/nets/:id/leave", post(nets::leave_net))
        .route("/api/nets/:id/end", post(nets::end_net))
        .route(
            "/api/nets/:id/messages",
            get(nets::list_messages).post(nets::post_message),
        )
        .route("/api/nets/:id/invite-cohost", post(speakers::invite_cohost))
        .route("/api/nets/:id/request-speak", post(speakers::request_speak))
        .route(
            "/api/nets/:id/speak-requests",
            get(speakers::list_speak_requests),
        )
        .route(
            "/api/nets/:id/approve-speaker",
            post(speakers::approve_speaker),
        )
        .route("/api/nets/:id/deny-speaker", post(speakers::deny_speaker))
        .route(
            "/api/nets/:id/demote-speaker",
            post(speakers::demote_speaker),
        )
        .route("/api/nets/:id/toggle-mute", post(speakers::toggle_mute))
        .route("/api/nets/:id/token", post(media::mint_token))
        .route("/api/nets/:id/refresh-token", post(media::refresh_token))
        .route("/api/media/config", get(media::media_config))
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    let router = match metrics_handle {
        Some(handle) => api_routes.merge(
            Router::new()
                .route("/metrics", get(handlers::metrics_handler))
                .with_state(handle),
        ),
        None => api_routes,
    };

    router
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
}
