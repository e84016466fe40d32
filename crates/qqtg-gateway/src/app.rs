use axum::{
    routing::{get, post},
    Router,
};
use qqtg_core::config::QqtgConfig;
use qqtg_relay::Bridge;
use qqtg_store::CorrelationStore;
use std::sync::Arc;

/// Shared state, passed as `Arc<AppState>` to every Axum handler.
pub struct AppState {
    pub config: QqtgConfig,
    pub bridge: Arc<Bridge>,
    pub store: Arc<CorrelationStore>,
}

impl AppState {
    pub fn new(config: QqtgConfig, bridge: Arc<Bridge>, store: Arc<CorrelationStore>) -> Self {
        Self {
            config,
            bridge,
            store,
        }
    }
}

/// Assemble the router: health check plus the OneBot event route.
pub fn build_router(state: Arc<AppState>, onebot_path: &str) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(onebot_path, post(crate::http::onebot::event_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
