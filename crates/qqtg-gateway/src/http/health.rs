use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;

/// GET /health: liveness probe with correlation store counters.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (status, topics, messages) = match state.store.stats() {
        Ok((topics, messages)) => ("ok", json!(topics), json!(messages)),
        Err(e) => {
            warn!(error = %e, "health: store stats unavailable");
            ("degraded", Value::Null, Value::Null)
        }
    };
    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "git_sha": env!("QQTG_GIT_SHA"),
        "bots": state.bridge.pool().len(),
        "topics": topics,
        "messages": messages,
    }))
}
