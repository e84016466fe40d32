//! OneBot event ingress: `POST {onebot.path}`.
//!
//! The OneBot implementation reports every event here. When `onebot.secret`
//! is set, the body must carry a matching `X-Signature: sha1=<hex>` HMAC.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha1::Sha1;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app::AppState;

type HmacSha1 = Hmac<Sha1>;

/// Verifies, parses and hands the event to the bridge on its own task.
/// Returns 204 once accepted, 401 on a bad signature, 400 on a malformed body.
pub async fn event_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    if let Some(secret) = state.config.onebot.secret.as_deref().filter(|s| !s.is_empty()) {
        verify_signature(&headers, &body, secret).map_err(|e| auth_error(&e))?;
    }

    let event = qqtg_onebot::parse_event(&body).map_err(|e| {
        warn!(error = %e, bytes = body.len(), "invalid OneBot event");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid event", "reason": e.to_string()})),
        )
    })?;

    match event {
        Some(event) => {
            debug!(event = event.name(), "OneBot event accepted");
            let bridge = Arc::clone(&state.bridge);
            tokio::spawn(async move { bridge.handle(event).await });
        }
        None => debug!("OneBot meta event"),
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `X-Signature: sha1=<hex>`, an HMAC-SHA1 of the raw body.
fn verify_signature(headers: &HeaderMap, body: &[u8], secret: &str) -> Result<(), String> {
    let sig_header = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing X-Signature header".to_string())?;

    let sig_hex = sig_header
        .strip_prefix("sha1=")
        .ok_or_else(|| "malformed X-Signature header".to_string())?;

    let expected = hex::decode(sig_hex).map_err(|_| "X-Signature is not valid hex".to_string())?;

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| "HMAC signature mismatch".to_string())
}

fn auth_error(reason: &str) -> (StatusCode, Json<Value>) {
    warn!(reason = %reason, "OneBot event authentication failed");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "authentication failed", "reason": reason})),
    )
}
