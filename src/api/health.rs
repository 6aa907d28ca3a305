use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::durable::DurableStore;

/// Backing for `GET /health`. Always returns 200 — the body reports
/// subsystem status rather than signaling failure through the status code.
#[derive(Clone)]
pub struct HealthState {
    pub durable: Arc<dyn DurableStore>,
}

pub async fn health(State(state): State<HealthState>) -> Json<serde_json::Value> {
    let db_status = if state.durable.health_check().await { "ok" } else { "disconnected" };
    Json(json!({
        "status": "ok",
        "db": db_status,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
