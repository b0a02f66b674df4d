use axum::Json;
use axum::extract::State;
use serde_json::json;
use std::sync::atomic::Ordering;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let postgres = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let redis = state.stream.ping().await;
    let status = if postgres && redis { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "postgres": postgres,
        "redis": redis,
        "ws_clients": state.ws_clients.load(Ordering::Relaxed),
        "uptime": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
