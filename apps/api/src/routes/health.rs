use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "interview-panel"
    }))
}

/// GET /
/// Reports which provider and model the server actually loaded.
pub async fn root_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "interview-panel",
        "provider": state.provider,
        "model": state.model,
        "personas": state.orchestrator.list_personas(),
    }))
}
