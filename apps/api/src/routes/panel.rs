//! Axum route handlers for inspecting the panel and steering the rotation.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::orchestrator::RotationSnapshot;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PersonaSummary {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct PanelResponse {
    pub personas: Vec<PersonaSummary>,
    pub rotation: RotationSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct RotationRequest {
    pub order: Vec<String>,
}

/// GET /personas
pub async fn handle_list_personas(State(state): State<AppState>) -> Json<PanelResponse> {
    let personas = state
        .orchestrator
        .persona_configs()
        .into_iter()
        .map(|(key, config)| PersonaSummary {
            key,
            name: config.name,
        })
        .collect();
    let rotation = state.orchestrator.rotation().await;
    Json(PanelResponse { personas, rotation })
}

/// PUT /rotation
///
/// Replaces the rotation order and restarts it. Empty or unknown keys → 400.
pub async fn handle_set_rotation(
    State(state): State<AppState>,
    Json(request): Json<RotationRequest>,
) -> Result<Json<RotationSnapshot>, AppError> {
    state
        .orchestrator
        .set_rotation_order(request.order)
        .await
        .map_err(|e| AppError::from_orchestrator("/rotation", e))?;
    Ok(Json(state.orchestrator.rotation().await))
}

/// POST /rotation/reset
pub async fn handle_reset_rotation(State(state): State<AppState>) -> Json<RotationSnapshot> {
    state.orchestrator.reset_rotation().await;
    Json(state.orchestrator.rotation().await)
}
