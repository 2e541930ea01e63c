use std::sync::Arc;

use crate::orchestrator::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Reported by `GET /`; e.g. "http" or "hf_inference".
    pub provider: &'static str,
    pub model: String,
}
