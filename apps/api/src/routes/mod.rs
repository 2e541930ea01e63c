pub mod health;
pub mod interview;
pub mod panel;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        // Interview loop
        .route("/ask", post(interview::handle_ask))
        .route("/evaluate", post(interview::handle_evaluate))
        .route("/follow-up", post(interview::handle_follow_up))
        .route("/score", post(interview::handle_score))
        // Panel / rotation
        .route("/personas", get(panel::handle_list_personas))
        .route("/rotation", put(panel::handle_set_rotation))
        .route("/rotation/reset", post(panel::handle_reset_rotation))
        .with_state(state)
}
