//! Axum route handlers for the interview loop: ask, evaluate, follow-up, score.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::orchestrator::{AskOutcome, EvaluateOutcome, ScoreOutcome};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub context: String,
}

/// Shared by /evaluate, /follow-up and /score.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub persona: String,
    pub question: String,
    pub answer: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /ask
///
/// The next persona in rotation asks one question about the given context.
pub async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskOutcome>, AppError> {
    let outcome = state
        .orchestrator
        .ask(&request.context)
        .await
        .map_err(|e| AppError::from_orchestrator("/ask", e))?;
    Ok(Json(outcome))
}

/// POST /evaluate
///
/// The named persona gives feedback on an answer. Unknown persona → 400.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<EvaluateOutcome>, AppError> {
    let outcome = state
        .orchestrator
        .evaluate(&request.persona, &request.question, &request.answer)
        .await
        .map_err(|e| AppError::from_orchestrator("/evaluate", e))?;
    Ok(Json(outcome))
}

/// POST /follow-up
///
/// One probing question aimed at the weakest part of the answer.
/// Only personas with the probing capability accept this.
pub async fn handle_follow_up(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AskOutcome>, AppError> {
    if request.answer.trim().is_empty() {
        return Err(AppError::Validation("answer cannot be empty".to_string()));
    }
    let outcome = state
        .orchestrator
        .follow_up(&request.persona, &request.question, &request.answer)
        .await
        .map_err(|e| AppError::from_orchestrator("/follow-up", e))?;
    Ok(Json(outcome))
}

/// POST /score
///
/// Rubric score (0–5 per dimension) plus a one-line summary.
pub async fn handle_score(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<ScoreOutcome>, AppError> {
    if request.answer.trim().is_empty() {
        return Err(AppError::Validation("answer cannot be empty".to_string()));
    }
    let outcome = state
        .orchestrator
        .score(&request.persona, &request.question, &request.answer)
        .await
        .map_err(|e| AppError::from_orchestrator("/score", e))?;
    Ok(Json(outcome))
}
