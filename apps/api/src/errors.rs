use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::orchestrator::OrchestratorError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown persona key: {0}")]
    UnknownPersona(String),

    #[error("Invalid rotation: {0}")]
    InvalidRotation(String),

    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// `route` names the failing endpoint in the client-facing message.
    #[error("{route} failed: {source}")]
    Llm {
        route: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps orchestrator failures, tagging upstream errors with the route that hit them.
    pub fn from_orchestrator(route: &'static str, err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::UnknownPersona(key) => AppError::UnknownPersona(key),
            OrchestratorError::InvalidRotation(msg) => AppError::InvalidRotation(msg),
            OrchestratorError::UnsupportedCapability(msg) => {
                AppError::UnsupportedCapability(format!(
                    "persona '{msg}' does not support this operation"
                ))
            }
            OrchestratorError::DuplicatePersona(key) => {
                AppError::Internal(anyhow::anyhow!("persona key registered twice: {key}"))
            }
            OrchestratorError::Llm(source) => AppError::Llm { route, source },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnknownPersona(key) => (
                StatusCode::BAD_REQUEST,
                "UNKNOWN_PERSONA",
                format!("Unknown persona key: {key}"),
            ),
            AppError::InvalidRotation(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_ROTATION", msg.clone())
            }
            AppError::UnsupportedCapability(msg) => (
                StatusCode::BAD_REQUEST,
                "UNSUPPORTED_CAPABILITY",
                msg.clone(),
            ),
            AppError::Llm { route, source } => {
                let upstream_status = match source {
                    LlmError::TransientUpstream { status, .. } => *status,
                    LlmError::PermanentUpstream { status, .. } => Some(*status),
                    _ => None,
                };
                tracing::error!(?upstream_status, "LLM error on {route}: {source}");
                let code = match source {
                    LlmError::Timeout { .. } => "LLM_TIMEOUT",
                    LlmError::MalformedResponse { .. } => "LLM_MALFORMED_RESPONSE",
                    _ => "LLM_ERROR",
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    format!("{route} failed: {source}"),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
