/// LLM Client — the single point of entry for all model calls in the interview panel.
///
/// ARCHITECTURAL RULE: personas never talk HTTP themselves. Every completion goes
/// through a `ChatCompletion` implementation from this module.
///
/// Two transports share the same contract:
/// - `ChatClient`: OpenAI-compatible `/chat/completions`, with quota fallback.
/// - `InferenceClient`: raw-inference endpoint fed a ChatML prompt string.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod chat;
pub mod inference;
pub mod transport;

/// Upstream bodies are cut to this many characters before they land in an error.
pub(crate) const ERROR_EXCERPT_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream unavailable after {attempts} attempts: {message}")]
    TransientUpstream {
        status: Option<u16>,
        message: String,
        attempts: u32,
    },

    #[error("Upstream timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("LLM API {status}: {body}")]
    PermanentUpstream { status: u16, body: String },

    #[error("Unexpected response shape: {excerpt}")]
    MalformedResponse { excerpt: String },
}

/// Role of a chat message. Serialized lowercase, as every provider expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single role-tagged message. Order inside a request is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Per-call knobs. `max_tokens = None` falls back to the client's configured default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub max_tokens: Option<u32>,
    pub temperature: f32,
    /// Accepted for API compatibility only. Requests are always sent non-streaming.
    pub stream: Option<bool>,
}

impl CompletionParams {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            temperature,
            stream: None,
        }
    }
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: 0.7,
            stream: None,
        }
    }
}

/// Transport-agnostic completion contract. Shared by every persona via `Arc<dyn ChatCompletion>`.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        params: CompletionParams,
    ) -> Result<String, LlmError>;
}

pub(crate) fn ensure_messages(messages: &[Message]) -> Result<(), LlmError> {
    if messages.is_empty() {
        return Err(LlmError::InvalidInput(
            "messages must be a non-empty list of {role, content} messages".to_string(),
        ));
    }
    Ok(())
}

/// Cuts `text` to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
