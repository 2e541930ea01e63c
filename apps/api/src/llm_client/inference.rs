//! Raw-inference transport (Hugging Face Inference API style).
//!
//! The endpoint has no chat schema, so the message sequence is flattened into one
//! ChatML prompt and the generated continuation is returned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::transport::{send_with_retry, HttpRequest, HttpTransport, RetryPolicy};
use super::{
    ensure_messages, truncate_chars, ChatCompletion, CompletionParams, LlmError, Message,
    ERROR_EXCERPT_CHARS,
};

pub const DEFAULT_INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_INFERENCE_MODEL: &str = "Qwen/Qwen2.5-3B-Instruct";

#[derive(Debug, Clone)]
pub struct InferenceClientSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub default_max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

/// The API answers with either a bare object or a one-element array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Single(Generation),
    Batch(Vec<Generation>),
}

#[derive(Clone)]
pub struct InferenceClient {
    settings: InferenceClientSettings,
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
}

impl InferenceClient {
    pub fn new(settings: InferenceClientSettings, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            settings,
            transport,
            retry: RetryPolicy::INFERENCE,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }
}

#[async_trait]
impl ChatCompletion for InferenceClient {
    async fn complete(
        &self,
        messages: &[Message],
        params: CompletionParams,
    ) -> Result<String, LlmError> {
        ensure_messages(messages)?;

        if params.stream == Some(true) {
            debug!("Streaming requested but not supported by the inference transport");
        }

        let body = serde_json::to_value(InferenceRequest {
            inputs: to_chatml(messages),
            parameters: InferenceParameters {
                max_new_tokens: params.max_tokens.unwrap_or(self.settings.default_max_tokens),
                temperature: params.temperature,
                return_full_text: false,
            },
        })
        .map_err(|e| LlmError::InvalidInput(format!("unserializable request: {e}")))?;

        let request = HttpRequest::new(self.endpoint(), body, self.settings.timeout)
            .bearer(&self.settings.api_key);

        let response = send_with_retry(self.transport.as_ref(), &request, &self.retry).await?;
        if !response.is_success() {
            warn!(
                "Inference API returned {}: {}",
                response.status,
                response.excerpt()
            );
            return Err(LlmError::PermanentUpstream {
                status: response.status,
                body: response.excerpt(),
            });
        }

        extract_generated_text(&response.body)
    }
}

/// Serializes messages as ChatML, ending with an open assistant turn:
/// `<|im_start|>{role}\n{content}<|im_end|>` ... `<|im_start|>assistant\n`
pub fn to_chatml(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for m in messages {
        prompt.push_str("<|im_start|>");
        prompt.push_str(m.role.as_str());
        prompt.push('\n');
        prompt.push_str(&m.content);
        prompt.push_str("<|im_end|>");
    }
    prompt.push_str("<|im_start|>assistant\n");
    prompt
}

fn extract_generated_text(body: &str) -> Result<String, LlmError> {
    let malformed = || LlmError::MalformedResponse {
        excerpt: truncate_chars(body, ERROR_EXCERPT_CHARS).to_string(),
    };

    let parsed: InferenceResponse = serde_json::from_str(body).map_err(|_| malformed())?;
    let generation = match parsed {
        InferenceResponse::Single(g) => g,
        InferenceResponse::Batch(batch) => batch.into_iter().next().ok_or_else(malformed)?,
    };
    Ok(generation.generated_text.trim().to_string())
}
