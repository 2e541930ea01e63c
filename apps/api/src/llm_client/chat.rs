//! OpenAI-compatible `/chat/completions` client.
//!
//! Works against any provider exposing that schema (Hugging Face Router, OpenAI, ...).
//! When the primary reports `insufficient_quota` on a 429 and a fallback provider is
//! configured, the identical request is replayed once against the fallback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::transport::{send_with_retry, HttpRequest, HttpResponse, HttpTransport, RetryPolicy};
use super::{
    ensure_messages, truncate_chars, ChatCompletion, CompletionParams, LlmError, Message,
    ERROR_EXCERPT_CHARS,
};

/// Secondary provider used when the primary is out of quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackProvider {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl FallbackProvider {
    /// All three parts must be present and non-empty; anything partial counts as absent.
    pub fn from_parts(
        base_url: Option<String>,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Option<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(Self {
            base_url: non_empty(base_url)?.trim_end_matches('/').to_string(),
            api_key: non_empty(api_key)?,
            model: non_empty(model)?,
        })
    }
}

/// Values the client needs; owned by `Config`.
#[derive(Debug, Clone)]
pub struct ChatClientSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub default_max_tokens: u32,
    pub timeout: Duration,
    pub stream_default: bool,
    pub organization: Option<String>,
    pub fallback: Option<FallbackProvider>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
}

#[derive(Clone)]
pub struct ChatClient {
    settings: ChatClientSettings,
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
}

impl ChatClient {
    pub fn new(settings: ChatClientSettings, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            settings,
            transport,
            retry: RetryPolicy::CHAT,
        }
    }

    fn endpoint(base_url: &str) -> String {
        format!("{}/chat/completions", base_url.trim_end_matches('/'))
    }

    fn build_request(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        messages: &[Message],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<HttpRequest, LlmError> {
        let body = serde_json::to_value(ChatRequest {
            model,
            messages,
            max_tokens,
            temperature,
            stream: false,
        })
        .map_err(|e| LlmError::InvalidInput(format!("unserializable request: {e}")))?;

        Ok(HttpRequest::new(Self::endpoint(base_url), body, self.settings.timeout).bearer(api_key))
    }

    /// Replays the request against the fallback provider when the primary is out of quota.
    /// Returns `None` when the response does not qualify or no fallback is configured.
    async fn try_fallback_if_quota(
        &self,
        response: &HttpResponse,
        messages: &[Message],
        max_tokens: u32,
        temperature: f32,
    ) -> Option<Result<HttpResponse, LlmError>> {
        if response.status != 429 {
            return None;
        }
        let fallback = self.settings.fallback.as_ref()?;
        if !is_insufficient_quota(&response.body) {
            return None;
        }

        warn!(
            "Primary provider out of quota, retrying once against fallback model {}",
            fallback.model
        );
        let request = match self.build_request(
            &fallback.base_url,
            &fallback.api_key,
            &fallback.model,
            messages,
            max_tokens,
            temperature,
        ) {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };
        Some(send_with_retry(self.transport.as_ref(), &request, &self.retry).await)
    }
}

#[async_trait]
impl ChatCompletion for ChatClient {
    async fn complete(
        &self,
        messages: &[Message],
        params: CompletionParams,
    ) -> Result<String, LlmError> {
        ensure_messages(messages)?;

        if params.stream.unwrap_or(self.settings.stream_default) {
            debug!("Streaming requested but not supported; sending non-streaming request");
        }

        let max_tokens = params.max_tokens.unwrap_or(self.settings.default_max_tokens);
        let mut request = self.build_request(
            &self.settings.base_url,
            &self.settings.api_key,
            &self.settings.model,
            messages,
            max_tokens,
            params.temperature,
        )?;
        if let Some(org) = &self.settings.organization {
            request = request.header("OpenAI-Organization", org.as_str());
        }

        let response = send_with_retry(self.transport.as_ref(), &request, &self.retry).await?;
        let response = match self
            .try_fallback_if_quota(&response, messages, max_tokens, params.temperature)
            .await
        {
            Some(fallback) => fallback?,
            None => response,
        };

        if !response.is_success() {
            warn!("LLM API returned {}: {}", response.status, response.excerpt());
            return Err(LlmError::PermanentUpstream {
                status: response.status,
                body: response.excerpt(),
            });
        }

        let text = extract_content(&response.body)?;
        debug!("LLM call succeeded: {} chars", text.len());
        Ok(text)
    }
}

fn is_insufficient_quota(body: &str) -> bool {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.code)
        .is_some_and(|code| code == "insufficient_quota")
}

/// Pulls `choices[0].message.content`, trimmed.
fn extract_content(body: &str) -> Result<String, LlmError> {
    let malformed = || LlmError::MalformedResponse {
        excerpt: truncate_chars(body, ERROR_EXCERPT_CHARS).to_string(),
    };

    let parsed: ChatResponse = serde_json::from_str(body).map_err(|_| malformed())?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(malformed)
}
