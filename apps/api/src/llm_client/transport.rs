//! HTTP plumbing shared by both LLM transports: the `HttpTransport` seam, the reqwest
//! implementation, and the bounded exponential-backoff retry loop.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::{truncate_chars, LlmError, ERROR_EXCERPT_CHARS};

/// A fully-built outbound JSON POST.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>, body: Value, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
            timeout,
        }
    }

    pub fn bearer(self, api_key: &str) -> Self {
        self.header("Authorization", format!("Bearer {api_key}"))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Raw status + body. Status interpretation is left to the caller.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn excerpt(&self) -> String {
        truncate_chars(&self.body, ERROR_EXCERPT_CHARS).to_string()
    }
}

/// Connection-level failure: nothing usable came back.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .header("Content-Type", "application/json")
            .json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Exponential backoff: `initial`, doubling per attempt, never above `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Chat-completions transport: 4 attempts, 1s → 8s.
    pub const CHAT: RetryPolicy = RetryPolicy {
        max_attempts: 4,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(8),
    };

    /// Raw-inference transport: 3 attempts, 1s → 8s.
    pub const INFERENCE: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(8),
    };

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Sends `request`, retrying network faults and 5xx responses under `policy`.
///
/// 2xx and 4xx responses are returned as-is on first sight; the caller decides what a 4xx means.
pub async fn send_with_retry(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    policy: &RetryPolicy,
) -> Result<HttpResponse, LlmError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            warn!(
                "LLM call attempt {} failed, retrying after {}ms...",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        match transport.post_json(request).await {
            Ok(response) if response.is_server_error() => {
                warn!("LLM API returned {}: {}", response.status, response.excerpt());
                last_error = Some(LlmError::TransientUpstream {
                    status: Some(response.status),
                    message: format!("Upstream {}: {}", response.status, response.excerpt()),
                    attempts,
                });
            }
            Ok(response) => return Ok(response),
            Err(TransportError::Timeout) => {
                warn!("LLM API request to {} timed out", request.url);
                last_error = Some(LlmError::Timeout { attempts });
            }
            Err(TransportError::Network(message)) => {
                warn!("LLM API network error: {message}");
                last_error = Some(LlmError::TransientUpstream {
                    status: None,
                    message: format!("Network error: {message}"),
                    attempts,
                });
            }
        }
    }

    Err(last_error.unwrap_or(LlmError::TransientUpstream {
        status: None,
        message: "no attempt was made".to_string(),
        attempts,
    }))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Scripted transport: pops one canned outcome per call and records every request.
    /// Once the script runs dry it keeps repeating the last outcome.
    pub struct FakeTransport {
        script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        last: Mutex<Option<Result<HttpResponse, TransportError>>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        pub fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    pub fn respond(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            body: body.to_string(),
        })
    }

    fn clone_outcome(
        outcome: &Result<HttpResponse, TransportError>,
    ) -> Result<HttpResponse, TransportError> {
        match outcome {
            Ok(r) => Ok(r.clone()),
            Err(TransportError::Timeout) => Err(TransportError::Timeout),
            Err(TransportError::Network(m)) => Err(TransportError::Network(m.clone())),
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn post_json(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            match next {
                Some(outcome) => {
                    *last = Some(clone_outcome(&outcome));
                    outcome
                }
                None => last
                    .as_ref()
                    .map(clone_outcome)
                    .unwrap_or(Err(TransportError::Network("empty script".to_string()))),
            }
        }
    }
}
