use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::chat::{ChatClientSettings, FallbackProvider};
use crate::llm_client::inference::{
    InferenceClientSettings, DEFAULT_INFERENCE_BASE_URL, DEFAULT_INFERENCE_MODEL,
};

/// Which transport backs the shared chat client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// OpenAI-compatible `/chat/completions`.
    Http,
    /// Raw-inference endpoint fed a ChatML prompt.
    HfInference,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Http => "http",
            LlmProvider::HfInference => "hf_inference",
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: LlmProvider,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_timeout: Duration,
    pub llm_stream: bool,
    pub openai_org: Option<String>,
    pub fallback: Option<FallbackProvider>,
    /// Some but not all `LLM_FALLBACK_*` values were set; the fallback is disabled.
    pub partial_fallback: bool,
    pub rotation_order: Option<Vec<String>>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get("LLM_PROVIDER").as_deref().unwrap_or("http") {
            "http" => LlmProvider::Http,
            "hf_inference" => LlmProvider::HfInference,
            other => bail!("Unsupported LLM_PROVIDER: {other} (expected 'http' or 'hf_inference')"),
        };

        let (base_url, model, default_max_tokens, default_timeout) = match provider {
            LlmProvider::Http => (
                require(&get, "LLM_BASE_URL")?,
                require(&get, "LLM_MODEL")?,
                128,
                60,
            ),
            LlmProvider::HfInference => (
                get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_INFERENCE_BASE_URL.to_string()),
                get("LLM_MODEL").unwrap_or_else(|| DEFAULT_INFERENCE_MODEL.to_string()),
                512,
                45,
            ),
        };

        let fallback_parts = [
            get("LLM_FALLBACK_BASE_URL"),
            get("LLM_FALLBACK_API_KEY"),
            get("LLM_FALLBACK_MODEL"),
        ];
        let any_fallback = fallback_parts.iter().any(Option::is_some);
        let [fb_base_url, fb_api_key, fb_model] = fallback_parts;
        let fallback = FallbackProvider::from_parts(fb_base_url, fb_api_key, fb_model);
        let partial_fallback = any_fallback && fallback.is_none();

        let port_key = if get("APP_PORT").is_some() { "APP_PORT" } else { "PORT" };

        Ok(Config {
            provider,
            llm_base_url: base_url.trim_end_matches('/').to_string(),
            llm_api_key: require(&get, "LLM_API_KEY")?,
            llm_model: model,
            llm_max_tokens: parse_or(&get, "LLM_MAX_TOKENS", default_max_tokens)?,
            llm_timeout: Duration::from_secs(parse_or(
                &get,
                "LLM_TIMEOUT_SECONDS",
                default_timeout,
            )?),
            llm_stream: get("LLM_STREAM").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            openai_org: get("OPENAI_ORG").or_else(|| get("OPENAI_ORGANIZATION")),
            fallback,
            partial_fallback,
            rotation_order: get("ROTATION_ORDER").map(|v| {
                v.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            }),
            port: parse_or(&get, port_key, 8000)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn chat_settings(&self) -> ChatClientSettings {
        ChatClientSettings {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            default_max_tokens: self.llm_max_tokens,
            timeout: self.llm_timeout,
            stream_default: self.llm_stream,
            organization: self.openai_org.clone(),
            fallback: self.fallback.clone(),
        }
    }

    pub fn inference_settings(&self) -> InferenceClientSettings {
        InferenceClientSettings {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            default_max_tokens: self.llm_max_tokens,
            timeout: self.llm_timeout,
        }
    }
}

fn require(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    get(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
