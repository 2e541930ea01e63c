//! Interview personas — a fixed system instruction plus question/feedback behavior.
//!
//! Every persona implements `Persona`. Richer personas additionally expose
//! `ProbingPersona` (follow-up + rubric score), discoverable via `Persona::as_probing`.
//! Personas hold no per-call state and share one `ChatCompletion` client.

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm_client::{ChatCompletion, CompletionParams, LlmError, Message};

pub mod prompts;
pub mod tech;

pub use tech::{ScoreCard, TechInterviewer};

use prompts::{ASK_PROMPT_TEMPLATE, EMPTY_ANSWER_REPLY, EVALUATE_PROMPT_TEMPLATE};

const ASK_MAX_TOKENS: u32 = 128;
const ASK_TEMPERATURE: f32 = 0.7;
const EVALUATE_MAX_TOKENS: u32 = 160;
const EVALUATE_TEMPERATURE: f32 = 0.6;

/// Static persona definition, loaded once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaConfig {
    pub name: String,
    pub system_prompt: String,
}

impl PersonaConfig {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
        }
    }

    pub fn tech() -> Self {
        Self::new(prompts::TECH_NAME, prompts::TECH_SYSTEM)
    }

    pub fn hr() -> Self {
        Self::new(prompts::HR_NAME, prompts::HR_SYSTEM)
    }

    pub fn mentor() -> Self {
        Self::new(prompts::MENTOR_NAME, prompts::MENTOR_SYSTEM)
    }
}

/// Baseline contract every persona honors. The orchestrator only needs this.
#[async_trait]
pub trait Persona: Send + Sync {
    fn config(&self) -> &PersonaConfig;

    /// Produces one interview question from free-text context.
    async fn ask_question(&self, context: &str) -> Result<String, LlmError>;

    /// Produces short bullet feedback. Blank answers short-circuit without a model call.
    async fn evaluate(&self, question: &str, answer: &str) -> Result<String, LlmError>;

    /// Optional richer capability set. `None` unless the persona implements it.
    fn as_probing(&self) -> Option<&dyn ProbingPersona> {
        None
    }
}

/// Extended capabilities: a targeted follow-up and a numeric rubric score.
#[async_trait]
pub trait ProbingPersona: Send + Sync {
    async fn follow_up(&self, question: &str, answer: &str) -> Result<String, LlmError>;

    /// Never fails on unparseable model output; see `ScoreCard::parse`.
    async fn score(&self, question: &str, answer: &str) -> Result<ScoreCard, LlmError>;
}

/// The plain persona: system prompt + shared client.
#[derive(Clone)]
pub struct InterviewPersona {
    config: PersonaConfig,
    llm: Arc<dyn ChatCompletion>,
}

impl InterviewPersona {
    pub fn new(config: PersonaConfig, llm: Arc<dyn ChatCompletion>) -> Self {
        Self { config, llm }
    }

    /// system = persona instruction, user = `user_content`.
    pub(crate) fn messages(&self, user_content: String) -> Vec<Message> {
        vec![
            Message::system(self.config.system_prompt.as_str()),
            Message::user(user_content),
        ]
    }

    pub(crate) async fn call(
        &self,
        user_content: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let text = self
            .llm
            .complete(
                &self.messages(user_content),
                CompletionParams::new(max_tokens, temperature),
            )
            .await?;
        Ok(text.trim().to_string())
    }

    /// Question prompt with an optional hint line folded in above the context.
    pub(crate) async fn ask_with_hints(
        &self,
        context: &str,
        hints: &str,
    ) -> Result<String, LlmError> {
        let prompt = fill_template(
            ASK_PROMPT_TEMPLATE,
            &[("hints", hints), ("context", context)],
        );
        self.call(prompt, ASK_MAX_TOKENS, ASK_TEMPERATURE).await
    }
}

#[async_trait]
impl Persona for InterviewPersona {
    fn config(&self) -> &PersonaConfig {
        &self.config
    }

    async fn ask_question(&self, context: &str) -> Result<String, LlmError> {
        self.ask_with_hints(context, "").await
    }

    async fn evaluate(&self, question: &str, answer: &str) -> Result<String, LlmError> {
        if answer.trim().is_empty() {
            return Ok(EMPTY_ANSWER_REPLY.to_string());
        }
        let prompt = fill_template(
            EVALUATE_PROMPT_TEMPLATE,
            &[("question", question), ("answer", answer)],
        );
        self.call(prompt, EVALUATE_MAX_TOKENS, EVALUATE_TEMPERATURE)
            .await
    }
}

/// Single-pass `{key}` substitution, so values containing `{...}` are never re-expanded.
pub(crate) fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let replaced = tail.find('}').and_then(|end| {
            let key = &tail[1..end];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, end + 1))
        });
        match replaced {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Spy client: records every message list it receives and replays canned replies.
    #[derive(Default)]
    pub struct SpyLlm {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        pub calls: Mutex<Vec<(Vec<Message>, CompletionParams)>>,
    }

    impl SpyLlm {
        pub fn replying(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(error: LlmError) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::from([Err(error)])),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn last_call(&self) -> (Vec<Message>, CompletionParams) {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ChatCompletion for SpyLlm {
        async fn complete(
            &self,
            messages: &[Message],
            params: CompletionParams,
        ) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push((messages.to_vec(), params));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("What would you change about this design?".to_string()))
        }
    }
}
