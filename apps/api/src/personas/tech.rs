//! Tech Interviewer — the probing persona.
//!
//! On top of the baseline contract it:
//! - reads `[easy]` / `[hard]` difficulty tags and `key:value` hints from the context,
//! - asks a targeted follow-up aimed at the weakest part of an answer,
//! - scores an answer on a 0–5 rubric, degrading to an all-zero card on bad JSON.

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::prompts::{FOLLOW_UP_PROMPT_TEMPLATE, SCORE_PROMPT_TEMPLATE};
use super::{fill_template, InterviewPersona, Persona, PersonaConfig, ProbingPersona};
use crate::llm_client::{strip_json_fences, truncate_chars, ChatCompletion, LlmError};

const FOLLOW_UP_MAX_TOKENS: u32 = 80;
const FOLLOW_UP_TEMPERATURE: f32 = 0.5;
const SCORE_MAX_TOKENS: u32 = 120;
const SCORE_TEMPERATURE: f32 = 0.2;
/// Raw model output kept in `summary` when the score JSON cannot be parsed.
const SUMMARY_FALLBACK_CHARS: usize = 120;
const MAX_RUBRIC_SCORE: u8 = 5;

/// Recognized hint keys, matched case-insensitively.
const HINT_KEYS: &[&str] = &["topic", "stack", "framework", "mlops", "domain", "data"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        })
    }
}

/// A single `key:value` hint lifted from the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub key: String,
    pub value: String,
}

/// Everything the question prompt learns from the context besides the raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionHints {
    pub difficulty: Difficulty,
    pub hints: Vec<Hint>,
}

impl QuestionHints {
    pub fn from_context(context: &str) -> Self {
        Self {
            difficulty: extract_difficulty(context),
            hints: extract_hints(context),
        }
    }

    /// `Hints: difficulty=hard; topic=causal; domain=healthcare` plus a trailing newline.
    pub fn to_prompt_line(&self) -> String {
        let mut parts = vec![format!("difficulty={}", self.difficulty)];
        parts.extend(self.hints.iter().map(|h| format!("{}={}", h.key, h.value)));
        format!("Hints: {}\n", parts.join("; "))
    }
}

/// First bracketed tag wins; no tag means medium.
pub fn extract_difficulty(context: &str) -> Difficulty {
    let lower = context.to_lowercase();
    let easy = lower.find("[easy]");
    let hard = lower.find("[hard]");
    match (easy, hard) {
        (Some(e), Some(h)) if e < h => Difficulty::Easy,
        (Some(_), None) => Difficulty::Easy,
        (_, Some(_)) => Difficulty::Hard,
        (None, None) => Difficulty::Medium,
    }
}

fn hint_regex() -> &'static Regex {
    static HINT_RE: OnceLock<Regex> = OnceLock::new();
    HINT_RE.get_or_init(|| {
        let pattern = format!(r"(?i)\b({}):(\S+)", HINT_KEYS.join("|"));
        Regex::new(&pattern).expect("hint pattern is a valid regex")
    })
}

/// `key:value` tokens for the recognized keys, in order of appearance.
/// The value runs to the next whitespace; trailing punctuation is dropped.
pub fn extract_hints(context: &str) -> Vec<Hint> {
    hint_regex()
        .captures_iter(context)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_lowercase();
            let value = caps
                .get(2)?
                .as_str()
                .trim_end_matches(|c: char| c.is_ascii_punctuation());
            (!value.is_empty()).then(|| Hint {
                key,
                value: value.to_string(),
            })
        })
        .collect()
}

/// Rubric score for one answer. Produced fresh per call, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreCard {
    pub depth: u8,
    pub correctness: u8,
    pub tradeoffs: u8,
    pub communication: u8,
    pub summary: String,
}

impl ScoreCard {
    /// Parses the model's JSON reply. Missing numbers become 0, a missing summary
    /// becomes empty. Anything that is not a JSON object yields an all-zero card
    /// whose summary is the first 120 characters of the raw reply.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(strip_json_fences(raw)) {
            Ok(Value::Object(fields)) => {
                let rubric = |key: &str| fields.get(key).map(rubric_value).unwrap_or(0);
                ScoreCard {
                    depth: rubric("depth"),
                    correctness: rubric("correctness"),
                    tradeoffs: rubric("tradeoffs"),
                    communication: rubric("communication"),
                    summary: fields
                        .get("summary")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                }
            }
            _ => {
                warn!("Score reply was not a JSON object, returning zero scores");
                ScoreCard {
                    summary: truncate_chars(raw.trim(), SUMMARY_FALLBACK_CHARS).to_string(),
                    ..ScoreCard::default()
                }
            }
        }
    }
}

/// Integers and floats (rounded) are accepted and clamped to 0–5; anything else is 0.
fn rubric_value(value: &Value) -> u8 {
    let n = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .unwrap_or(0.0);
    n.round().clamp(0.0, f64::from(MAX_RUBRIC_SCORE)) as u8
}

pub struct TechInterviewer {
    base: InterviewPersona,
}

impl TechInterviewer {
    pub fn new(config: PersonaConfig, llm: Arc<dyn ChatCompletion>) -> Self {
        Self {
            base: InterviewPersona::new(config, llm),
        }
    }
}

#[async_trait]
impl Persona for TechInterviewer {
    fn config(&self) -> &PersonaConfig {
        self.base.config()
    }

    async fn ask_question(&self, context: &str) -> Result<String, LlmError> {
        let hints = QuestionHints::from_context(context);
        self.base
            .ask_with_hints(context, &hints.to_prompt_line())
            .await
    }

    async fn evaluate(&self, question: &str, answer: &str) -> Result<String, LlmError> {
        self.base.evaluate(question, answer).await
    }

    fn as_probing(&self) -> Option<&dyn ProbingPersona> {
        Some(self)
    }
}

#[async_trait]
impl ProbingPersona for TechInterviewer {
    async fn follow_up(&self, question: &str, answer: &str) -> Result<String, LlmError> {
        let prompt = fill_template(
            FOLLOW_UP_PROMPT_TEMPLATE,
            &[("question", question), ("answer", answer)],
        );
        self.base
            .call(prompt, FOLLOW_UP_MAX_TOKENS, FOLLOW_UP_TEMPERATURE)
            .await
    }

    async fn score(&self, question: &str, answer: &str) -> Result<ScoreCard, LlmError> {
        let prompt = fill_template(
            SCORE_PROMPT_TEMPLATE,
            &[("question", question), ("answer", answer)],
        );
        let raw = self
            .base
            .call(prompt, SCORE_MAX_TOKENS, SCORE_TEMPERATURE)
            .await?;
        Ok(ScoreCard::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personas::testing::SpyLlm;

    fn tech(llm: Arc<SpyLlm>) -> TechInterviewer {
        TechInterviewer::new(PersonaConfig::tech(), llm)
    }

    #[test]
    fn test_difficulty_and_hints_from_context() {
        let context = "Senior DS role [hard] topic:causal domain:healthcare, remote";
        assert_eq!(extract_difficulty(context), Difficulty::Hard);

        let hints = extract_hints(context);
        assert_eq!(
            hints,
            vec![
                Hint {
                    key: "topic".to_string(),
                    value: "causal".to_string()
                },
                Hint {
                    key: "domain".to_string(),
                    value: "healthcare".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_difficulty_defaults_to_medium() {
        assert_eq!(extract_difficulty("backend role, no tags"), Difficulty::Medium);
    }

    #[test]
    fn test_difficulty_tags_case_insensitive() {
        assert_eq!(extract_difficulty("Junior [EASY] role"), Difficulty::Easy);
        assert_eq!(extract_difficulty("[Hard] then [easy]"), Difficulty::Hard);
    }

    #[test]
    fn test_hints_ignore_unknown_keys_and_strip_punctuation() {
        let hints = extract_hints("Stack:Rust. metadata:x color:blue FRAMEWORK:axum; mlops:");
        let pairs: Vec<(&str, &str)> = hints
            .iter()
            .map(|h| (h.key.as_str(), h.value.as_str()))
            .collect();
        assert_eq!(pairs, vec![("stack", "Rust"), ("framework", "axum")]);
    }

    #[test]
    fn test_hint_line_format() {
        let hints = QuestionHints::from_context("[hard] topic:causal domain:healthcare");
        let line = hints.to_prompt_line();
        assert_eq!(line, "Hints: difficulty=hard; topic=causal; domain=healthcare\n");
    }

    #[tokio::test]
    async fn test_ask_folds_hints_into_prompt() {
        let llm = SpyLlm::replying(&["How would you validate a causal estimate?"]);
        let persona = tech(llm.clone());
        persona
            .ask_question("[hard] topic:causal domain:healthcare")
            .await
            .unwrap();

        let (messages, _) = llm.last_call();
        assert!(messages[1]
            .content
            .contains("Hints: difficulty=hard; topic=causal; domain=healthcare"));
    }

    #[tokio::test]
    async fn test_follow_up_uses_small_budget() {
        let llm = SpyLlm::replying(&["What happens when the cache node fails?"]);
        let persona = tech(llm.clone());
        let question = persona
            .follow_up("Design a cache.", "Use Redis.")
            .await
            .unwrap();
        assert_eq!(question, "What happens when the cache node fails?");

        let (messages, params) = llm.last_call();
        assert!(messages[1].content.contains("weakest area"));
        assert_eq!(params.max_tokens, Some(80));
        assert!((params.temperature - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_score_parses_json() {
        let llm = SpyLlm::replying(&[
            r#"{"depth": 4, "correctness": 5, "tradeoffs": 2, "communication": 3, "summary": "Solid, misses trade-offs."}"#,
        ]);
        let card = tech(llm).score("q", "a").await.unwrap();
        assert_eq!(
            card,
            ScoreCard {
                depth: 4,
                correctness: 5,
                tradeoffs: 2,
                communication: 3,
                summary: "Solid, misses trade-offs.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_score_not_json_degrades_to_zero() {
        let llm = SpyLlm::replying(&["not json"]);
        let card = tech(llm).score("q", "a").await.unwrap();
        assert_eq!(
            card,
            ScoreCard {
                summary: "not json".to_string(),
                ..ScoreCard::default()
            }
        );
    }

    #[test]
    fn test_score_missing_fields_default() {
        let card = ScoreCard::parse(r#"{"depth": 3}"#);
        assert_eq!(card.depth, 3);
        assert_eq!(card.correctness, 0);
        assert_eq!(card.tradeoffs, 0);
        assert_eq!(card.communication, 0);
        assert_eq!(card.summary, "");
    }

    #[test]
    fn test_score_fenced_floats_and_out_of_range() {
        let card = ScoreCard::parse(
            "```json\n{\"depth\": 3.6, \"correctness\": 9, \"tradeoffs\": -2, \"communication\": \"4\", \"summary\": \"ok\"}\n```",
        );
        assert_eq!(card.depth, 4);
        assert_eq!(card.correctness, 5);
        assert_eq!(card.tradeoffs, 0);
        assert_eq!(card.communication, 4);
    }

    #[test]
    fn test_score_fallback_summary_truncated() {
        let raw = "word ".repeat(100);
        let card = ScoreCard::parse(&raw);
        assert_eq!(card.summary.chars().count(), 120);
        assert_eq!(card.depth, 0);
    }

    #[test]
    fn test_tech_exposes_probing_capability() {
        let persona = tech(SpyLlm::replying(&[]));
        assert!(persona.as_probing().is_some());
    }
}
