//! Orchestrator — owns the persona panel and decides who speaks next.
//!
//! Rotation: `order[cursor]` answers each `ask`, then the cursor advances modulo
//! `order.len()`. The cursor is the only mutable state and lives behind a mutex so
//! concurrent callers each get a distinct turn. The lock is never held across a model call.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::llm_client::{ChatCompletion, LlmError};
use crate::personas::{
    InterviewPersona, Persona, PersonaConfig, ProbingPersona, ScoreCard, TechInterviewer,
};

pub const DEFAULT_ROTATION: &[&str] = &["tech", "hr", "mentor"];

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Unknown persona: {0}")]
    UnknownPersona(String),

    #[error("Invalid rotation: {0}")]
    InvalidRotation(String),

    #[error("Persona '{0}' does not support follow-up questions or scoring")]
    UnsupportedCapability(String),

    #[error("Persona key registered twice: {0}")]
    DuplicatePersona(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskOutcome {
    pub persona: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluateOutcome {
    pub persona: String,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreOutcome {
    pub persona: String,
    pub score: ScoreCard,
}

/// Point-in-time copy of the rotation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationSnapshot {
    pub order: Vec<String>,
    pub cursor: usize,
}

#[derive(Debug)]
struct Rotation {
    order: Vec<String>,
    /// Always `< order.len()`.
    cursor: usize,
}

impl Rotation {
    fn advance(&mut self) -> String {
        let key = self.order[self.cursor % self.order.len()].clone();
        self.cursor = (self.cursor + 1) % self.order.len();
        key
    }
}

pub struct Orchestrator {
    /// Registration order is preserved for `list_personas`.
    personas: Vec<(String, Arc<dyn Persona>)>,
    rotation: Mutex<Rotation>,
}

impl Orchestrator {
    /// Builds an orchestrator over an explicit panel. Keys must be unique and `order`
    /// is validated like `set_rotation_order`.
    pub fn new(
        personas: Vec<(String, Arc<dyn Persona>)>,
        order: Vec<String>,
    ) -> Result<Self, OrchestratorError> {
        for (i, (key, _)) in personas.iter().enumerate() {
            if personas[..i].iter().any(|(k, _)| k == key) {
                return Err(OrchestratorError::DuplicatePersona(key.clone()));
            }
        }
        validate_order(&personas, &order)?;
        Ok(Self {
            personas,
            rotation: Mutex::new(Rotation { order, cursor: 0 }),
        })
    }

    /// Registered keys in registration order.
    pub fn list_personas(&self) -> Vec<String> {
        self.personas.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn persona_configs(&self) -> Vec<(String, PersonaConfig)> {
        self.personas
            .iter()
            .map(|(k, p)| (k.clone(), p.config().clone()))
            .collect()
    }

    fn persona(&self, key: &str) -> Result<&Arc<dyn Persona>, OrchestratorError> {
        lookup(&self.personas, key)
    }

    fn probing(&self, key: &str) -> Result<&dyn ProbingPersona, OrchestratorError> {
        self.persona(key)?
            .as_probing()
            .ok_or_else(|| OrchestratorError::UnsupportedCapability(key.to_string()))
    }

    /// Picks the next persona by rotation and has it ask one question.
    /// The cursor advances even if the model call later fails.
    pub async fn ask(&self, context: &str) -> Result<AskOutcome, OrchestratorError> {
        let key = self.rotation.lock().await.advance();
        debug!("Rotation selected persona '{key}'");

        let question = self.persona(&key)?.ask_question(context).await?;
        Ok(AskOutcome {
            persona: key,
            question,
        })
    }

    /// Routes to the named persona; unrelated to whichever persona last asked.
    pub async fn evaluate(
        &self,
        persona: &str,
        question: &str,
        answer: &str,
    ) -> Result<EvaluateOutcome, OrchestratorError> {
        let feedback = self.persona(persona)?.evaluate(question, answer).await?;
        Ok(EvaluateOutcome {
            persona: persona.to_string(),
            feedback,
        })
    }

    pub async fn follow_up(
        &self,
        persona: &str,
        question: &str,
        answer: &str,
    ) -> Result<AskOutcome, OrchestratorError> {
        let question = self.probing(persona)?.follow_up(question, answer).await?;
        Ok(AskOutcome {
            persona: persona.to_string(),
            question,
        })
    }

    pub async fn score(
        &self,
        persona: &str,
        question: &str,
        answer: &str,
    ) -> Result<ScoreOutcome, OrchestratorError> {
        let score = self.probing(persona)?.score(question, answer).await?;
        Ok(ScoreOutcome {
            persona: persona.to_string(),
            score,
        })
    }

    /// Replaces the order and restarts from its first entry. On error nothing changes.
    pub async fn set_rotation_order(&self, order: Vec<String>) -> Result<(), OrchestratorError> {
        validate_order(&self.personas, &order)?;
        let mut rotation = self.rotation.lock().await;
        info!("Rotation order set to {:?}", order);
        rotation.order = order;
        rotation.cursor = 0;
        Ok(())
    }

    pub async fn reset_rotation(&self) {
        self.rotation.lock().await.cursor = 0;
    }

    pub async fn rotation(&self) -> RotationSnapshot {
        let rotation = self.rotation.lock().await;
        RotationSnapshot {
            order: rotation.order.clone(),
            cursor: rotation.cursor,
        }
    }
}

/// The standard tech / hr / mentor panel, all sharing one client.
pub fn default_panel(llm: Arc<dyn ChatCompletion>) -> Vec<(String, Arc<dyn Persona>)> {
    vec![
        entry("tech", TechInterviewer::new(PersonaConfig::tech(), llm.clone())),
        entry("hr", InterviewPersona::new(PersonaConfig::hr(), llm.clone())),
        entry("mentor", InterviewPersona::new(PersonaConfig::mentor(), llm)),
    ]
}

pub fn default_rotation() -> Vec<String> {
    DEFAULT_ROTATION.iter().map(|k| k.to_string()).collect()
}

pub fn entry(key: &str, persona: impl Persona + 'static) -> (String, Arc<dyn Persona>) {
    let persona: Arc<dyn Persona> = Arc::new(persona);
    (key.to_string(), persona)
}

fn lookup<'a>(
    personas: &'a [(String, Arc<dyn Persona>)],
    key: &str,
) -> Result<&'a Arc<dyn Persona>, OrchestratorError> {
    personas
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, p)| p)
        .ok_or_else(|| OrchestratorError::UnknownPersona(key.to_string()))
}

/// Non-empty, and every key must be registered.
fn validate_order(
    personas: &[(String, Arc<dyn Persona>)],
    order: &[String],
) -> Result<(), OrchestratorError> {
    if order.is_empty() {
        return Err(OrchestratorError::InvalidRotation(
            "rotation order cannot be empty".to_string(),
        ));
    }
    if let Some(unknown) = order.iter().find(|k| lookup(personas, k).is_err()) {
        return Err(OrchestratorError::InvalidRotation(format!(
            "unknown persona key in rotation: {unknown}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::personas::testing::SpyLlm;

    fn panel(llm: Arc<SpyLlm>) -> Orchestrator {
        Orchestrator::new(default_panel(llm), default_rotation()).unwrap()
    }

    fn keys(order: &[&str]) -> Vec<String> {
        order.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_rotation_cycles_in_order() {
        let orch = panel(SpyLlm::replying(&[]));
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(orch.ask("ctx").await.unwrap().persona);
        }
        assert_eq!(seen, keys(&["tech", "hr", "mentor", "tech"]));
    }

    #[tokio::test]
    async fn test_reset_rotation_restarts_at_first_key() {
        let orch = panel(SpyLlm::replying(&[]));
        orch.ask("ctx").await.unwrap();
        orch.ask("ctx").await.unwrap();
        orch.reset_rotation().await;
        assert_eq!(orch.ask("ctx").await.unwrap().persona, "tech");
    }

    #[tokio::test]
    async fn test_set_rotation_order_empty_is_rejected_without_side_effects() {
        let orch = panel(SpyLlm::replying(&[]));
        orch.ask("ctx").await.unwrap();
        let before = orch.rotation().await;

        let err = orch.set_rotation_order(vec![]).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidRotation(_)));
        assert_eq!(orch.rotation().await, before);
        assert_eq!(orch.ask("ctx").await.unwrap().persona, "hr");
    }

    #[tokio::test]
    async fn test_set_rotation_order_unknown_key_is_rejected() {
        let orch = panel(SpyLlm::replying(&[]));
        let err = orch
            .set_rotation_order(keys(&["tech", "recruiter"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::InvalidRotation(msg) if msg.contains("recruiter")
        ));
    }

    #[tokio::test]
    async fn test_set_rotation_order_replaces_and_resets_cursor() {
        let orch = panel(SpyLlm::replying(&[]));
        orch.ask("ctx").await.unwrap();
        orch.set_rotation_order(keys(&["mentor", "mentor", "hr"]))
            .await
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(orch.ask("ctx").await.unwrap().persona);
        }
        assert_eq!(seen, keys(&["mentor", "mentor", "hr", "mentor"]));
    }

    #[tokio::test]
    async fn test_evaluate_does_not_advance_rotation() {
        let orch = panel(SpyLlm::replying(&[]));
        orch.evaluate("mentor", "q", "a").await.unwrap();
        orch.evaluate("hr", "q", "a").await.unwrap();
        assert_eq!(orch.ask("ctx").await.unwrap().persona, "tech");
    }

    #[tokio::test]
    async fn test_evaluate_unknown_persona() {
        let llm = SpyLlm::replying(&[]);
        let orch = panel(llm.clone());
        let err = orch.evaluate("recruiter", "q", "a").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownPersona(k) if k == "recruiter"));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_returns_feedback_for_named_persona() {
        let orch = panel(SpyLlm::replying(&["- clear structure"]));
        let outcome = orch.evaluate("hr", "q", "a").await.unwrap();
        assert_eq!(
            outcome,
            EvaluateOutcome {
                persona: "hr".to_string(),
                feedback: "- clear structure".to_string(),
            }
        );
    }

    #[test]
    fn test_list_personas_in_registration_order() {
        let orch = panel(SpyLlm::replying(&[]));
        assert_eq!(orch.list_personas(), keys(&["tech", "hr", "mentor"]));
    }

    #[tokio::test]
    async fn test_probing_capability_only_on_tech() {
        let orch = panel(SpyLlm::replying(&["not json"]));
        let outcome = orch.score("tech", "q", "a").await.unwrap();
        assert_eq!(outcome.score.summary, "not json");

        let err = orch.follow_up("hr", "q", "a").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnsupportedCapability(k) if k == "hr"));
    }

    #[tokio::test]
    async fn test_llm_failure_surfaces_distinctly() {
        let orch = panel(SpyLlm::failing(LlmError::Timeout {
            attempts: 4,
        }));
        let err = orch.ask("ctx").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Llm(LlmError::Timeout { .. })));
    }

    #[test]
    fn test_new_rejects_invalid_initial_order() {
        let llm = SpyLlm::replying(&[]);
        let personas = vec![entry("hr", InterviewPersona::new(PersonaConfig::hr(), llm))];
        assert!(matches!(
            Orchestrator::new(personas, keys(&["tech"])),
            Err(OrchestratorError::InvalidRotation(_))
        ));
    }

    #[test]
    fn test_new_rejects_duplicate_keys() {
        let llm = SpyLlm::replying(&[]);
        let personas = vec![
            entry("hr", InterviewPersona::new(PersonaConfig::hr(), llm.clone())),
            entry("hr", InterviewPersona::new(PersonaConfig::mentor(), llm)),
        ];
        match Orchestrator::new(personas, keys(&["hr"])) {
            Err(OrchestratorError::DuplicatePersona(key)) => assert_eq!(key, "hr"),
            Err(other) => panic!("expected DuplicatePersona, got {other:?}"),
            Ok(_) => panic!("expected DuplicatePersona, got Ok"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_asks_get_distinct_turns() {
        let orch = Arc::new(panel(SpyLlm::replying(&[])));
        let mut handles = Vec::new();
        for _ in 0..30 {
            let orch = orch.clone();
            handles.push(tokio::spawn(async move { orch.ask("ctx").await.unwrap().persona }));
        }

        let mut counts = std::collections::HashMap::new();
        for handle in handles {
            *counts.entry(handle.await.unwrap()).or_insert(0) += 1;
        }
        let personas: HashSet<_> = counts.keys().cloned().collect();
        assert_eq!(personas.len(), 3);
        assert!(counts.values().all(|&n| n == 10));
        assert_eq!(orch.rotation().await.cursor, 0);
    }
}
