use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::BridgeModels;
use crate::error::BridgeError;
use crate::traits::LlmRuntime;
use crate::types::{
    BRIDGE_VERSION, BridgeHealth, EmbedResult, EntityExtraction, ImportanceScore, SummaryLevel,
    SummaryResult,
};

pub const MAX_EMBED_CHARS: usize = 100_000;
pub const MAX_SUMMARY_MESSAGES: usize = 1_000;
pub const MIN_SUMMARY_WORDS: u32 = 50;
pub const MAX_SUMMARY_WORDS: u32 = 2_000;
pub const DEFAULT_SUMMARY_WORDS: u32 = 200;
pub const MAX_SCORED_MESSAGE_CHARS: usize = 10_000;
pub const MAX_ENTITY_TEXT_CHARS: usize = 50_000;
pub const DEFAULT_ENTITY_TYPES: [&str; 4] = ["person", "org", "project", "deadline"];

pub const FALLBACK_IMPORTANCE: f64 = 5.0;
pub const FALLBACK_REASONING: &str = "LLM parsing failed, using default";

/// Orchestrates prompts against a local runtime. Holds no per-call state.
#[derive(Clone)]
pub struct LlmBridge {
    runtime: Arc<dyn LlmRuntime>,
    models: BridgeModels,
}

impl LlmBridge {
    pub fn new(runtime: Arc<dyn LlmRuntime>, models: BridgeModels) -> Self {
        Self { runtime, models }
    }

    pub fn models(&self) -> &BridgeModels {
        &self.models
    }

    pub async fn embed(&self, text: &str, model: Option<&str>) -> Result<EmbedResult, BridgeError> {
        check_len("text", text, MAX_EMBED_CHARS)?;
        let model = pick_model(model, &self.models.embed);
        let embedding = self.runtime.embed(&model, text).await?;
        Ok(EmbedResult {
            embedding,
            model,
            tokens_used: estimate_tokens(text),
        })
    }

    pub async fn summarize(
        &self,
        messages: &[String],
        level: SummaryLevel,
        model: Option<&str>,
        max_words: u32,
    ) -> Result<SummaryResult, BridgeError> {
        if messages.is_empty() {
            return Err(BridgeError::validation("messages", "must not be empty"));
        }
        if messages.len() > MAX_SUMMARY_MESSAGES {
            return Err(BridgeError::validation(
                "messages",
                format!("at most {MAX_SUMMARY_MESSAGES} messages per summary"),
            ));
        }
        if !(MIN_SUMMARY_WORDS..=MAX_SUMMARY_WORDS).contains(&max_words) {
            return Err(BridgeError::validation(
                "max_words",
                format!("must be between {MIN_SUMMARY_WORDS} and {MAX_SUMMARY_WORDS}"),
            ));
        }
        let model = pick_model(model, &self.models.summarize);
        let prompt = summary_prompt(messages, level, max_words);
        let raw = self.runtime.generate(&model, &prompt).await?;
        let summary = raw.trim().to_string();
        info!(summary_level = level.as_str(), %model, inputs = messages.len(), "summary generated");
        Ok(SummaryResult {
            tokens_used: estimate_tokens(&summary),
            summary,
            level,
            model,
        })
    }

    /// Scores a message from 1 to 10. Model output that is not the requested JSON shape
    /// yields [`FALLBACK_IMPORTANCE`] instead of an error.
    pub async fn score_importance(
        &self,
        message: &str,
        context: Option<&str>,
        model: Option<&str>,
    ) -> Result<ImportanceScore, BridgeError> {
        check_len("message", message, MAX_SCORED_MESSAGE_CHARS)?;
        let model = pick_model(model, &self.models.importance);
        let prompt = importance_prompt(message, context);
        let raw = self.runtime.generate(&model, &prompt).await?;

        match parse_importance(&raw) {
            Some((score, reasoning)) => Ok(ImportanceScore {
                score,
                reasoning,
                model,
            }),
            None => {
                warn!(%model, output = %raw, "importance output was not valid JSON");
                Ok(ImportanceScore {
                    score: FALLBACK_IMPORTANCE,
                    reasoning: Some(FALLBACK_REASONING.to_string()),
                    model,
                })
            }
        }
    }

    /// Returns one list per requested type. No extraction is run yet, so every list is
    /// empty; an empty `entity_types` means the default set.
    pub async fn extract_entities(
        &self,
        text: &str,
        entity_types: &[String],
        model: Option<&str>,
    ) -> Result<EntityExtraction, BridgeError> {
        check_len("text", text, MAX_ENTITY_TEXT_CHARS)?;
        let model = pick_model(model, &self.models.summarize);
        let entities: BTreeMap<String, Vec<String>> = if entity_types.is_empty() {
            DEFAULT_ENTITY_TYPES
                .iter()
                .map(|t| ((*t).to_string(), Vec::new()))
                .collect()
        } else {
            entity_types
                .iter()
                .map(|t| (t.clone(), Vec::new()))
                .collect()
        };
        Ok(EntityExtraction { entities, model })
    }

    pub async fn health(&self) -> BridgeHealth {
        match self.runtime.list_models().await {
            Ok(models) => BridgeHealth {
                status: "healthy",
                ollama_healthy: true,
                model_count: models.len(),
                version: BRIDGE_VERSION,
            },
            Err(err) => {
                warn!(runtime = self.runtime.name(), error = %err, "llm runtime unreachable");
                BridgeHealth {
                    status: "degraded",
                    ollama_healthy: false,
                    model_count: 0,
                    version: BRIDGE_VERSION,
                }
            }
        }
    }
}

fn check_len(field: &'static str, text: &str, max: usize) -> Result<(), BridgeError> {
    let chars = text.chars().count();
    if chars == 0 {
        return Err(BridgeError::validation(field, "must not be empty"));
    }
    if chars > max {
        return Err(BridgeError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

fn pick_model(requested: Option<&str>, default: &str) -> String {
    requested
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Rough estimate: one token per four characters.
fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

fn summary_prompt(messages: &[String], level: SummaryLevel, max_words: u32) -> String {
    let items = messages
        .iter()
        .map(|m| format!("- {m}"))
        .collect::<Vec<_>>()
        .join("\n");
    let (instructions, heading) = match level {
        SummaryLevel::Daily => (
            "Summarize these messages from the past day.\nFocus on key decisions, TODOs, and insights.",
            "Messages",
        ),
        SummaryLevel::Weekly => (
            "Synthesize these daily summaries from the past week.\nIdentify themes, progress, and blockers.",
            "Summaries",
        ),
        SummaryLevel::Monthly => (
            "Create an executive summary for the month.\nHighlight achievements, learnings, and strategic direction.",
            "Weekly summaries",
        ),
    };
    format!("{instructions}\nMaximum {max_words} words.\n\n{heading}:\n{items}")
}

fn importance_prompt(message: &str, context: Option<&str>) -> String {
    let context_line = context
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("\nContext: {c}"))
        .unwrap_or_default();
    format!(
        "Rate the importance of this message on a scale of 1-10.\n\
         Consider: Does it contain decisions, action items, key insights, or\n\
         critical information? Provide a brief reasoning.\n\n\
         Message: {message}{context_line}\n\n\
         Respond in JSON format:\n\
         {{\"score\": number, \"reasoning\": \"explanation\"}}"
    )
}

/// Accepts either a bare JSON object or one embedded in surrounding prose/code fences.
/// The score must be a number (or numeric string) within 1..=10.
fn parse_importance(raw: &str) -> Option<(f64, Option<String>)> {
    let trimmed = raw.trim();
    let value = serde_json::from_str::<Value>(trimmed).ok().or_else(|| {
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        let candidate = trimmed.get(start..=end)?;
        serde_json::from_str::<Value>(candidate).ok()
    })?;

    let score = match value.get("score")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !score.is_finite() || !(1.0..=10.0).contains(&score) {
        return None;
    }
    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some((score, reasoning))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::RuntimeError;

    #[derive(Default)]
    struct ScriptedRuntime {
        completion: String,
        prompts: Mutex<Vec<(String, String)>>,
        fail_tags: bool,
    }

    impl ScriptedRuntime {
        fn answering(completion: &str) -> Self {
            Self {
                completion: completion.to_string(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl LlmRuntime for ScriptedRuntime {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn embed(&self, model: &str, _input: &str) -> Result<Vec<f32>, RuntimeError> {
            self.prompts
                .lock()
                .expect("lock")
                .push((model.to_string(), String::new()));
            Ok(vec![0.1, 0.2, 0.3])
        }

        async fn generate(&self, model: &str, prompt: &str) -> Result<String, RuntimeError> {
            self.prompts
                .lock()
                .expect("lock")
                .push((model.to_string(), prompt.to_string()));
            Ok(self.completion.clone())
        }

        async fn list_models(&self) -> Result<Vec<String>, RuntimeError> {
            if self.fail_tags {
                return Err(RuntimeError::InvalidResponse("down".to_string()));
            }
            Ok(vec!["a".to_string(), "b".to_string()])
        }
    }

    fn bridge(runtime: Arc<ScriptedRuntime>) -> LlmBridge {
        LlmBridge::new(runtime, BridgeModels::default())
    }

    #[tokio::test]
    async fn embed_estimates_tokens_and_uses_default_model() {
        let rt = Arc::new(ScriptedRuntime::default());
        let out = bridge(rt.clone()).embed("abcdefghij", None).await.expect("embed");
        assert_eq!(out.tokens_used, 2);
        assert_eq!(out.model, BridgeModels::default().embed);
        assert_eq!(out.embedding.len(), 3);

        let err = bridge(rt).embed("", None).await;
        assert!(matches!(err, Err(BridgeError::Validation { field: "text", .. })));
    }

    #[tokio::test]
    async fn summarize_builds_level_prompt_and_trims() {
        let rt = Arc::new(ScriptedRuntime::answering("  short summary \n"));
        let b = bridge(rt.clone());
        let out = b
            .summarize(
                &["shipped v2".to_string(), "fixed login".to_string()],
                SummaryLevel::Weekly,
                Some("custom"),
                DEFAULT_SUMMARY_WORDS,
            )
            .await
            .expect("summary");
        assert_eq!(out.summary, "short summary");
        assert_eq!(out.tokens_used, 3);
        assert_eq!(out.model, "custom");

        let prompts = rt.prompts.lock().expect("lock");
        let (_, prompt) = &prompts[0];
        assert!(prompt.starts_with("Synthesize these daily summaries"));
        assert!(prompt.contains("Maximum 200 words."));
        assert!(prompt.contains("Summaries:\n- shipped v2\n- fixed login"));
    }

    #[tokio::test]
    async fn summarize_rejects_out_of_range_word_budget() {
        let b = bridge(Arc::new(ScriptedRuntime::default()));
        let msgs = vec!["x".to_string()];
        let err = b.summarize(&msgs, SummaryLevel::Daily, None, 49).await;
        assert!(matches!(
            err,
            Err(BridgeError::Validation {
                field: "max_words",
                ..
            })
        ));
        let err = b.summarize(&[], SummaryLevel::Daily, None, 200).await;
        assert!(matches!(
            err,
            Err(BridgeError::Validation {
                field: "messages",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn importance_parses_json_answer() {
        let rt = Arc::new(ScriptedRuntime::answering(
            r#"{"score": 8, "reasoning": "contains a deadline"}"#,
        ));
        let out = bridge(rt.clone())
            .score_importance("ship by friday", Some("release planning"), None)
            .await
            .expect("score");
        assert_eq!(out.score, 8.0);
        assert_eq!(out.reasoning.as_deref(), Some("contains a deadline"));
        let prompts = rt.prompts.lock().expect("lock");
        assert!(prompts[0].1.contains("Message: ship by friday\nContext: release planning"));
    }

    #[tokio::test]
    async fn importance_falls_back_on_unparsable_output() {
        let rt = Arc::new(ScriptedRuntime::answering("I think it is quite important."));
        let out = bridge(rt)
            .score_importance("hello", None, None)
            .await
            .expect("score");
        assert_eq!(out.score, FALLBACK_IMPORTANCE);
        assert_eq!(out.reasoning.as_deref(), Some(FALLBACK_REASONING));
    }

    #[test]
    fn importance_parser_handles_fences_and_ranges() {
        let fenced = "```json\n{\"score\": \"7.5\", \"reasoning\": \"ok\"}\n```";
        assert_eq!(parse_importance(fenced), Some((7.5, Some("ok".to_string()))));
        assert_eq!(parse_importance(r#"{"score": 11}"#), None);
        assert_eq!(parse_importance(r#"{"reasoning": "no score"}"#), None);
    }

    #[tokio::test]
    async fn entities_default_to_empty_lists() {
        let b = bridge(Arc::new(ScriptedRuntime::default()));
        let out = b.extract_entities("Alice from Acme", &[], None).await.expect("entities");
        let keys: Vec<_> = out.entities.keys().cloned().collect();
        assert_eq!(keys, vec!["deadline", "org", "person", "project"]);
        assert!(out.entities.values().all(Vec::is_empty));

        let custom = b
            .extract_entities("text", &["topic".to_string()], None)
            .await
            .expect("entities");
        assert_eq!(custom.entities.len(), 1);
    }

    #[tokio::test]
    async fn health_reports_degraded_when_runtime_is_down() {
        let ok = bridge(Arc::new(ScriptedRuntime::default())).health().await;
        assert_eq!(ok.status, "healthy");
        assert_eq!(ok.model_count, 2);

        let down = bridge(Arc::new(ScriptedRuntime {
            fail_tags: true,
            ..ScriptedRuntime::default()
        }))
        .health()
        .await;
        assert_eq!(down.status, "degraded");
        assert!(!down.ollama_healthy);
        assert_eq!(down.model_count, 0);
    }
}
