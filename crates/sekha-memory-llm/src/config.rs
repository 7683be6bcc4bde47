use std::time::Duration;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_SUMMARIZE_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_IMPORTANCE_MODEL: &str = "llama3.1:8b";

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub health_timeout: Duration,
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_HOST)
    }
}

/// Models used when a bridge call does not name one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeModels {
    pub embed: String,
    pub summarize: String,
    pub importance: String,
}

impl Default for BridgeModels {
    fn default() -> Self {
        Self {
            embed: DEFAULT_EMBED_MODEL.to_string(),
            summarize: DEFAULT_SUMMARIZE_MODEL.to_string(),
            importance: DEFAULT_IMPORTANCE_MODEL.to_string(),
        }
    }
}
