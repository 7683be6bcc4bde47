use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const BRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Granularity of a hierarchical summary. Each level consumes the output of the one
/// below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLevel {
    Daily,
    Weekly,
    Monthly,
}

impl SummaryLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedResult {
    pub embedding: Vec<f32>,
    pub model: String,
    pub tokens_used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResult {
    pub summary: String,
    pub level: SummaryLevel,
    pub model: String,
    pub tokens_used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceScore {
    pub score: f64,
    pub reasoning: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityExtraction {
    pub entities: BTreeMap<String, Vec<String>>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeHealth {
    pub status: &'static str,
    pub ollama_healthy: bool,
    pub model_count: usize,
    pub version: &'static str,
}

impl BridgeHealth {
    pub fn is_healthy(&self) -> bool {
        self.ollama_healthy
    }
}
