use std::time::Duration;

use sekha_memory_controller::{ApiSurface, ControllerConfig, DEFAULT_CONTROLLER_URL};
use sekha_memory_llm::{BridgeModels, OllamaConfig, DEFAULT_BRIDGE_ADDR, DEFAULT_OLLAMA_HOST};

pub const DEFAULT_SERVER_NAME: &str = "sekha-memory";
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const MIN_REQUEST_TIMEOUT_SECS: u64 = 1;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Process-wide settings, read once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_name: String,
    pub server_version: String,
    pub controller: ControllerConfig,
    pub ollama: OllamaConfig,
    pub models: BridgeModels,
    /// Listen address of the `sekha-llm-bridge` HTTP service.
    pub bridge_addr: String,
    pub log_filter: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut controller = ControllerConfig::new(
            var("SEKHA_CONTROLLER_URL").unwrap_or_else(|| DEFAULT_CONTROLLER_URL.to_string()),
            var("SEKHA_CONTROLLER_API_KEY").unwrap_or_default(),
        );
        controller.timeout = Duration::from_secs(clamped_u64(
            var("SEKHA_REQUEST_TIMEOUT_SECS").as_deref(),
            DEFAULT_REQUEST_TIMEOUT_SECS,
            MIN_REQUEST_TIMEOUT_SECS,
            MAX_REQUEST_TIMEOUT_SECS,
        ));
        controller.surface = var("SEKHA_CONTROLLER_SURFACE")
            .and_then(|raw| ApiSurface::parse(&raw))
            .unwrap_or_default();

        let ollama =
            OllamaConfig::new(var("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()));
        let defaults = BridgeModels::default();
        let models = BridgeModels {
            embed: var("SEKHA_EMBED_MODEL").unwrap_or(defaults.embed),
            summarize: var("SEKHA_SUMMARIZE_MODEL").unwrap_or(defaults.summarize),
            importance: var("SEKHA_IMPORTANCE_MODEL").unwrap_or(defaults.importance),
        };

        Self {
            server_name: var("SEKHA_SERVER_NAME").unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            controller,
            ollama,
            models,
            bridge_addr: var("SEKHA_BRIDGE_ADDR").unwrap_or_else(|| DEFAULT_BRIDGE_ADDR.to_string()),
            log_filter: var("SEKHA_LOG_LEVEL")
                .or_else(|| var("RUST_LOG"))
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn clamped_u64(raw: Option<&str>, default: u64, min: u64, max: u64) -> u64 {
    raw.and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}
