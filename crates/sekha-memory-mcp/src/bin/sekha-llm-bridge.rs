use std::io;
use std::sync::Arc;

use sekha_memory_llm::{BridgeService, LlmBridge, OllamaRuntime};
use sekha_memory_mcp::logging::init_tracing;
use sekha_memory_mcp::ServerConfig;
use tracing::{info, warn};

fn main() -> io::Result<()> {
    let config = ServerConfig::from_env();
    init_tracing(&config.log_filter);

    let runtime = OllamaRuntime::new(config.ollama.clone())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    let bridge = LlmBridge::new(Arc::new(runtime), config.models.clone());
    let service = BridgeService::new(bridge)?;

    info!(
        ollama = %config.ollama.base_url,
        embed_model = %config.models.embed,
        summarize_model = %config.models.summarize,
        "starting llm bridge"
    );
    let health = service.block_on(service.bridge().health());
    if health.is_healthy() {
        info!(models = health.model_count, "connected to ollama");
    } else {
        warn!("ollama is unreachable; llm bridge starts in degraded mode");
    }

    service.serve_http(&config.bridge_addr)
}
