use std::io;
use std::sync::Arc;

use sekha_memory_controller::HttpControllerGateway;
use sekha_memory_llm::{LlmBridge, OllamaRuntime};
use sekha_memory_mcp::{McpServer, ServerConfig};
use sekha_memory_mcp::logging::init_tracing;
use tracing::{info, warn};

fn main() -> io::Result<()> {
    let config = ServerConfig::from_env();
    init_tracing(&config.log_filter);

    let gateway = HttpControllerGateway::new(config.controller.clone())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    let server = McpServer::new(&config, Arc::new(gateway.clone()))?;

    info!(
        server = %config.server_name,
        version = %config.server_version,
        controller = %config.controller.base_url,
        surface = config.controller.surface.label(),
        "starting MCP server"
    );
    if config.controller.api_key.is_empty() {
        warn!("SEKHA_CONTROLLER_API_KEY is not set; controller requests carry an empty bearer token");
    }

    let health = server.block_on(gateway.check_health());
    if health.is_healthy() {
        info!(controller = %health.controller_url, "controller is healthy");
    } else {
        warn!(
            status = health.status,
            error = health.error.as_deref().unwrap_or(""),
            "controller is not healthy; tool calls will report failures until it recovers"
        );
    }

    match OllamaRuntime::new(config.ollama.clone()) {
        Ok(runtime) => {
            let bridge = LlmBridge::new(Arc::new(runtime), config.models.clone());
            let llm = server.block_on(bridge.health());
            info!(
                status = llm.status,
                models = llm.model_count,
                host = %config.ollama.base_url,
                "local LLM runtime probed"
            );
        }
        Err(err) => warn!(error = %err, "local LLM runtime is misconfigured"),
    }

    server.serve_stdio()
}
