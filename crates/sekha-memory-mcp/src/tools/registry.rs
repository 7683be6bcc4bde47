use std::sync::Arc;

use sekha_memory_controller::ControllerGateway;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::format::ToolOutput;
use super::{handlers, schemas};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    Store,
    Search,
    Update,
    GetContext,
    Prune,
    Export,
    Stats,
}

impl ToolName {
    pub const ALL: [Self; 7] = [
        Self::Store,
        Self::Search,
        Self::Update,
        Self::GetContext,
        Self::Prune,
        Self::Export,
        Self::Stats,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Store => "memory_store",
            Self::Search => "memory_search",
            Self::Update => "memory_update",
            Self::GetContext => "memory_get_context",
            Self::Prune => "memory_prune",
            Self::Export => "memory_export",
            Self::Stats => "memory_stats",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == raw)
    }

    fn description(self) -> &'static str {
        match self {
            Self::Store => "Store a new conversation in Sekha memory with validation.",
            Self::Search => "Search stored conversations by semantic similarity.",
            Self::Update => "Update a conversation's label, folder or importance score.",
            Self::GetContext => "Retrieve a conversation with its full message history.",
            Self::Prune => "Suggest old or low-importance conversations to prune.",
            Self::Export => "Export a conversation as JSON or Markdown.",
            Self::Stats => "Show memory statistics, optionally for one folder.",
        }
    }
}

/// One entry of the `tools/list` answer.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Fixed table of the memory tools, bound to one controller gateway.
#[derive(Clone)]
pub struct ToolRegistry {
    gateway: Arc<dyn ControllerGateway>,
}

impl ToolRegistry {
    pub fn new(gateway: Arc<dyn ControllerGateway>) -> Self {
        Self { gateway }
    }

    pub fn list(&self) -> Vec<ToolDescriptor> {
        ToolName::ALL
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: tool.as_str(),
                description: tool.description(),
                input_schema: schemas::input_schema(tool),
            })
            .collect()
    }

    /// Runs one tool. Only an unrecognised name is an `Err`; every other failure is
    /// reported inside the returned [`ToolOutput`].
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolOutput, RegistryError> {
        let tool = ToolName::parse(name).ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;
        info!(tool = tool.as_str(), "tool called");
        let output = handlers::run(tool, self.gateway.as_ref(), arguments).await;
        debug!(
            tool = tool.as_str(),
            failure = output.failure_kind().map(|k| k.as_str()),
            "tool finished"
        );
        Ok(output)
    }
}
