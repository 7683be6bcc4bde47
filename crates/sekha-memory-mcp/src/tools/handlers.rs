use chrono::Utc;
use sekha_memory_controller::{ControllerGateway, GatewayError};
use sekha_memory_core::{
    validate_export, validate_get_context, validate_prune, validate_search, validate_stats,
    validate_store, validate_update, ArgumentBag, UpstreamEnvelope, ValidationFailure,
};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::format::{self, FailureText, ToolOutput};
use super::registry::ToolName;

/// Validate, forward, render. Validation failures never reach the gateway.
pub(crate) async fn run(
    tool: ToolName,
    gateway: &dyn ControllerGateway,
    arguments: Option<Value>,
) -> ToolOutput {
    let args = match ArgumentBag::from_arguments(arguments) {
        Ok(args) => args,
        Err(err) => return rejected(tool, &err),
    };

    match tool {
        ToolName::Store => {
            let conversation = match validate_store(&args) {
                Ok(v) => v,
                Err(err) => return rejected(tool, &err),
            };
            let result = gateway.store_conversation(&conversation).await;
            finish(tool, FailureText::STORE, result, format::store)
        }
        ToolName::Search => {
            let request = match validate_search(&args) {
                Ok(v) => v,
                Err(err) => return rejected(tool, &err),
            };
            let result = gateway.search_memory(&request).await;
            finish(tool, FailureText::SEARCH, result, format::search)
        }
        ToolName::Update => {
            let request = match validate_update(&args) {
                Ok(v) => v,
                Err(err) => return rejected(tool, &err),
            };
            let result = gateway.update_conversation(&request).await;
            finish(tool, FailureText::UPDATE, result, format::update)
        }
        ToolName::GetContext => {
            let request = match validate_get_context(&args) {
                Ok(v) => v,
                Err(err) => return rejected(tool, &err),
            };
            let result = gateway.get_context(&request).await;
            finish(tool, FailureText::GET_CONTEXT, result, format::get_context)
        }
        ToolName::Prune => {
            let request = match validate_prune(&args) {
                Ok(v) => v,
                Err(err) => return rejected(tool, &err),
            };
            let result = gateway.prune_memory(&request).await;
            finish(tool, FailureText::PRUNE, result, |env| {
                format::prune(env, request.threshold_days)
            })
        }
        ToolName::Export => {
            let request = match validate_export(&args) {
                Ok(v) => v,
                Err(err) => return rejected(tool, &err),
            };
            // Export has no endpoint of its own: fetch the conversation and render locally.
            let result = gateway.get_context(&request.context()).await;
            finish(tool, FailureText::EXPORT, result, |env| {
                format::export(env, &request, Utc::now())
            })
        }
        ToolName::Stats => {
            let request = match validate_stats(&args) {
                Ok(v) => v,
                Err(err) => return rejected(tool, &err),
            };
            let result = gateway.get_stats(&request).await;
            finish(tool, FailureText::STATS, result, format::stats)
        }
    }
}

fn rejected(tool: ToolName, err: &ValidationFailure) -> ToolOutput {
    debug!(tool = tool.as_str(), field = %err.field, reason = %err.reason, "tool arguments rejected");
    format::validation_failure(err)
}

fn finish<F>(
    tool: ToolName,
    text: FailureText,
    result: Result<UpstreamEnvelope, GatewayError>,
    render: F,
) -> ToolOutput
where
    F: FnOnce(UpstreamEnvelope) -> ToolOutput,
{
    match result {
        Ok(envelope) => {
            let output = render(envelope);
            if output.is_error() {
                warn!(tool = tool.as_str(), "controller reported a failure");
            }
            output
        }
        Err(err) if err.is_transport() => {
            error!(tool = tool.as_str(), error = %err, "controller unreachable");
            format::gateway_failure(text, &err)
        }
        Err(err) => {
            warn!(tool = tool.as_str(), error = %err, "controller call failed");
            format::gateway_failure(text, &err)
        }
    }
}
