use async_trait::async_trait;
use sekha_memory_core::{
    ContextRequest, NewConversation, PruneRequest, SearchRequest, StatsRequest, UpdateRequest,
    UpstreamEnvelope,
};
use serde_json::{Value, json};

use crate::config::Operation;
use crate::error::GatewayError;

/// One upstream round trip per call. Implementations must not retry or cache.
///
/// Only [`ControllerGateway::call`] is required; the typed operations build the JSON body
/// and delegate to it, so test doubles can record bodies without an HTTP server.
#[async_trait]
pub trait ControllerGateway: Send + Sync {
    async fn call(&self, op: Operation, body: Value) -> Result<UpstreamEnvelope, GatewayError>;

    async fn store_conversation(
        &self,
        conversation: &NewConversation,
    ) -> Result<UpstreamEnvelope, GatewayError> {
        self.call(Operation::Store, serde_json::to_value(conversation)?)
            .await
    }

    async fn search_memory(
        &self,
        request: &SearchRequest,
    ) -> Result<UpstreamEnvelope, GatewayError> {
        self.call(Operation::Search, serde_json::to_value(request)?)
            .await
    }

    async fn update_conversation(
        &self,
        request: &UpdateRequest,
    ) -> Result<UpstreamEnvelope, GatewayError> {
        self.call(Operation::Update, serde_json::to_value(request)?)
            .await
    }

    async fn get_context(
        &self,
        request: &ContextRequest,
    ) -> Result<UpstreamEnvelope, GatewayError> {
        self.call(Operation::GetContext, serde_json::to_value(request)?)
            .await
    }

    async fn prune_memory(&self, request: &PruneRequest) -> Result<UpstreamEnvelope, GatewayError> {
        self.call(Operation::Prune, serde_json::to_value(request)?)
            .await
    }

    async fn get_stats(&self, request: &StatsRequest) -> Result<UpstreamEnvelope, GatewayError> {
        self.call(Operation::Stats, serde_json::to_value(request)?)
            .await
    }

    /// Deprecated query endpoint kept for older callers. Unlike the other operations a
    /// successful answer is not required to carry `data`.
    async fn legacy_query(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<UpstreamEnvelope, GatewayError> {
        self.call(Operation::Search, json!({"query": query, "limit": limit}))
            .await
    }
}
