use async_trait::async_trait;

use crate::error::RuntimeError;

/// A local model server able to embed text and complete prompts.
#[async_trait]
pub trait LlmRuntime: Send + Sync {
    fn name(&self) -> &'static str;

    async fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, RuntimeError>;

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, RuntimeError>;

    async fn list_models(&self) -> Result<Vec<String>, RuntimeError>;
}
