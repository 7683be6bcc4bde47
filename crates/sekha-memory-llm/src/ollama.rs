use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OllamaConfig;
use crate::error::RuntimeError;
use crate::traits::LlmRuntime;

#[derive(Clone)]
pub struct OllamaRuntime {
    config: OllamaConfig,
    client: Client,
}

impl OllamaRuntime {
    pub fn new(config: OllamaConfig) -> Result<Self, RuntimeError> {
        if config.base_url.trim().is_empty() {
            return Err(RuntimeError::Config("ollama base url is empty".to_string()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

async fn ensure_success(res: Response) -> Result<Response, RuntimeError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err(RuntimeError::Api { status, body })
}

#[async_trait::async_trait]
impl LlmRuntime for OllamaRuntime {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, RuntimeError> {
        debug!(model, chars = input.chars().count(), "ollama embed");
        let res = self
            .client
            .post(self.url("/api/embed"))
            .json(&EmbedRequest { model, input })
            .send()
            .await?;
        let parsed: EmbedResponse = ensure_success(res).await?.json().await?;
        parsed
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RuntimeError::InvalidResponse("embed returned no vectors".to_string()))
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, RuntimeError> {
        debug!(model, "ollama generate");
        let res = self
            .client
            .post(self.url("/api/generate"))
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
            })
            .send()
            .await?;
        let parsed: GenerateResponse = ensure_success(res).await?.json().await?;
        Ok(parsed.response)
    }

    async fn list_models(&self) -> Result<Vec<String>, RuntimeError> {
        let res = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.config.health_timeout)
            .send()
            .await?;
        let parsed: TagsResponse = ensure_success(res).await?.json().await?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}
