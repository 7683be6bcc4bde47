use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use sekha_memory_core::UpstreamEnvelope;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ControllerConfig, ControllerRoutes, Operation};
use crate::error::GatewayError;
use crate::health::HealthStatus;
use crate::traits::ControllerGateway;

#[derive(Clone)]
pub struct HttpControllerGateway {
    config: ControllerConfig,
    routes: ControllerRoutes,
    client: Client,
}

impl HttpControllerGateway {
    pub fn new(config: ControllerConfig) -> Result<Self, GatewayError> {
        if config.base_url.trim().is_empty() {
            return Err(GatewayError::Config(
                "controller base url is empty".to_string(),
            ));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        let routes = ControllerRoutes::for_surface(config.surface);
        Ok(Self {
            config,
            routes,
            client,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// `GET /health` with a short timeout. Never fails; unreachable controllers are
    /// reported as `unhealthy`.
    pub async fn check_health(&self) -> HealthStatus {
        let res = self
            .client
            .get(self.url("/health"))
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.health_timeout)
            .send()
            .await;
        match res {
            Ok(res) if res.status().is_success() => HealthStatus::healthy(&self.config.base_url),
            Ok(res) => HealthStatus::degraded(
                &self.config.base_url,
                format!("health endpoint returned status {}", res.status().as_u16()),
            ),
            Err(err) => HealthStatus::unhealthy(&self.config.base_url, err.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl ControllerGateway for HttpControllerGateway {
    async fn call(&self, op: Operation, body: Value) -> Result<UpstreamEnvelope, GatewayError> {
        let route = self.routes.route(op);
        let path = render_path(&route.path, &body)?;
        let url = self.url(&path);
        debug!(operation = op.as_str(), method = %route.method, %url, "controller request");

        let builder = self
            .client
            .request(route.method.clone(), url)
            .bearer_auth(&self.config.api_key)
            .header(CONTENT_TYPE, "application/json");
        let builder = if route.method == Method::GET {
            builder.query(&query_pairs(&body))
        } else {
            builder.json(&body)
        };

        let res = builder.send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            warn!(
                operation = op.as_str(),
                status = status.as_u16(),
                "controller returned non-success status"
            );
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str::<UpstreamEnvelope>(&text).map_err(|err| {
            GatewayError::InvalidResponse(format!("{} response is not an envelope: {err}", op.as_str()))
        })
    }
}

fn render_path(template: &str, body: &Value) -> Result<String, GatewayError> {
    const PLACEHOLDER: &str = "{conversation_id}";
    if !template.contains(PLACEHOLDER) {
        return Ok(template.to_string());
    }
    let id = body
        .get("conversation_id")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            GatewayError::Config(format!("route {template} needs a conversation_id"))
        })?;
    Ok(template.replace(PLACEHOLDER, id))
}

fn query_pairs(body: &Value) -> Vec<(String, String)> {
    let Some(fields) = body.as_object() else {
        return Vec::new();
    };
    fields
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), rendered))
        })
        .collect()
}
