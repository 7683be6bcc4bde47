use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub controller_reachable: bool,
    pub controller_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn healthy(controller_url: &str) -> Self {
        Self {
            status: "healthy",
            controller_reachable: true,
            controller_url: controller_url.to_string(),
            error: None,
        }
    }

    pub fn degraded(controller_url: &str, error: impl Into<String>) -> Self {
        Self {
            status: "degraded",
            controller_reachable: false,
            controller_url: controller_url.to_string(),
            error: Some(error.into()),
        }
    }

    pub fn unhealthy(controller_url: &str, error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy",
            controller_reachable: false,
            controller_url: controller_url.to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.controller_reachable
    }
}
