use std::fmt;
use std::time::Duration;

use reqwest::Method;

pub const DEFAULT_CONTROLLER_URL: &str = "http://localhost:8080";

/// Which of the controller's two API surfaces the gateway talks to. Chosen once per
/// process; every operation then resolves through the same route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiSurface {
    #[default]
    McpProxy,
    RestV1,
}

impl ApiSurface {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mcp" | "mcp-proxy" | "mcp_proxy" => Some(Self::McpProxy),
            "rest" | "rest-v1" | "v1" | "api" => Some(Self::RestV1),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::McpProxy => "mcp-proxy",
            Self::RestV1 => "rest-v1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Store,
    Search,
    Update,
    GetContext,
    Prune,
    Stats,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Store => "memory_store",
            Self::Search => "memory_search",
            Self::Update => "memory_update",
            Self::GetContext => "memory_get_context",
            Self::Prune => "memory_prune",
            Self::Stats => "memory_stats",
        }
    }
}

/// Method and path template for one operation. `{conversation_id}` in the path is
/// filled from the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: String,
}

impl Route {
    fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerRoutes {
    pub store: Route,
    pub search: Route,
    pub update: Route,
    pub get_context: Route,
    pub prune: Route,
    pub stats: Route,
}

impl ControllerRoutes {
    pub fn for_surface(surface: ApiSurface) -> Self {
        match surface {
            ApiSurface::McpProxy => Self {
                store: Route::new(Method::POST, "/mcp/tools/memory_store"),
                search: Route::new(Method::POST, "/mcp/tools/memory_search"),
                update: Route::new(Method::POST, "/mcp/tools/memory_update"),
                get_context: Route::new(Method::POST, "/mcp/tools/memory_get_context"),
                prune: Route::new(Method::POST, "/mcp/tools/memory_prune"),
                stats: Route::new(Method::POST, "/mcp/tools/memory_stats"),
            },
            ApiSurface::RestV1 => Self {
                store: Route::new(Method::POST, "/api/v1/conversations"),
                search: Route::new(Method::POST, "/api/v1/query"),
                update: Route::new(
                    Method::PUT,
                    "/api/v1/conversations/{conversation_id}/label",
                ),
                get_context: Route::new(Method::GET, "/api/v1/conversations/{conversation_id}"),
                prune: Route::new(Method::POST, "/api/v1/prune/dry-run"),
                stats: Route::new(Method::GET, "/api/v1/stats"),
            },
        }
    }

    pub fn route(&self, op: Operation) -> &Route {
        match op {
            Operation::Store => &self.store,
            Operation::Search => &self.search,
            Operation::Update => &self.update,
            Operation::GetContext => &self.get_context,
            Operation::Prune => &self.prune,
            Operation::Stats => &self.stats,
        }
    }
}

#[derive(Clone)]
pub struct ControllerConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub health_timeout: Duration,
    pub surface: ApiSurface,
}

impl ControllerConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
            surface: ApiSurface::default(),
        }
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("health_timeout", &self.health_timeout)
            .field("surface", &self.surface)
            .finish()
    }
}
