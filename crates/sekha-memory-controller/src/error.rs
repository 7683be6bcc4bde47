use thiserror::Error;

const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("controller returned invalid response: {0}")]
    InvalidResponse(String),

    #[error("controller API error: status={status}, body={body}")]
    Api { status: u16, body: String },
}

impl GatewayError {
    /// Connection, DNS and timeout failures, as opposed to answers the controller gave.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// Reason text suitable for a tool result. For non-2xx answers the controller's own
    /// `error` field is preferred over the raw body.
    pub fn describe(&self) -> String {
        match self {
            Self::Config(msg) => format!("Configuration error: {msg}"),
            Self::Http(err) if err.is_timeout() => {
                format!("Request to controller timed out: {err}")
            }
            Self::Http(err) if err.is_connect() => {
                format!("Could not connect to controller: {err}")
            }
            Self::Http(err) => format!("Network error: {err}"),
            Self::Serde(err) => format!("Serialization error: {err}"),
            Self::InvalidResponse(msg) => format!("Invalid controller response: {msg}"),
            Self::Api { status, body } => match upstream_error_text(body) {
                Some(reason) => format!("Controller returned status {status}: {reason}"),
                None => format!("Controller returned status {status}"),
            },
        }
    }
}

fn upstream_error_text(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["error", "message", "detail"] {
            if let Some(text) = value.get(key).and_then(serde_json::Value::as_str) {
                return Some(text.to_string());
            }
        }
    }
    let mut excerpt: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    if trimmed.chars().count() > BODY_EXCERPT_CHARS {
        excerpt.push_str("...");
    }
    Some(excerpt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_prefers_envelope_error_field() {
        let err = GatewayError::Api {
            status: 404,
            body: r#"{"success":false,"error":"Conversation not found"}"#.to_string(),
        };
        assert_eq!(
            err.describe(),
            "Controller returned status 404: Conversation not found"
        );
        assert!(!err.is_transport());
    }

    #[test]
    fn api_error_falls_back_to_plain_body_or_status() {
        let err = GatewayError::Api {
            status: 502,
            body: "Bad Gateway".to_string(),
        };
        assert_eq!(err.describe(), "Controller returned status 502: Bad Gateway");

        let err = GatewayError::Api {
            status: 500,
            body: String::new(),
        };
        assert_eq!(err.describe(), "Controller returned status 500");
    }
}
