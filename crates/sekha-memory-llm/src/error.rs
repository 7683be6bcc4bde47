use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("runtime returned invalid response: {0}")]
    InvalidResponse(String),

    #[error("runtime API error: status={status}, body={body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl BridgeError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
