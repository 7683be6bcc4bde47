pub mod bridge;
pub mod config;
pub mod error;
pub mod ollama;
pub mod service;
pub mod traits;
pub mod types;

pub use bridge::LlmBridge;
pub use config::*;
pub use error::{BridgeError, RuntimeError};
pub use ollama::OllamaRuntime;
pub use service::{BridgeService, HttpReply, DEFAULT_BRIDGE_ADDR};
pub use traits::*;
pub use types::*;
