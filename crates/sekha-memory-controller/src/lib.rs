pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod traits;

pub use config::*;
pub use error::GatewayError;
pub use health::HealthStatus;
pub use http::HttpControllerGateway;
pub use traits::*;
