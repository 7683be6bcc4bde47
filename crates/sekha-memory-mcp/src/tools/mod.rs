pub mod format;
mod handlers;
pub mod registry;
mod schemas;

pub use format::{FailureKind, ToolOutput};
pub use registry::{RegistryError, ToolDescriptor, ToolName, ToolRegistry};
