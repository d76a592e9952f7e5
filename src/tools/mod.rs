pub mod default_tools;
pub mod registry;

pub use registry::{Tool, ToolDefinition, ToolRegistry};
