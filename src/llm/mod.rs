pub mod client;
pub mod schema;

pub use client::{GenaiClient, LlmClient, LlmOptions, LlmProvider};
pub use schema::{build_action_schema, render_tool_catalog};
