pub mod agent;
pub mod api;
pub mod browser;
pub mod config;
pub mod controller;
pub mod dom;
pub mod error;
pub mod llm;
pub mod tools;
pub mod util;

pub use agent::{AgentConfig, AgentHooks, AgentLoop as Agent, AgentResult};
pub use dom::Page;
pub use error::{AgentError, Result};
pub use llm::{GenaiClient, LlmClient, LlmOptions};
