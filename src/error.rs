use thiserror::Error;

/// Error kinds surfaced by the perception-and-action core (spec §7).
///
/// `Schema`, `UnknownTool`, `UnknownIndex`, and `Action` are step-level
/// failures: the agent loop turns them into a history entry and keeps
/// going. `Config`, `Abort`, `Llm`, and `Fatal` terminate the task.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("aborted: {0}")]
    Abort(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("model output violated the structured output contract: {0}")]
    Schema(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("unknown element index: {0}")]
    UnknownIndex(u32),

    #[error("action failed: {0}")]
    Action(String),

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AgentError {
    /// Step-level failures are reported to the LLM as history, not thrown.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::Schema(_)
                | AgentError::UnknownTool(_)
                | AgentError::UnknownIndex(_)
                | AgentError::Action(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
