use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The LLM's free-text reasoning channels, filled every step (GLOSSARY
/// "Brain fields").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Brain {
    pub evaluation_previous_goal: Option<String>,
    pub memory: Option<String>,
    pub next_goal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub name: String,
    pub input: Value,
    pub output: String,
}

/// Token accounting for one LLM call, if the client reports it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One per agent step (spec §3): `{brain, action, usage}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: u32,
    pub brain: Brain,
    pub action: ActionRecord,
    pub usage: Option<Usage>,
}
