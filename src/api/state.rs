use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::agent::{AgentHandle, AgentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Done,
}

pub struct TaskRecord {
    pub handle: AgentHandle,
    pub status: Mutex<TaskStatus>,
    pub result: Mutex<Option<AgentResult>>,
}

/// Shared state for the optional outer API server (spec §6): one entry
/// per in-flight or completed task, keyed by task id.
#[derive(Clone, Default)]
pub struct AppState {
    pub tasks: Arc<DashMap<String, Arc<TaskRecord>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}
