use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::AgentLoop;
use crate::error::Result;

/// One entry in the action schema's discriminated union (spec §4.4,
/// §4.5.1): name, natural-language description, and a JSON Schema for the
/// tool's input.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A named, schema-validated action the LLM may choose on a given step
/// (spec §4.4, GLOSSARY). The executor receives the agent instance — so
/// `done` can terminate the loop and `wait` can read/reset the
/// accumulator — and the validated input, and returns the string appended
/// to history as the action's output.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, agent: &mut AgentLoop, input: Value) -> Result<String>;
}

/// Ordered, mutable named collection of tools (spec §4.4). Iteration order
/// is insertion order, since the registered tool set also drives the
/// structured-output schema's key order (spec §4.5.1, §9 "rebuilt at step
/// time").
#[derive(Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Removes a tool by name. Matches spec §4.4: "supplying a tool value
    /// of `null` removes a default by name."
    pub fn remove(&mut self, name: &str) {
        self.tools.remove(name);
        self.order.retain(|n| n != name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool definitions in registration order — the basis of the per-step
    /// discriminated union (spec §4.5.1).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|n| self.tools.get(n).map(|t| t.definition()))
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }
}
