use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::AgentLoop;
use crate::controller::{ScrollHorizontalArgs, ScrollVerticalArgs};
use crate::error::{AgentError, Result};
use crate::tools::{Tool, ToolDefinition, ToolRegistry};

/// Registers the default tool table (spec §4.4). `execute_javascript` is
/// only registered when the caller opted in via
/// `AgentConfig.experimental_script_execution_tool` (spec §9).
pub fn register_defaults(registry: &mut ToolRegistry, script_execution_enabled: bool) {
    registry.register(std::sync::Arc::new(DoneTool));
    registry.register(std::sync::Arc::new(WaitTool));
    registry.register(std::sync::Arc::new(AskUserTool));
    registry.register(std::sync::Arc::new(ClickElementByIndexTool));
    registry.register(std::sync::Arc::new(InputTextTool));
    registry.register(std::sync::Arc::new(SelectDropdownOptionTool));
    registry.register(std::sync::Arc::new(ScrollTool));
    registry.register(std::sync::Arc::new(ScrollHorizontallyTool));
    if script_execution_enabled {
        registry.register(std::sync::Arc::new(ExecuteJavascriptTool));
    }
}

fn index_arg(input: &Value) -> Result<u32> {
    input
        .get("index")
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .ok_or_else(|| AgentError::Schema("missing or invalid 'index'".to_string()))
}

struct DoneTool;

#[async_trait]
impl Tool for DoneTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "done".to_string(),
            description: "Call this once the task is fully complete. Provide a clear summary of the outcome.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string"},
                    "success": {"type": "boolean", "default": true},
                },
                "required": ["text"],
            }),
        }
    }

    async fn execute(&self, agent: &mut AgentLoop, input: Value) -> Result<String> {
        let text = input
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Schema("missing 'text'".to_string()))?
            .to_string();
        let success = input.get("success").and_then(Value::as_bool).unwrap_or(true);
        agent.mark_done(success, text.clone());
        Ok(text)
    }
}

struct WaitTool;

#[async_trait]
impl Tool for WaitTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "wait".to_string(),
            description: "Pause for the page to settle (e.g. after a navigation) before continuing. Prefer acting over waiting.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "seconds": {"type": "integer", "minimum": 1, "maximum": 10, "default": 1},
                },
            }),
        }
    }

    async fn execute(&self, agent: &mut AgentLoop, input: Value) -> Result<String> {
        let seconds = input.get("seconds").and_then(Value::as_u64).unwrap_or(1).clamp(1, 10);
        let requested = Duration::from_secs(seconds);
        let already_elapsed = agent.time_since_last_refresh();
        let remaining = requested.saturating_sub(already_elapsed);
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
        Ok(format!("Waited {} second(s)", seconds))
    }
}

struct AskUserTool;

#[async_trait]
impl Tool for AskUserTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "ask_user".to_string(),
            description: "Ask the user a clarifying question when the task cannot proceed without their input.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "question": {"type": "string"} },
                "required": ["question"],
            }),
        }
    }

    async fn execute(&self, agent: &mut AgentLoop, input: Value) -> Result<String> {
        let question = input
            .get("question")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Schema("missing 'question'".to_string()))?
            .to_string();
        agent.record_question(question.clone());
        Ok(format!(
            "Recorded question for the user: \"{}\". No interactive response is available; continue if possible.",
            question
        ))
    }
}

struct ClickElementByIndexTool;

#[async_trait]
impl Tool for ClickElementByIndexTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "click_element_by_index".to_string(),
            description: "Click the interactive element at the given index.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "index": {"type": "integer", "minimum": 0} },
                "required": ["index"],
            }),
        }
    }

    async fn execute(&self, agent: &mut AgentLoop, input: Value) -> Result<String> {
        let index = index_arg(&input)?;
        let outcome = agent.controller_mut().click(index).await?;
        Ok(outcome.message)
    }
}

struct InputTextTool;

#[async_trait]
impl Tool for InputTextTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "input_text".to_string(),
            description: "Clear the field at the given index and type the given text into it.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "index": {"type": "integer", "minimum": 0},
                    "text": {"type": "string"},
                },
                "required": ["index", "text"],
            }),
        }
    }

    async fn execute(&self, agent: &mut AgentLoop, input: Value) -> Result<String> {
        let index = index_arg(&input)?;
        let text = input
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Schema("missing 'text'".to_string()))?;
        let outcome = agent.controller_mut().type_text(index, text).await?;
        Ok(outcome.message)
    }
}

struct SelectDropdownOptionTool;

#[async_trait]
impl Tool for SelectDropdownOptionTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "select_dropdown_option".to_string(),
            description: "Select the <option> whose visible text matches in the <select> at the given index.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "index": {"type": "integer", "minimum": 0},
                    "text": {"type": "string"},
                },
                "required": ["index", "text"],
            }),
        }
    }

    async fn execute(&self, agent: &mut AgentLoop, input: Value) -> Result<String> {
        let index = index_arg(&input)?;
        let text = input
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Schema("missing 'text'".to_string()))?;
        let outcome = agent.controller_mut().select(index, text).await?;
        Ok(outcome.message)
    }
}

struct ScrollTool;

#[async_trait]
impl Tool for ScrollTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "scroll".to_string(),
            description: "Scroll the page (or, if index is given, a scrollable element) vertically.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "down": {"type": "boolean", "default": true},
                    "num_pages": {"type": "number", "minimum": 0, "maximum": 10, "default": 0.1},
                    "pixels": {"type": "number", "minimum": 0},
                    "index": {"type": "integer", "minimum": 0},
                },
            }),
        }
    }

    async fn execute(&self, agent: &mut AgentLoop, input: Value) -> Result<String> {
        let args = ScrollVerticalArgs {
            down: input.get("down").and_then(Value::as_bool).unwrap_or(true),
            num_pages: input.get("num_pages").and_then(Value::as_f64).unwrap_or(0.1),
            pixels: input.get("pixels").and_then(Value::as_f64),
            index: input.get("index").and_then(Value::as_u64).map(|v| v as u32),
        };
        let outcome = agent.controller_mut().scroll_vertical(args).await?;
        Ok(outcome.message)
    }
}

struct ScrollHorizontallyTool;

#[async_trait]
impl Tool for ScrollHorizontallyTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "scroll_horizontally".to_string(),
            description: "Scroll the page (or, if index is given, a scrollable element) horizontally.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "right": {"type": "boolean", "default": true},
                    "pixels": {"type": "number", "minimum": 0},
                    "index": {"type": "integer", "minimum": 0},
                },
                "required": ["pixels"],
            }),
        }
    }

    async fn execute(&self, agent: &mut AgentLoop, input: Value) -> Result<String> {
        let args = ScrollHorizontalArgs {
            right: input.get("right").and_then(Value::as_bool).unwrap_or(true),
            pixels: input
                .get("pixels")
                .and_then(Value::as_f64)
                .ok_or_else(|| AgentError::Schema("missing 'pixels'".to_string()))?,
            index: input.get("index").and_then(Value::as_u64).map(|v| v as u32),
        };
        let outcome = agent.controller_mut().scroll_horizontal(args).await?;
        Ok(outcome.message)
    }
}

struct ExecuteJavascriptTool;

#[async_trait]
impl Tool for ExecuteJavascriptTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "execute_javascript".to_string(),
            description: "Run a JavaScript expression in the page context and return its stringified result. Use sparingly; prefer the other tools.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "script": {"type": "string"} },
                "required": ["script"],
            }),
        }
    }

    async fn execute(&self, agent: &mut AgentLoop, input: Value) -> Result<String> {
        let script = input
            .get("script")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Schema("missing 'script'".to_string()))?;
        let outcome = agent.controller_mut().exec_script(script).await?;
        Ok(outcome.message)
    }
}
