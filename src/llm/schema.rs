use serde_json::{json, Value};

use crate::tools::ToolDefinition;

/// Builds the discriminated-union action schema described in spec
/// §4.5.1: `action` is `{ <toolName>: <toolInputSchema> }` with exactly
/// one key, chosen from the tool set registered *at this step* — the
/// schema is rebuilt every step rather than cached at construction time
/// (spec §9), since tools may be added or removed between steps.
pub fn build_action_schema(tools: &[ToolDefinition]) -> Value {
    let variants: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "object",
                "properties": { t.name.clone(): t.input_schema.clone() },
                "required": [t.name.clone()],
                "additionalProperties": false,
            })
        })
        .collect();

    json!({
        "type": "object",
        "properties": {
            "evaluation_previous_goal": {"type": "string"},
            "memory": {"type": "string"},
            "next_goal": {"type": "string"},
            "action": { "oneOf": variants },
        },
        "required": ["action"],
    })
}

/// Renders the schema plus tool descriptions as the text appended to the
/// system prompt each step. `genai`'s structured-output enforcement is
/// provider-specific, so the contract is also spelled out in natural
/// language + an embedded JSON Schema the model is instructed to follow
/// exactly (spec §4.5.1).
pub fn render_tool_catalog(tools: &[ToolDefinition]) -> String {
    let mut out = String::from("## Available tools\n\n");
    for t in tools {
        out.push_str(&format!(
            "### {}\n{}\nInput schema: {}\n\n",
            t.name,
            t.description,
            serde_json::to_string(&t.input_schema).unwrap_or_default()
        ));
    }
    out.push_str("## action schema (the `action` field of your JSON response)\n");
    out.push_str(&serde_json::to_string_pretty(&build_action_schema(tools)).unwrap_or_default());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_one_variant_per_tool() {
        let tools = vec![
            ToolDefinition {
                name: "done".into(),
                description: "finish".into(),
                input_schema: json!({"type": "object"}),
            },
            ToolDefinition {
                name: "click_element_by_index".into(),
                description: "click".into(),
                input_schema: json!({"type": "object"}),
            },
        ];
        let schema = build_action_schema(&tools);
        let variants = schema["properties"]["action"]["oneOf"].as_array().unwrap();
        assert_eq!(variants.len(), 2);
    }
}
