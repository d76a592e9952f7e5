use chrono::Utc;

use crate::agent::history::HistoryEntry;
use crate::dom::PageInfo;
use crate::tools::ToolDefinition;

/// Fixed system prompt text (spec §4.6, §6): role, input format, browser
/// rules, reasoning rules, and the output JSON shape. `{{language}}` is the
/// only substitution point, filled from config.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a browser automation agent. You are given a task and a live, indexed view of a web page; you drive the page by calling exactly one tool per turn until the task is done or the step budget runs out.

## How you work
Each turn you receive:
1. `<agent_history>` — what you've done so far: your own evaluation/memory/next-goal notes and each action's result.
2. `<agent_state>` — the fixed user request and the current step number out of the step budget.
3. `<browser_state>` — the page URL/title, a scroll-position summary, and the indexed interactive elements visible right now, e.g. `[0]<button>Submit</button>`.

You only ever address elements by the integer index shown in brackets. You never guess an index that isn't shown. Indices are re-assigned on every refresh — never reuse one from a previous turn.

## Output contract
Respond with exactly one JSON object and nothing else:

```
{
  "evaluation_previous_goal": "short verdict on whether your last action achieved what you intended, or omitted on step 1",
  "memory": "facts worth carrying into later steps",
  "next_goal": "what you intend to do this step",
  "action": { "<tool_name>": <tool input object> }
}
```

`action` must have exactly one key: the tool you are invoking. Zero keys or multiple keys is a contract violation and the step will fail.

## Rules
- Prefer the most direct path: navigate straight to a known URL instead of clicking through menus; don't scroll more than once if the element isn't found.
- If a click doesn't seem to have worked, don't repeat it blindly — re-read the new state and try a different element or approach.
- Use `memory` to carry forward anything you'll need later (extracted values, counters); you cannot scroll back through prior turns.
- Call `done` as soon as the task is satisfied, with a clear `text` summary.
- Working language: {{language}}.
"#;

pub fn system_prompt(language: &str) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{{language}}", language)
}

/// Composes the system prompt and the per-step user prompt from task,
/// history, and browser snapshot (spec §4.6).
pub struct PromptAssembler;

impl PromptAssembler {
    /// `tools` determines the action schema's available keys — shown here
    /// only as names, the schema itself is built by the LLM adapter
    /// (spec §4.5.1, §9 "rebuilt at step time").
    pub fn user_prompt(
        task: &str,
        history: &[HistoryEntry],
        step: u32,
        max_steps: u32,
        url: &str,
        title: &str,
        page_info: &PageInfo,
        serialized_html: &str,
        _tools: &[ToolDefinition],
    ) -> String {
        let history_section = render_history(history);
        let state_section = format!(
            "<agent_state>\n<user_request>{}</user_request>\n<step_info>Step {}/{}, {}</step_info>\n</agent_state>",
            task,
            step,
            max_steps,
            Utc::now().to_rfc3339(),
        );
        let browser_section = render_browser_state(url, title, page_info, serialized_html);

        format!("{}\n\n{}\n\n{}", history_section, state_section, browser_section)
    }
}

fn render_history(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "<agent_history>\n(no steps taken yet)\n</agent_history>".to_string();
    }
    let mut body = String::new();
    for entry in history {
        body.push_str(&format!(
            "<step_{n}>\nevaluation_previous_goal: {eval}\nmemory: {mem}\nnext_goal: {goal}\naction: {name}({input})\nresult: {output}\n</step_{n}>\n",
            n = entry.step,
            eval = entry.brain.evaluation_previous_goal.as_deref().unwrap_or(""),
            mem = entry.brain.memory.as_deref().unwrap_or(""),
            goal = entry.brain.next_goal.as_deref().unwrap_or(""),
            name = entry.action.name,
            input = entry.action.input,
            output = entry.action.output,
        ));
    }
    format!("<agent_history>\n{}</agent_history>", body)
}

fn render_browser_state(url: &str, title: &str, page_info: &PageInfo, serialized_html: &str) -> String {
    let header = if page_info.pixels_above <= 0.0 {
        "[Start of page]".to_string()
    } else {
        format!(
            "... {:.0} pixels above ({:.1} pages) - scroll to see more ...",
            page_info.pixels_above, page_info.pages_above
        )
    };
    let footer = if page_info.pixels_below <= 0.0 {
        "[End of page]".to_string()
    } else {
        format!(
            "... {:.0} pixels below ({:.1} pages) - scroll to see more ...",
            page_info.pixels_below, page_info.pages_below
        )
    };

    format!(
        "<browser_state>\nURL: {url}\nTitle: {title}\nViewport: {vw:.0}x{vh:.0}, Page: {pw:.0}x{ph:.0}, pages above/below: {pa:.1}/{pb:.1}, total pages: {tp:.1}, position: {pos:.0}%\n{header}\n{html}\n{footer}\n</browser_state>",
        url = url,
        title = title,
        vw = page_info.viewport_width,
        vh = page_info.viewport_height,
        pw = page_info.page_width,
        ph = page_info.page_height,
        pa = page_info.pages_above,
        pb = page_info.pages_below,
        tp = page_info.total_pages,
        pos = page_info.current_page_position,
        header = header,
        html = serialized_html,
        footer = footer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_substitutes_language() {
        let p = system_prompt("English");
        assert!(p.contains("Working language: English."));
    }

    #[test]
    fn empty_history_renders_placeholder() {
        let s = render_history(&[]);
        assert!(s.contains("no steps taken yet"));
    }
}
