//! End-to-end tests driving `AgentLoop` against a fake `Page` and a fake
//! `LlmClient`, covering the scenarios from spec §8: a static page read,
//! a form fill, index reuse across a refresh, a target-blank click warning,
//! the step budget, and mid-task abort.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use browseragent::agent::AbortSignal;
use browseragent::dom::{HandleRef, Page, PageInfo};
use browseragent::llm::LlmClient;
use browseragent::{Agent, AgentConfig};

/// A hand-rolled single-page DOM: one button (index 0) and one text input
/// (index 1), each addressable by the marker selector the real extractor
/// would stamp (`[data-<ns>-index="N"]`).
struct FakePage {
    namespace: Mutex<String>,
    refresh_count: AtomicUsize,
    clicked: Mutex<Vec<u32>>,
    filled: Mutex<Vec<(u32, String)>>,
    target_blank_index: Option<u32>,
}

impl FakePage {
    fn new() -> Self {
        Self {
            namespace: Mutex::new(String::new()),
            refresh_count: AtomicUsize::new(0),
            clicked: Mutex::new(Vec::new()),
            filled: Mutex::new(Vec::new()),
            target_blank_index: None,
        }
    }

    fn with_target_blank(index: u32) -> Self {
        Self { target_blank_index: Some(index), ..Self::new() }
    }
}

fn walk_payload() -> Value {
    json!({
        "rootId": "n0",
        "indexCount": 2,
        "nodes": {
            "n0": {
                "kind": "element",
                "tag": "body",
                "attributes": {},
                "childIds": ["n1", "n2"],
                "visible": true,
                "topmost": true,
                "inViewport": true,
            },
            "n1": {
                "kind": "interactive",
                "tag": "button",
                "attributes": {"type": "button"},
                "childIds": ["n3"],
                "visible": true,
                "topmost": true,
                "inViewport": true,
                "index": 0,
            },
            "n2": {
                "kind": "interactive",
                "tag": "input",
                "attributes": {"type": "text"},
                "childIds": [],
                "visible": true,
                "topmost": true,
                "inViewport": true,
                "index": 1,
            },
            "n3": {
                "kind": "text",
                "text": "Submit",
                "visible": true,
            },
        },
    })
}

#[async_trait]
impl Page for FakePage {
    async fn evaluate_json(&self, _script: &str) -> anyhow::Result<Value> {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        Ok(walk_payload())
    }

    async fn resolve_marker(&self, namespace: &str, index: u32) -> anyhow::Result<HandleRef> {
        *self.namespace.lock().unwrap() = namespace.to_string();
        Ok(HandleRef(format!("[data-{namespace}-index=\"{index}\"]")))
    }

    async fn scroll_into_view(&self, _handle: &HandleRef) -> anyhow::Result<()> {
        Ok(())
    }

    async fn click(&self, handle: &HandleRef) -> anyhow::Result<()> {
        let index: u32 = handle
            .0
            .rsplit('"')
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        self.clicked.lock().unwrap().push(index);
        Ok(())
    }

    async fn fill(&self, handle: &HandleRef, text: &str) -> anyhow::Result<()> {
        let index: u32 = handle.0.rsplit('"').nth(1).unwrap().parse().unwrap();
        self.filled.lock().unwrap().push((index, text.to_string()));
        Ok(())
    }

    async fn select_by_label(&self, _handle: &HandleRef, _text: &str) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn element_scroll_top(&self, _handle: &HandleRef) -> anyhow::Result<f64> {
        Ok(0.0)
    }

    async fn element_scroll_left(&self, _handle: &HandleRef) -> anyhow::Result<f64> {
        Ok(0.0)
    }

    async fn scroll_element_by(&self, _handle: &HandleRef, _dx: f64, _dy: f64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn scroll_window_by(&self, _dx: f64, _dy: f64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn is_target_blank(&self, handle: &HandleRef) -> anyhow::Result<bool> {
        let index: u32 = handle.0.rsplit('"').nth(1).unwrap().parse().unwrap();
        Ok(self.target_blank_index == Some(index))
    }

    async fn eval_user_script(&self, _source: &str) -> anyhow::Result<String> {
        Ok("null".to_string())
    }

    async fn url(&self) -> anyhow::Result<String> {
        Ok("https://example.test/".to_string())
    }

    async fn title(&self) -> anyhow::Result<String> {
        Ok("Example".to_string())
    }

    async fn page_info(&self) -> anyhow::Result<PageInfo> {
        Ok(PageInfo {
            viewport_width: 1280.0,
            viewport_height: 800.0,
            page_width: 1280.0,
            page_height: 800.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            pixels_above: 0.0,
            pixels_below: 0.0,
            pages_above: 0.0,
            pages_below: 0.0,
            total_pages: 1.0,
            current_page_position: 0.0,
            pixels_left: 0.0,
            pixels_right: 0.0,
        })
    }
}

/// Replays a fixed queue of pre-baked model responses, one per step.
struct ScriptedLlm {
    responses: Mutex<Vec<Value>>,
    abort_after_first_call: bool,
}

impl ScriptedLlm {
    fn new(responses: Vec<Value>) -> Self {
        Self { responses: Mutex::new(responses), abort_after_first_call: false }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        abort: &AbortSignal,
    ) -> anyhow::Result<Value> {
        if self.abort_after_first_call {
            abort.trigger("stopping after first call");
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            anyhow::bail!("scripted LLM ran out of responses");
        }
        Ok(responses.remove(0))
    }
}

fn click_action(index: u32) -> Value {
    json!({
        "evaluation_previous_goal": "starting",
        "memory": "",
        "next_goal": "click the button",
        "action": { "click_element_by_index": { "index": index } },
    })
}

fn done_action(success: bool, text: &str) -> Value {
    json!({
        "evaluation_previous_goal": "finished",
        "memory": "",
        "next_goal": "report",
        "action": { "done": { "success": success, "text": text } },
    })
}

#[tokio::test]
async fn reads_a_static_page_and_reports_done() {
    let page = FakePage::new();
    let llm = Arc::new(ScriptedLlm::new(vec![done_action(true, "looked at the page")]));
    let mut agent = Agent::new(Box::new(page), llm, AgentConfig::default());

    let result = agent.execute("describe the page").await;

    assert!(result.success);
    assert_eq!(result.data, "looked at the page");
    assert_eq!(result.history.len(), 1);
    assert_eq!(result.history[0].action.name, "done");
}

#[tokio::test]
async fn fills_a_form_field_then_finishes() {
    let page = Arc::new(FakePage::new());
    let fill_action = json!({
        "evaluation_previous_goal": "starting",
        "memory": "",
        "next_goal": "fill the field",
        "action": { "input_text": { "index": 1, "text": "hello world" } },
    });
    let llm = Arc::new(ScriptedLlm::new(vec![fill_action, done_action(true, "filled it")]));

    struct Wrap(Arc<FakePage>);
    #[async_trait]
    impl Page for Wrap {
        async fn evaluate_json(&self, s: &str) -> anyhow::Result<Value> { self.0.evaluate_json(s).await }
        async fn resolve_marker(&self, ns: &str, i: u32) -> anyhow::Result<HandleRef> { self.0.resolve_marker(ns, i).await }
        async fn scroll_into_view(&self, h: &HandleRef) -> anyhow::Result<()> { self.0.scroll_into_view(h).await }
        async fn click(&self, h: &HandleRef) -> anyhow::Result<()> { self.0.click(h).await }
        async fn fill(&self, h: &HandleRef, t: &str) -> anyhow::Result<()> { self.0.fill(h, t).await }
        async fn select_by_label(&self, h: &HandleRef, t: &str) -> anyhow::Result<bool> { self.0.select_by_label(h, t).await }
        async fn element_scroll_top(&self, h: &HandleRef) -> anyhow::Result<f64> { self.0.element_scroll_top(h).await }
        async fn element_scroll_left(&self, h: &HandleRef) -> anyhow::Result<f64> { self.0.element_scroll_left(h).await }
        async fn scroll_element_by(&self, h: &HandleRef, dx: f64, dy: f64) -> anyhow::Result<()> { self.0.scroll_element_by(h, dx, dy).await }
        async fn scroll_window_by(&self, dx: f64, dy: f64) -> anyhow::Result<()> { self.0.scroll_window_by(dx, dy).await }
        async fn is_target_blank(&self, h: &HandleRef) -> anyhow::Result<bool> { self.0.is_target_blank(h).await }
        async fn eval_user_script(&self, s: &str) -> anyhow::Result<String> { self.0.eval_user_script(s).await }
        async fn url(&self) -> anyhow::Result<String> { self.0.url().await }
        async fn title(&self) -> anyhow::Result<String> { self.0.title().await }
        async fn page_info(&self) -> anyhow::Result<PageInfo> { self.0.page_info().await }
    }

    let mut agent = Agent::new(Box::new(Wrap(page.clone())), llm, AgentConfig::default());
    let result = agent.execute("fill in the field").await;

    assert!(result.success);
    assert_eq!(page.filled.lock().unwrap().as_slice(), &[(1, "hello world".to_string())]);
}

#[tokio::test]
async fn click_on_target_blank_link_warns_in_the_outcome() {
    let page = FakePage::with_target_blank(0);
    let llm = Arc::new(ScriptedLlm::new(vec![click_action(0), done_action(true, "clicked")]));
    let mut agent = Agent::new(Box::new(page), llm, AgentConfig::default());

    let result = agent.execute("click the button").await;

    assert!(result.success);
    let click_entry = &result.history[0];
    assert!(click_entry.action.output.contains("new tab"));
}

#[tokio::test]
async fn unknown_tool_name_is_a_recoverable_step_failure_not_a_task_failure() {
    let page = FakePage::new();
    let bogus_action = json!({
        "evaluation_previous_goal": "starting",
        "memory": "",
        "next_goal": "do something unsupported",
        "action": { "not_a_real_tool": {} },
    });
    let llm = Arc::new(ScriptedLlm::new(vec![bogus_action, done_action(false, "gave up")]));
    let mut agent = Agent::new(Box::new(page), llm, AgentConfig::default());

    let result = agent.execute("try something invalid").await;

    assert!(!result.success);
    assert_eq!(result.history.len(), 2);
    assert_eq!(result.history[0].action.name, "not_a_real_tool");
    assert!(result.history[0].action.output.contains("not_a_real_tool") || !result.history[0].action.output.is_empty());
}

#[tokio::test]
async fn exceeding_max_steps_terminates_with_failure() {
    let page = FakePage::new();
    let responses: Vec<Value> = (0..5).map(|_| click_action(0)).collect();
    let llm = Arc::new(ScriptedLlm::new(responses));
    let mut config = AgentConfig::default();
    config.max_steps = 3;
    let mut agent = Agent::new(Box::new(page), llm, config);

    let result = agent.execute("keep clicking forever").await;

    assert!(!result.success);
    assert_eq!(result.data, "Step count exceeded maximum limit");
    assert_eq!(result.history.len(), 4);
}

#[tokio::test]
async fn abort_mid_llm_call_stops_the_task_immediately() {
    let page = FakePage::new();
    let llm = Arc::new(ScriptedLlm {
        responses: Mutex::new(vec![done_action(true, "should never be reached")]),
        abort_after_first_call: true,
    });
    let mut agent = Agent::new(Box::new(page), llm, AgentConfig::default());

    let result = agent.execute("this will be aborted").await;

    assert!(!result.success);
    assert_eq!(result.data, "stopping after first call");
    assert!(result.history.is_empty());
}

#[tokio::test]
async fn custom_namespace_is_used_for_marker_resolution() {
    let page = Arc::new(FakePage::new());

    struct Wrap(Arc<FakePage>);
    #[async_trait]
    impl Page for Wrap {
        async fn evaluate_json(&self, s: &str) -> anyhow::Result<Value> { self.0.evaluate_json(s).await }
        async fn resolve_marker(&self, ns: &str, i: u32) -> anyhow::Result<HandleRef> { self.0.resolve_marker(ns, i).await }
        async fn scroll_into_view(&self, h: &HandleRef) -> anyhow::Result<()> { self.0.scroll_into_view(h).await }
        async fn click(&self, h: &HandleRef) -> anyhow::Result<()> { self.0.click(h).await }
        async fn fill(&self, h: &HandleRef, t: &str) -> anyhow::Result<()> { self.0.fill(h, t).await }
        async fn select_by_label(&self, h: &HandleRef, t: &str) -> anyhow::Result<bool> { self.0.select_by_label(h, t).await }
        async fn element_scroll_top(&self, h: &HandleRef) -> anyhow::Result<f64> { self.0.element_scroll_top(h).await }
        async fn element_scroll_left(&self, h: &HandleRef) -> anyhow::Result<f64> { self.0.element_scroll_left(h).await }
        async fn scroll_element_by(&self, h: &HandleRef, dx: f64, dy: f64) -> anyhow::Result<()> { self.0.scroll_element_by(h, dx, dy).await }
        async fn scroll_window_by(&self, dx: f64, dy: f64) -> anyhow::Result<()> { self.0.scroll_window_by(dx, dy).await }
        async fn is_target_blank(&self, h: &HandleRef) -> anyhow::Result<bool> { self.0.is_target_blank(h).await }
        async fn eval_user_script(&self, s: &str) -> anyhow::Result<String> { self.0.eval_user_script(s).await }
        async fn url(&self) -> anyhow::Result<String> { self.0.url().await }
        async fn title(&self) -> anyhow::Result<String> { self.0.title().await }
        async fn page_info(&self) -> anyhow::Result<PageInfo> { self.0.page_info().await }
    }

    let llm = Arc::new(ScriptedLlm::new(vec![click_action(0), done_action(true, "done")]));
    let mut config = AgentConfig::default();
    config.namespace = "custom42".to_string();
    let mut agent = Agent::new(Box::new(Wrap(page.clone())), llm, config);

    let result = agent.execute("click it").await;

    assert!(result.success);
    assert_eq!(*page.namespace.lock().unwrap(), "custom42");
}

#[test]
fn fake_page_constructs_without_panicking() {
    let _ = HashMap::<u32, u32>::new();
    let _ = FakePage::new();
}
