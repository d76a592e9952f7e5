pub mod abort;
pub mod history;
pub mod prompts;

pub use abort::AbortSignal;
pub use history::{ActionRecord, Brain, HistoryEntry, Usage};
pub use prompts::{system_prompt, PromptAssembler};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::controller::PageController;
use crate::dom::Page;
use crate::error::AgentError;
use crate::llm::{render_tool_catalog, LlmClient};
use crate::tools::{default_tools, Tool, ToolDefinition, ToolRegistry};

/// Cumulative-wait warning threshold (spec §6): 3 seconds.
pub const WAIT_WARNING_THRESHOLD: Duration = Duration::from_secs(3);

/// `new Agent(config)` (spec §6): page handle, LLM options, extraction
/// tuning, custom tools, lifecycle hooks, and the script-execution gate.
pub struct AgentConfig {
    /// Must be unique to this agent instance; becomes the
    /// `data-<ns>-index` marker attribute (spec §6).
    pub namespace: String,
    /// `-1`=full page, `0`=viewport only, positive=pad by N px
    /// (spec §4.1). Default per spec §6: `-1`.
    pub viewport_expansion: i64,
    pub include_attributes: Vec<String>,
    pub custom_tools: Vec<Arc<dyn Tool>>,
    /// Names of default tools to omit (spec §4.4: "a tool value of `null`
    /// removes a default by name").
    pub removed_tools: Vec<String>,
    /// Gates `execute_javascript` (spec §4.4 "(gated)", §9 "MUST NOT
    /// expose it by default").
    pub experimental_script_execution_tool: bool,
    pub max_steps: u32,
    pub language: String,
    pub hooks: AgentHooks,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            namespace: "agt".to_string(),
            viewport_expansion: -1,
            include_attributes: Vec::new(),
            custom_tools: Vec::new(),
            removed_tools: Vec::new(),
            experimental_script_execution_tool: false,
            max_steps: 50,
            language: "English".to_string(),
            hooks: AgentHooks::default(),
        }
    }
}

type VoidHook = Arc<dyn Fn() + Send + Sync>;
type StepHook = Arc<dyn Fn(u32) + Send + Sync>;
type HistoryHook = Arc<dyn Fn(&HistoryEntry) + Send + Sync>;
type ResultHook = Arc<dyn Fn(&AgentResult) + Send + Sync>;

/// Lifecycle hooks (spec §6): `onBefore/AfterStep`, `onBefore/AfterTask`,
/// `onDispose`.
#[derive(Default, Clone)]
pub struct AgentHooks {
    pub on_before_task: Option<VoidHook>,
    pub on_after_task: Option<ResultHook>,
    pub on_before_step: Option<StepHook>,
    pub on_after_step: Option<HistoryHook>,
    pub on_dispose: Option<VoidHook>,
}

/// Cloneable remote-control surface for an [`AgentLoop`] that's running
/// `execute` elsewhere (e.g. in a spawned task owned by the API layer).
#[derive(Clone)]
pub struct AgentHandle {
    paused: Arc<AtomicBool>,
    disposed: Arc<AtomicBool>,
    abort: AbortSignal,
}

impl AgentHandle {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn abort(&self, reason: impl Into<String>) {
        self.abort.trigger(reason);
    }

    pub fn dispose(&self, reason: impl Into<String>) {
        self.disposed.store(true, Ordering::SeqCst);
        self.abort.trigger(reason.into());
    }
}

/// `agent.execute(task)`'s return value (spec §6).
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub success: bool,
    pub data: String,
    pub history: Vec<HistoryEntry>,
}

/// Orchestrates one task: prompt assembly, LLM invocation, response
/// validation, tool dispatch, history bookkeeping, termination,
/// pause/abort (spec §4.5). State: `{task, taskId, history[], paused,
/// disposed, abortSignal, totalWaitTime}`.
pub struct AgentLoop {
    controller: PageController,
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    config: AgentConfig,

    task: String,
    task_id: String,
    history: Vec<HistoryEntry>,
    paused: Arc<AtomicBool>,
    disposed: Arc<AtomicBool>,
    abort: AbortSignal,
    total_wait_time: Duration,
    done_signal: Option<(bool, String)>,
    pending_questions: Vec<String>,
}

impl AgentLoop {
    pub fn new(page: Box<dyn Page>, llm: Arc<dyn LlmClient>, config: AgentConfig) -> Self {
        let controller = PageController::new(
            page,
            config.namespace.clone(),
            config.viewport_expansion,
            &config.include_attributes,
        );

        let mut tools = ToolRegistry::new();
        default_tools::register_defaults(&mut tools, config.experimental_script_execution_tool);
        for name in &config.removed_tools {
            tools.remove(name);
        }
        for tool in &config.custom_tools {
            tools.register(tool.clone());
        }

        Self {
            controller,
            llm,
            tools,
            config,
            task: String::new(),
            task_id: String::new(),
            history: Vec::new(),
            paused: Arc::new(AtomicBool::new(false)),
            disposed: Arc::new(AtomicBool::new(false)),
            abort: AbortSignal::new(),
            total_wait_time: Duration::ZERO,
            done_signal: None,
            pending_questions: Vec::new(),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Idempotent; aborts the in-flight LLM call/tool and releases
    /// resources (spec §6).
    pub fn dispose(&mut self, reason: Option<String>) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.abort.trigger(reason.unwrap_or_else(|| "disposed".to_string()));
        self.controller.dispose();
        if let Some(hook) = self.config.hooks.on_dispose.clone() {
            hook();
        }
    }

    pub fn abort(&self, reason: impl Into<String>) {
        self.abort.trigger(reason);
    }

    pub fn controller_mut(&mut self) -> &mut PageController {
        &mut self.controller
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn total_wait_time(&self) -> Duration {
        self.total_wait_time
    }

    pub fn time_since_last_refresh(&self) -> Duration {
        self.controller.time_since_refresh()
    }

    pub fn record_question(&mut self, question: String) {
        self.pending_questions.push(question);
    }

    pub fn pending_questions(&self) -> &[String] {
        &self.pending_questions
    }

    pub fn mark_done(&mut self, success: bool, text: String) {
        self.done_signal = Some((success, text));
    }

    /// A cheap, cloneable handle for controlling this agent from outside
    /// the task that owns `execute`'s `&mut self` — e.g. an API layer that
    /// spawns `execute` and needs to pause/abort it concurrently.
    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            paused: self.paused.clone(),
            disposed: self.disposed.clone(),
            abort: self.abort.clone(),
        }
    }

    /// One call = one task (spec §4.5).
    #[instrument(skip(self), fields(task_id = %self.task_id))]
    pub async fn execute(&mut self, task: &str) -> AgentResult {
        self.task = task.to_string();
        self.task_id = Uuid::new_v4().to_string();
        self.history.clear();
        self.abort.reset();
        self.done_signal = None;
        self.total_wait_time = Duration::ZERO;

        if let Some(hook) = self.config.hooks.on_before_task.clone() {
            hook();
        }

        let mut step: u32 = 1;
        let result = loop {
            if let Some(hook) = self.config.hooks.on_before_step.clone() {
                hook(step);
            }

            if self.disposed.load(Ordering::SeqCst) && !self.abort.is_aborted() {
                self.abort.trigger("agent disposed");
            }
            if self.abort.is_aborted() {
                break self.abort_result();
            }

            while self.paused.load(Ordering::SeqCst) {
                if self.abort.is_aborted() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            if self.abort.is_aborted() {
                break self.abort_result();
            }

            if let Err(e) = self.controller.refresh().await {
                break AgentResult {
                    success: false,
                    data: format!("fatal: could not refresh page: {e}"),
                    history: self.history.clone(),
                };
            }

            let tool_defs = self.tools.definitions();
            let system = format!(
                "{}\n\n{}",
                system_prompt(&self.config.language),
                render_tool_catalog(&tool_defs)
            );

            let url = self.controller.url().await.unwrap_or_default();
            let title = self.controller.title().await.unwrap_or_default();
            let page_info = match self.controller.page_info().await {
                Ok(p) => p,
                Err(e) => {
                    break AgentResult {
                        success: false,
                        data: format!("fatal: could not read page info: {e}"),
                        history: self.history.clone(),
                    }
                }
            };
            let user = PromptAssembler::user_prompt(
                &self.task,
                &self.history,
                step,
                self.config.max_steps,
                &url,
                &title,
                &page_info,
                self.controller.serialized_html(),
                &tool_defs,
            );

            let decoded = match self.llm.complete(&system, &user, &self.abort).await {
                Ok(v) => v,
                Err(e) => {
                    if self.abort.is_aborted() {
                        break self.abort_result();
                    }
                    break AgentResult {
                        success: false,
                        data: format!("LLM error: {e}"),
                        history: self.history.clone(),
                    };
                }
            };

            let entry = self.run_step(step, decoded, &tool_defs).await;
            if let Some(hook) = self.config.hooks.on_after_step.clone() {
                hook(&entry);
            }
            self.history.push(entry);

            if self.abort.is_aborted() {
                break self.abort_result();
            }

            if let Some((success, data)) = self.done_signal.take() {
                break AgentResult { success, data, history: self.history.clone() };
            }

            if step > self.config.max_steps {
                break AgentResult {
                    success: false,
                    data: "Step count exceeded maximum limit".to_string(),
                    history: self.history.clone(),
                };
            }
            step += 1;
        };

        if let Some(hook) = self.config.hooks.on_after_task.clone() {
            hook(&result);
        }
        info!(success = result.success, steps = self.history.len(), "task finished");
        result
    }

    fn abort_result(&self) -> AgentResult {
        AgentResult {
            success: false,
            data: self.abort.reason().unwrap_or_else(|| "aborted".to_string()),
            history: self.history.clone(),
        }
    }

    /// Decodes one action object, validates it, dispatches it, and returns
    /// the resulting HistoryEntry. Step-level failures (spec §7: `Schema`,
    /// `UnknownTool`, `UnknownIndex`, `Action`) become the entry's action
    /// output rather than terminating the task.
    async fn run_step(&mut self, step: u32, decoded: Value, tool_defs: &[ToolDefinition]) -> HistoryEntry {
        let brain = Brain {
            evaluation_previous_goal: decoded
                .get("evaluation_previous_goal")
                .and_then(Value::as_str)
                .map(String::from),
            memory: decoded.get("memory").and_then(Value::as_str).map(String::from),
            next_goal: decoded.get("next_goal").and_then(Value::as_str).map(String::from),
        };

        let (name, input, output) = match self.dispatch_action(&decoded, tool_defs).await {
            Ok(triple) => triple,
            Err(e) => {
                warn!(error = %e, "step failed");
                let name = decoded
                    .get("action")
                    .and_then(Value::as_object)
                    .and_then(|m| m.keys().next())
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                (name, Value::Null, e.to_string())
            }
        };

        HistoryEntry { step, brain, action: ActionRecord { name, input, output }, usage: None }
    }

    async fn dispatch_action(
        &mut self,
        decoded: &Value,
        tool_defs: &[ToolDefinition],
    ) -> Result<(String, Value, String), AgentError> {
        let action = decoded
            .get("action")
            .and_then(Value::as_object)
            .ok_or_else(|| AgentError::Schema("response has no 'action' object".to_string()))?;

        if action.len() != 1 {
            return Err(AgentError::Schema(format!(
                "action must have exactly one key, got {}",
                action.len()
            )));
        }
        let (name, input) = action.iter().next().expect("checked len == 1");
        let name = name.clone();
        let input = input.clone();

        let def = tool_defs
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| AgentError::UnknownTool(name.clone()))?;

        if let Ok(compiled) = JSONSchema::compile(&def.input_schema) {
            if let Err(errors) = compiled.validate(&input) {
                let msg = errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
                return Err(AgentError::Schema(format!("invalid input for '{}': {}", name, msg)));
            }
        }

        let tool = self.tools.get(&name).ok_or_else(|| AgentError::UnknownTool(name.clone()))?;

        let is_wait = name == "wait";
        let start = Instant::now();
        let output = tool.execute(&mut *self, input.clone()).await?;
        let elapsed = start.elapsed();

        let output = if is_wait {
            self.total_wait_time += elapsed;
            if self.total_wait_time >= WAIT_WARNING_THRESHOLD {
                format!(
                    "{} (you've now spent {:.1}s waiting across this task; prefer acting over waiting further)",
                    output,
                    self.total_wait_time.as_secs_f64()
                )
            } else {
                output
            }
        } else {
            self.total_wait_time = Duration::ZERO;
            output
        };

        Ok((name, input, output))
    }
}
