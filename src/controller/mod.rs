use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::dom::{
    DomExtractor, ElementTextMap, FlatSnapshot, HandleRef, Page, PageInfo, SelectorMap,
    TreeSerializer,
};
use crate::error::{AgentError, Result};

/// Result of a single PageController action (spec §4.3): "Every action
/// returns `{success, message}`."
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollVerticalArgs {
    pub down: bool,
    pub num_pages: f64,
    pub pixels: Option<f64>,
    pub index: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollHorizontalArgs {
    pub right: bool,
    pub pixels: f64,
    pub index: Option<u32>,
}

/// Observer hook for the controller's `beforeUpdate`/`afterUpdate` events
/// (spec §6, §9 "observers only; they must not mutate the snapshot").
pub trait RefreshObserver: Send + Sync {
    fn before_update(&self) {}
    fn after_update(&self, _snapshot: &FlatSnapshot) {}
}

/// Holds the latest snapshot, selector map, element text map, serialized
/// HTML, and last-refresh timestamp; exposes indexed actions that resolve
/// index → handle and perform them (spec §4.3).
pub struct PageController {
    page: Box<dyn Page>,
    extractor: DomExtractor,
    serializer: TreeSerializer,
    viewport_expansion: i64,
    namespace: String,

    snapshot: Option<FlatSnapshot>,
    selector_map: SelectorMap,
    element_text_map: ElementTextMap,
    serialized_html: String,
    last_refresh: Option<Instant>,
    observers: Vec<Box<dyn RefreshObserver>>,
}

impl PageController {
    pub fn new(
        page: Box<dyn Page>,
        namespace: impl Into<String>,
        viewport_expansion: i64,
        include_attributes: &[String],
    ) -> Self {
        let namespace = namespace.into();
        Self {
            page,
            extractor: DomExtractor::new(namespace.clone()),
            serializer: TreeSerializer::new(include_attributes),
            viewport_expansion,
            namespace,
            snapshot: None,
            selector_map: SelectorMap::new(),
            element_text_map: ElementTextMap::new(),
            serialized_html: String::new(),
            last_refresh: None,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn RefreshObserver>) {
        self.observers.push(observer);
    }

    /// Runs the extractor, resolves handles for each index, rebuilds
    /// serialization, and replaces the maps atomically (spec §4.3, §9).
    pub async fn refresh(&mut self) -> Result<()> {
        for o in &self.observers {
            o.before_update();
        }

        let mut snapshot = self
            .extractor
            .extract(self.page.as_ref(), self.viewport_expansion)
            .await
            .map_err(AgentError::Internal)?;

        let indices: Vec<u32> = snapshot.interactive_nodes().iter().map(|n| n.index).collect();
        let mut selector_map = SelectorMap::new();
        for index in indices {
            match self.page.resolve_marker(&self.namespace, index).await {
                Ok(handle) => {
                    if let Some(node) = snapshot
                        .nodes
                        .values_mut()
                        .find_map(|n| match n {
                            crate::dom::DomNode::Interactive(i) if i.index == index => Some(i),
                            _ => None,
                        })
                    {
                        node.handle = Some(handle.clone());
                        selector_map.insert(index, node.clone());
                    }
                }
                Err(e) => {
                    warn!(index, error = %e, "could not resolve handle for index, dropping from selector map");
                }
            }
        }

        let (html, text_map) = self.serializer.render(&snapshot);

        self.snapshot = Some(snapshot);
        self.selector_map = selector_map;
        self.element_text_map = text_map;
        self.serialized_html = html;
        self.last_refresh = Some(Instant::now());

        if let Some(snapshot) = &self.snapshot {
            for o in &self.observers {
                o.after_update(snapshot);
            }
        }

        debug!(elements = self.selector_map.len(), "refreshed page snapshot");
        Ok(())
    }

    fn resolve(&self, index: u32) -> Result<&HandleRef> {
        self.selector_map
            .get(&index)
            .and_then(|n| n.handle.as_ref())
            .ok_or(AgentError::UnknownIndex(index))
    }

    pub fn element_description(&self, index: u32) -> String {
        self.element_text_map
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("element [{}]", index))
    }

    pub async fn click(&mut self, index: u32) -> Result<ActionOutcome> {
        let handle = self.resolve(index)?.clone();
        self.page
            .scroll_into_view(&handle)
            .await
            .map_err(|e| AgentError::Action(e.to_string()))?;
        self.page
            .click(&handle)
            .await
            .map_err(|e| AgentError::Action(e.to_string()))?;

        let description = self.element_description(index);
        let target_blank = self.page.is_target_blank(&handle).await.unwrap_or(false);
        let message = if target_blank {
            format!(
                "Clicked {} — it opened in a new tab; this agent cannot see new-tab content.",
                description
            )
        } else {
            format!("Clicked {}", description)
        };
        Ok(ActionOutcome::ok(message))
    }

    pub async fn type_text(&mut self, index: u32, text: &str) -> Result<ActionOutcome> {
        let handle = self.resolve(index)?.clone();
        self.page
            .scroll_into_view(&handle)
            .await
            .map_err(|e| AgentError::Action(e.to_string()))?;
        self.page
            .fill(&handle, text)
            .await
            .map_err(|e| AgentError::Action(e.to_string()))?;
        let description = self.element_description(index);
        Ok(ActionOutcome::ok(format!("Typed \"{}\" into {}", text, description)))
    }

    pub async fn select(&mut self, index: u32, option_text: &str) -> Result<ActionOutcome> {
        let handle = self.resolve(index)?.clone();
        self.page
            .scroll_into_view(&handle)
            .await
            .map_err(|e| AgentError::Action(e.to_string()))?;
        let selected = self
            .page
            .select_by_label(&handle, option_text)
            .await
            .map_err(|e| AgentError::Action(e.to_string()))?;
        let description = self.element_description(index);
        if selected {
            Ok(ActionOutcome::ok(format!("Selected \"{}\" in {}", option_text, description)))
        } else {
            Ok(ActionOutcome::ok(format!("{} has no options; selection skipped", description)))
        }
    }

    pub async fn scroll_vertical(&mut self, args: ScrollVerticalArgs) -> Result<ActionOutcome> {
        let viewport_height = self
            .page
            .page_info()
            .await
            .map(|p| p.viewport_height)
            .unwrap_or(800.0);
        let sign = if args.down { 1.0 } else { -1.0 };
        let amount = args.pixels.unwrap_or(args.num_pages * sign * viewport_height);

        if let Some(index) = args.index {
            if let Ok(handle) = self.resolve(index).map(|h| h.clone()) {
                let before = self.page.element_scroll_top(&handle).await.unwrap_or(0.0);
                self.page
                    .scroll_element_by(&handle, 0.0, amount)
                    .await
                    .map_err(|e| AgentError::Action(e.to_string()))?;
                let after = self.page.element_scroll_top(&handle).await.unwrap_or(before);
                if (after - before).abs() > 0.5 {
                    let description = self.element_description(index);
                    return Ok(ActionOutcome::ok(format!(
                        "Scrolled {} by {} px",
                        description, amount
                    )));
                }
                // Falls through to window scroll below.
            }
        }

        self.page
            .scroll_window_by(0.0, amount)
            .await
            .map_err(|e| AgentError::Action(e.to_string()))?;
        Ok(ActionOutcome::ok(format!(
            "Scrolled the page {} by {} px",
            if args.down { "down" } else { "up" },
            amount.abs()
        )))
    }

    pub async fn scroll_horizontal(&mut self, args: ScrollHorizontalArgs) -> Result<ActionOutcome> {
        let sign = if args.right { 1.0 } else { -1.0 };
        let amount = args.pixels * sign;

        if let Some(index) = args.index {
            if let Ok(handle) = self.resolve(index).map(|h| h.clone()) {
                let before = self.page.element_scroll_left(&handle).await.unwrap_or(0.0);
                self.page
                    .scroll_element_by(&handle, amount, 0.0)
                    .await
                    .map_err(|e| AgentError::Action(e.to_string()))?;
                let after = self.page.element_scroll_left(&handle).await.unwrap_or(before);
                if (after - before).abs() > 0.5 {
                    let description = self.element_description(index);
                    return Ok(ActionOutcome::ok(format!(
                        "Scrolled {} horizontally by {} px",
                        description, amount
                    )));
                }
                // Falls through to window scroll below.
            }
        }

        self.page
            .scroll_window_by(amount, 0.0)
            .await
            .map_err(|e| AgentError::Action(e.to_string()))?;
        Ok(ActionOutcome::ok(format!(
            "Scrolled the page {} by {} px",
            if args.right { "right" } else { "left" },
            amount.abs()
        )))
    }

    /// Evaluates `(async () => { <source> })()`. Off by default; the
    /// caller (AgentConfig) gates whether this is ever invoked (spec §4.3,
    /// §9).
    pub async fn exec_script(&mut self, source: &str) -> Result<ActionOutcome> {
        let result = self
            .page
            .eval_user_script(source)
            .await
            .map_err(|e| AgentError::Action(e.to_string()))?;
        Ok(ActionOutcome::ok(result))
    }

    pub async fn url(&self) -> Result<String> {
        self.page.url().await.map_err(|e| AgentError::Action(e.to_string()))
    }

    pub async fn title(&self) -> Result<String> {
        self.page.title().await.map_err(|e| AgentError::Action(e.to_string()))
    }

    pub async fn page_info(&self) -> Result<PageInfo> {
        self.page.page_info().await.map_err(|e| AgentError::Action(e.to_string()))
    }

    pub fn serialized_html(&self) -> &str {
        &self.serialized_html
    }

    pub fn element_count(&self) -> usize {
        self.selector_map.len()
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }

    pub fn time_since_refresh(&self) -> Duration {
        self.last_refresh.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Drops the snapshot, clears maps, resets serialized HTML (spec §4.3).
    pub fn dispose(&mut self) {
        self.snapshot = None;
        self.selector_map.clear();
        self.element_text_map.clear();
        self.serialized_html.clear();
        self.last_refresh = None;
    }
}
