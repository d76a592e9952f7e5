use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dom::types::HandleRef;

/// Page geometry returned both in the `<browser_state>` prompt block and as
/// an API return (spec §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageInfo {
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub page_width: f64,
    pub page_height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub pixels_above: f64,
    pub pixels_below: f64,
    pub pages_above: f64,
    pub pages_below: f64,
    pub total_pages: f64,
    pub current_page_position: f64,
    pub pixels_left: f64,
    pub pixels_right: f64,
}

/// The browser-automation library seam named (but not specified) by spec
/// §1/§6: "the browser-automation library providing page, element handles,
/// and viewport APIs." `PageController` and `DomExtractor` depend only on
/// this trait, never on a concrete browser crate, so the core is testable
/// against a fake and portable across automation backends.
#[async_trait]
pub trait Page: Send + Sync {
    /// Evaluate `script` (a full, self-contained JS expression) in the
    /// page's own scripting context and return its JSON-serializable
    /// result. Used to run the extractor's in-page walk.
    async fn evaluate_json(&self, script: &str) -> anyhow::Result<serde_json::Value>;

    /// Recover a live element handle for the marker attribute
    /// `data-<ns>-index="<index>"` stamped during extraction (spec §4.1,
    /// §9). Errors if no element carries that marker.
    async fn resolve_marker(&self, namespace: &str, index: u32) -> anyhow::Result<HandleRef>;

    async fn scroll_into_view(&self, handle: &HandleRef) -> anyhow::Result<()>;
    async fn click(&self, handle: &HandleRef) -> anyhow::Result<()>;
    /// Empty the field, then fill it with `text` (spec §4.3 "type empties
    /// the field before filling").
    async fn fill(&self, handle: &HandleRef, text: &str) -> anyhow::Result<()>;
    /// Select the `<option>` whose visible label matches `text`
    /// case-insensitively. Returns `Ok(false)` if the element has zero
    /// `<option>` children (spec §4.3's no-op "skipped" case).
    async fn select_by_label(&self, handle: &HandleRef, text: &str) -> anyhow::Result<bool>;

    /// Current `scrollTop` of the element, for the "did it actually move"
    /// fallback check in `scrollVertical` (spec §4.3).
    async fn element_scroll_top(&self, handle: &HandleRef) -> anyhow::Result<f64>;
    /// Current `scrollLeft` of the element, for the same fallback check in
    /// `scrollHorizontal` (spec §4.3 "symmetric" to `scrollVertical`).
    async fn element_scroll_left(&self, handle: &HandleRef) -> anyhow::Result<f64>;
    async fn scroll_element_by(&self, handle: &HandleRef, dx: f64, dy: f64) -> anyhow::Result<()>;
    async fn scroll_window_by(&self, dx: f64, dy: f64) -> anyhow::Result<()>;

    /// Whether the handle is an `<a>` with `target="_blank"` (spec §4.3
    /// warning).
    async fn is_target_blank(&self, handle: &HandleRef) -> anyhow::Result<bool>;

    /// Evaluate `(async () => { <source> })()` on the page and return its
    /// stringified result (spec §4.3 `execScript`).
    async fn eval_user_script(&self, source: &str) -> anyhow::Result<String>;

    async fn url(&self) -> anyhow::Result<String>;
    async fn title(&self) -> anyhow::Result<String>;
    async fn page_info(&self) -> anyhow::Result<PageInfo>;
}

/// The in-page DOM walk the extractor evaluates via `Page::evaluate_json`
/// (spec §4.1). `{ns}` is substituted with the marker namespace at call
/// time so the stamped attribute is `data-<ns>-index`.
///
/// Returns `{ rootId, indexCount, nodes: { [nodeId]: NodeRecord } }` where
/// each `NodeRecord` carries a `kind` of `"text" | "element" | "interactive"`
/// and the fields [`crate::dom::types::DomNode`] expects.
pub const EXTRACTOR_WALK_SCRIPT_TEMPLATE: &str = include_str!("walk.js");

pub fn render_walk_script(namespace: &str, viewport_expansion: i64) -> String {
    EXTRACTOR_WALK_SCRIPT_TEMPLATE
        .replace("__NAMESPACE__", namespace)
        .replace("__VIEWPORT_EXPANSION__", &viewport_expansion.to_string())
}
