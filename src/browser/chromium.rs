use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;

use crate::dom::{HandleRef, Page, PageInfo};
use crate::util::wait_until;

/// Per-action timeout (spec §5: "each element action carries a short
/// per-action timeout (≈5 s)"). A detached node or a hung page handler
/// surfaces as a timeout error instead of blocking the agent step forever.
const ACTION_TIMEOUT: Duration = Duration::from_secs(5);

/// `chromiumoxide`-backed implementation of [`Page`]. One instance owns one
/// Chrome tab for the lifetime of a task (spec §5 "the page is exclusively
/// owned by one agent"). Element handles are CSS attribute selectors
/// against the marker the extractor stamps (`data-<ns>-index`), not raw CDP
/// backend-node-ids — every action is dispatched as a `document.querySelector`
/// JS call, the same style the teacher's `BrowserManager::click`/`type_text`/
/// `select` use.
pub struct ChromiumPage {
    page: chromiumoxide::Page,
    _browser: Browser,
}

impl ChromiumPage {
    /// Launches a fresh Chrome instance and navigates to `url`.
    pub async fn launch(url: &str, headless: bool) -> Result<Self> {
        let mut config = BrowserConfig::builder().disable_default_args();
        config = if headless {
            config.window_size(1280, 800)
        } else {
            config.with_head().arg("--start-maximized")
        };
        config = config
            .arg("--disable-background-networking")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-breakpad")
            .arg("--disable-client-side-phishing-detection")
            .arg("--disable-default-apps")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-hang-monitor")
            .arg("--disable-popup-blocking")
            .arg("--disable-prompt-on-repost")
            .arg("--disable-sync")
            .arg("--no-first-run")
            .arg("--password-store=basic")
            .arg("--use-mock-keychain")
            .arg("--no-default-browser-check")
            .arg("--disable-infobars");

        let config = config.build().map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = timeout(Duration::from_secs(30), Browser::launch(config))
            .await
            .map_err(|_| anyhow!("browser launch timed out"))?
            .map_err(|e| anyhow!("failed to launch browser: {e}"))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                tracing::trace!("browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("failed to open page: {e}"))?;
        page.goto(url).await.with_context(|| format!("failed to navigate to {url}"))?;

        Ok(Self { page, _browser: browser })
    }

    fn marker_selector(namespace: &str, index: u32) -> String {
        format!("[data-{namespace}-index=\"{index}\"]")
    }

    /// Runs `script` like [`Page::evaluate_json`] but bounds it to
    /// [`ACTION_TIMEOUT`] — every element action goes through this rather
    /// than `evaluate_json` directly (spec §5).
    async fn eval_action(&self, script: &str) -> Result<Value> {
        timeout(ACTION_TIMEOUT, self.evaluate_json(script))
            .await
            .map_err(|_| anyhow!("action timed out after {:?}", ACTION_TIMEOUT))?
    }
}

#[async_trait]
impl Page for ChromiumPage {
    async fn evaluate_json(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("script evaluation failed: {e}"))?;
        result.into_value().map_err(|e| anyhow!("could not decode script result: {e}"))
    }

    async fn resolve_marker(&self, namespace: &str, index: u32) -> Result<HandleRef> {
        let selector = Self::marker_selector(namespace, index);
        let check = format!("!!document.querySelector({selector:?})");
        // A framework re-render can briefly remove and redraw the marked
        // element between the extraction pass and this lookup; poll a
        // short deadline rather than failing on the first miss.
        wait_until(Duration::from_secs(2), || {
            Box::pin(async {
                Ok(self.evaluate_json(&check).await?.as_bool().unwrap_or(false))
            })
        })
        .await
        .map_err(|_| anyhow!("no element carries marker index {index}"))?;
        Ok(HandleRef(selector))
    }

    async fn scroll_into_view(&self, handle: &HandleRef) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel:?}); if (!el) throw new Error('element vanished'); el.scrollIntoView({{behavior: 'instant', block: 'center'}}); return true; }})()",
            sel = handle.0,
        );
        self.eval_action(&script).await?;
        Ok(())
    }

    async fn click(&self, handle: &HandleRef) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel:?});
                if (!el) throw new Error('element vanished');
                const rect = el.getBoundingClientRect();
                const x = rect.left + rect.width / 2;
                const y = rect.top + rect.height / 2;
                for (const type of ['mousedown', 'mouseup', 'click']) {{
                    el.dispatchEvent(new MouseEvent(type, {{bubbles: true, cancelable: true, clientX: x, clientY: y, button: 0}}));
                }}
                return true;
            }})()"#,
            sel = handle.0,
        );
        self.eval_action(&script).await?;
        Ok(())
    }

    async fn fill(&self, handle: &HandleRef, text: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel:?});
                if (!el) throw new Error('element vanished');
                el.focus();
                el.value = '';
                el.value = {text:?};
                el.dispatchEvent(new Event('input', {{bubbles: true, cancelable: true}}));
                el.dispatchEvent(new Event('change', {{bubbles: true, cancelable: true}}));
                return true;
            }})()"#,
            sel = handle.0,
            text = text,
        );
        self.eval_action(&script).await?;
        Ok(())
    }

    async fn select_by_label(&self, handle: &HandleRef, text: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel:?});
                if (!el) throw new Error('element vanished');
                if (!el.options || el.options.length === 0) return false;
                const wanted = {text:?}.toLowerCase();
                for (const opt of el.options) {{
                    if (opt.textContent.trim().toLowerCase() === wanted) {{
                        el.value = opt.value;
                        el.dispatchEvent(new Event('change', {{bubbles: true}}));
                        return true;
                    }}
                }}
                throw new Error('no matching option: ' + {text:?});
            }})()"#,
            sel = handle.0,
            text = text,
        );
        let result = self.eval_action(&script).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn element_scroll_top(&self, handle: &HandleRef) -> Result<f64> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel:?}); return el ? el.scrollTop : 0; }})()",
            sel = handle.0,
        );
        Ok(self.eval_action(&script).await?.as_f64().unwrap_or(0.0))
    }

    async fn element_scroll_left(&self, handle: &HandleRef) -> Result<f64> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel:?}); return el ? el.scrollLeft : 0; }})()",
            sel = handle.0,
        );
        Ok(self.eval_action(&script).await?.as_f64().unwrap_or(0.0))
    }

    async fn scroll_element_by(&self, handle: &HandleRef, dx: f64, dy: f64) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel:?}); if (el) el.scrollBy({dx}, {dy}); return true; }})()",
            sel = handle.0,
        );
        self.eval_action(&script).await?;
        Ok(())
    }

    async fn scroll_window_by(&self, dx: f64, dy: f64) -> Result<()> {
        let script = format!("window.scrollBy({dx}, {dy}); true");
        self.eval_action(&script).await?;
        Ok(())
    }

    async fn is_target_blank(&self, handle: &HandleRef) -> Result<bool> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel:?}); return !!(el && el.tagName === 'A' && el.target === '_blank'); }})()",
            sel = handle.0,
        );
        Ok(self.evaluate_json(&script).await?.as_bool().unwrap_or(false))
    }

    async fn eval_user_script(&self, source: &str) -> Result<String> {
        let script = format!("(async () => {{ {source} }})()");
        let value = self.evaluate_json(&script).await?;
        Ok(match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    async fn url(&self) -> Result<String> {
        self.evaluate_json("window.location.href")
            .await
            .map(|v| v.as_str().unwrap_or_default().to_string())
    }

    async fn title(&self) -> Result<String> {
        self.evaluate_json("document.title")
            .await
            .map(|v| v.as_str().unwrap_or_default().to_string())
    }

    async fn page_info(&self) -> Result<PageInfo> {
        let script = r#"(() => {
            const de = document.documentElement;
            const vw = window.innerWidth, vh = window.innerHeight;
            const pw = de.scrollWidth, ph = de.scrollHeight;
            const sx = window.scrollX, sy = window.scrollY;
            const pixelsAbove = sy;
            const pixelsBelow = Math.max(0, ph - vh - sy);
            const pixelsLeft = sx;
            const pixelsRight = Math.max(0, pw - vw - sx);
            const totalPages = ph > 0 ? ph / vh : 1;
            const pagesAbove = vh > 0 ? pixelsAbove / vh : 0;
            const pagesBelow = vh > 0 ? pixelsBelow / vh : 0;
            const denom = Math.max(1, ph - vh);
            const pos = denom > 0 ? Math.min(100, Math.max(0, (sy / denom) * 100)) : 0;
            return {
                viewport_width: vw, viewport_height: vh,
                page_width: pw, page_height: ph,
                scroll_x: sx, scroll_y: sy,
                pixels_above: pixelsAbove, pixels_below: pixelsBelow,
                pages_above: pagesAbove, pages_below: pagesBelow,
                total_pages: totalPages, current_page_position: pos,
                pixels_left: pixelsLeft, pixels_right: pixelsRight,
            };
        })()"#;
        let value = self.evaluate_json(script).await?;
        serde_json::from_value(value).map_err(|e| anyhow!("could not decode page info: {e}"))
    }
}
