//! Page interaction
//!
//! `Page` wraps an attached target session with the operations a scraping
//! run needs: retried navigation, script evaluation, element lookup, raw
//! input dispatch and the dynamic-content scroll loop. The human-emulation
//! layer builds on top of these primitives.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::cdp::{BoxModel, MouseButton, MouseEventType, TargetSession};
use crate::content;
use crate::error::{Error, Result};
use crate::human::Human;
use crate::navigate::{self, NavigateOptions, WaitUntil};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const NETWORK_IDLE_WINDOW_MS: u64 = 500;

/// A page (tab) in the browser.
pub struct Page {
    session: TargetSession,
}

impl Page {
    pub(crate) fn new(session: TargetSession) -> Self {
        Self { session }
    }

    pub(crate) fn session(&self) -> &TargetSession {
        &self.session
    }

    /// Navigate with explicit options, retrying failed attempts with
    /// exponential backoff.
    pub async fn navigate(&self, url: &str, options: &NavigateOptions) -> Result<()> {
        navigate::run_with_retry(url, options.max_attempts, options.base_delay, |_attempt| {
            self.attempt_navigation(url, options.wait_until, options.timeout)
        })
        .await
    }

    /// Navigate with default options (load event, 60s timeout, 3 attempts).
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.navigate(url, &NavigateOptions::default()).await
    }

    /// One bounded navigation attempt: request the load, then wait for the
    /// readiness criterion. The whole attempt shares a single deadline.
    async fn attempt_navigation(
        &self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<()> {
        tokio::time::timeout(timeout, async {
            let result = self.session.navigate(url).await?;
            if let Some(reason) = result.error_text {
                return Err(Error::NavigationAttempt(reason));
            }
            self.wait_ready(wait_until).await
        })
        .await
        .map_err(|_| Error::Timeout(format!("navigation to {url}")))?
    }

    /// Poll until the page satisfies `wait_until`. Bounded by the caller.
    async fn wait_ready(&self, wait_until: WaitUntil) -> Result<()> {
        if wait_until == WaitUntil::NetworkIdle {
            self.install_network_tracker().await?;
        }

        loop {
            let ready: String = self.evaluate("document.readyState").await?;
            let done = match wait_until {
                WaitUntil::DomContentLoaded => ready == "interactive" || ready == "complete",
                WaitUntil::Load => ready == "complete",
                WaitUntil::NetworkIdle => ready == "complete" && self.network_idle().await?,
            };
            if done {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Patch fetch/XHR with a pending-request counter so idleness can be
    /// observed from script. Installing twice is a no-op.
    async fn install_network_tracker(&self) -> Result<()> {
        self.execute(
            r#"(() => {
                if (window.__pendingRequests !== undefined) return;
                window.__pendingRequests = 0;
                window.__lastRequestDone = Date.now();
                const done = () => {
                    window.__pendingRequests--;
                    window.__lastRequestDone = Date.now();
                };
                const origFetch = window.fetch;
                window.fetch = function(...args) {
                    window.__pendingRequests++;
                    return origFetch.apply(this, args).then(
                        r => { done(); return r; },
                        e => { done(); throw e; }
                    );
                };
                const origSend = XMLHttpRequest.prototype.send;
                XMLHttpRequest.prototype.send = function(...args) {
                    window.__pendingRequests++;
                    this.addEventListener('loadend', done);
                    return origSend.apply(this, args);
                };
            })()"#,
        )
        .await
    }

    /// Idle means no pending fetch/XHR and none finished inside the window.
    async fn network_idle(&self) -> Result<bool> {
        self.evaluate(&format!(
            "window.__pendingRequests === 0 && (Date.now() - window.__lastRequestDone) >= {NETWORK_IDLE_WINDOW_MS}"
        ))
        .await
    }

    /// Current URL of the main frame
    pub async fn url(&self) -> Result<String> {
        let tree = self.session.get_frame_tree().await?;
        Ok(tree.frame.url)
    }

    /// Document title
    pub async fn title(&self) -> Result<String> {
        self.evaluate("document.title").await
    }

    /// Full serialized HTML of the page
    pub async fn content(&self) -> Result<String> {
        self.evaluate("document.documentElement.outerHTML").await
    }

    /// Evaluate a JavaScript expression and deserialize its value.
    pub async fn evaluate<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let result = self.session.evaluate(expression).await?;
        if let Some(exception) = result.exception_details {
            return Err(Error::CdpSimple(exception.text));
        }
        let value = result.result.value.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Evaluate a JavaScript expression, discarding its value.
    pub async fn execute(&self, expression: &str) -> Result<()> {
        let result = self.session.evaluate(expression).await?;
        if let Some(exception) = result.exception_details {
            return Err(Error::CdpSimple(exception.text));
        }
        Ok(())
    }

    /// Find an element by CSS selector
    pub async fn find(&self, selector: &str) -> Result<Element<'_>> {
        let root = self.session.get_document().await?;
        let node_id = self.session.query_selector(root.node_id, selector).await?;
        if node_id == 0 {
            return Err(Error::ElementNotFound(selector.to_string()));
        }
        Ok(Element {
            page: self,
            node_id,
        })
    }

    /// Poll until `selector` matches an element
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<Element<'_>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.find(selector).await {
                Ok(element) => return Ok(element),
                Err(Error::ElementNotFound(_)) => {}
                Err(e) => return Err(e),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Timeout(format!("waiting for {selector}")));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Poll until `selector` matches an element that has layout
    pub async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<Element<'_>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(element) = self.find(selector).await {
                if element.bounding_box().await.is_ok() {
                    return Ok(element);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Timeout(format!("waiting for visible {selector}")));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Viewport size as (width, height)
    pub async fn viewport_size(&self) -> Result<(f64, f64)> {
        let size: Vec<f64> = self
            .evaluate("[window.innerWidth, window.innerHeight]")
            .await?;
        if size.len() != 2 {
            return Err(Error::CdpSimple("unexpected viewport size shape".into()));
        }
        Ok((size[0], size[1]))
    }

    /// Current vertical scroll position
    pub async fn scroll_y(&self) -> Result<f64> {
        self.evaluate("window.scrollY").await
    }

    /// Total document height
    pub async fn scroll_height(&self) -> Result<f64> {
        self.evaluate("document.body.scrollHeight").await
    }

    /// Scroll by a vertical delta
    pub async fn scroll_by(&self, delta_y: f64) -> Result<()> {
        self.execute(&format!("window.scrollBy(0, {delta_y})")).await
    }

    /// Scroll to an absolute vertical position
    pub async fn scroll_to(&self, y: f64) -> Result<()> {
        self.execute(&format!("window.scrollTo(0, {y})")).await
    }

    /// Scroll to the bottom repeatedly until the document height stops
    /// growing. Uses a 2 second render pause and a 50 round ceiling.
    pub async fn scroll_to_bottom(&self) -> Result<u32> {
        self.scroll_to_bottom_with(Duration::from_secs(2), Some(50))
            .await
    }

    /// Scroll-to-bottom with explicit pause and round ceiling. `None`
    /// removes the ceiling, trusting the page to stop growing.
    pub async fn scroll_to_bottom_with(
        &self,
        pause: Duration,
        max_rounds: Option<u32>,
    ) -> Result<u32> {
        content::settle_height(
            pause,
            max_rounds,
            || self.scroll_height(),
            || self.execute("window.scrollTo(0, document.body.scrollHeight)"),
        )
        .await
    }

    /// Dispatch a raw click at viewport coordinates
    pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        self.session
            .dispatch_mouse_event(
                MouseEventType::MousePressed,
                x,
                y,
                Some(MouseButton::Left),
                Some(1),
            )
            .await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.session
            .dispatch_mouse_event(
                MouseEventType::MouseReleased,
                x,
                y,
                Some(MouseButton::Left),
                Some(1),
            )
            .await
    }

    /// Click the center of the first element matching `selector`
    pub async fn click(&self, selector: &str) -> Result<()> {
        let element = self.find(selector).await?;
        let (x, y) = element.center().await?;
        self.click_at(x, y).await
    }

    /// Human-behavior emulator for this page
    pub fn human(&self) -> Human<'_> {
        Human::new(self)
    }

    /// Human-behavior emulator with a fixed randomness seed
    pub fn human_seeded(&self, seed: u64) -> Human<'_> {
        Human::seeded(self, seed)
    }
}

/// A handle to an element on a page.
pub struct Element<'a> {
    page: &'a Page,
    node_id: i32,
}

impl Element<'_> {
    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    /// Box model of the element. Errors when the element has no layout.
    pub async fn box_model(&self) -> Result<BoxModel> {
        self.page.session.get_box_model(self.node_id).await
    }

    /// Axis-aligned bounds as (x, y, width, height)
    pub async fn bounding_box(&self) -> Result<(f64, f64, f64, f64)> {
        let model = self.box_model().await?;
        model
            .bounds()
            .ok_or_else(|| Error::CdpSimple("element has no content quad".into()))
    }

    /// Center point of the element
    pub async fn center(&self) -> Result<(f64, f64)> {
        let (x, y, w, h) = self.bounding_box().await?;
        Ok((x + w / 2.0, y + h / 2.0))
    }
}
