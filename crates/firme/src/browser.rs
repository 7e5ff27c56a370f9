//! Chromium driver backend over the Chrome DevTools Protocol.
//!
//! Enabled with the `browser` feature. [`CdpDriver`] launches (or attaches
//! to) Chromium through `chromiumoxide` and implements [`WebDriver`] on a
//! single tab. Element predicates run as functions bound to the node, each
//! guarded by `isConnected` so a detached node reports a stale reference
//! instead of answering for a DOM it is no longer part of.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
use chromiumoxide::element::Element as CdpNode;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde_json::Value;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::driver::{KeyInput, Navigation, WebDriver, WebElement};
use crate::locator::{js_string, Locator, NativeQuery};
use crate::result::{DriverError, DriverResult, FirmeError, FirmeResult};

const STALE_MARKER: &str = "stale element reference";

/// Browser launch configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Window width
    pub viewport_width: u32,
    /// Window height
    pub viewport_height: u32,
    /// Path to the chromium binary (None = auto-detect)
    pub chromium_path: Option<PathBuf>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Map a CDP failure onto the driver error taxonomy
fn classify(err: CdpError) -> DriverError {
    let message = err.to_string();
    match err {
        CdpError::Ws(_)
        | CdpError::Io(_)
        | CdpError::NoResponse
        | CdpError::ChannelSendError(_)
        | CdpError::Timeout => DriverError::session(message),
        CdpError::JavascriptException(_) => DriverError::script(message),
        _ if message.contains("detached")
            || message.contains("Could not find node")
            || message.contains(STALE_MARKER) =>
        {
            DriverError::stale(message)
        }
        _ => DriverError::interaction(message),
    }
}

/// Function bound to a node that throws once the node left the document
fn guarded(body: &str) -> String {
    format!(
        "function() {{\n  if (!this.isConnected) {{ throw new Error('{STALE_MARKER}'); }}\n  {body}\n}}"
    )
}

/// A DOM node in a [`CdpDriver`] tab
#[derive(Debug)]
pub struct CdpElement {
    node: CdpNode,
}

impl CdpElement {
    async fn call(&self, body: &str) -> DriverResult<Value> {
        let returned = self
            .node
            .call_js_fn(guarded(body), false)
            .await
            .map_err(classify)?;
        if let Some(details) = returned.exception_details {
            let message = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or(details.text);
            return Err(if message.contains(STALE_MARKER) {
                DriverError::stale(message)
            } else {
                DriverError::script(message)
            });
        }
        Ok(returned.result.value.unwrap_or(Value::Null))
    }

    async fn ensure_connected(&self) -> DriverResult<()> {
        self.call("return true;").await.map(|_| ())
    }
}

#[async_trait]
impl WebElement for CdpElement {
    async fn text(&self) -> DriverResult<String> {
        let value = self.call("return this.innerText || this.textContent || '';").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, name: &str) -> DriverResult<Option<String>> {
        let body = format!(
            "const name = {};\n  const prop = this[name];\n  \
             if (typeof prop === 'boolean') {{ return prop ? 'true' : null; }}\n  \
             if (name === 'value' && prop != null) {{ return String(prop); }}\n  \
             return this.getAttribute(name);",
            js_string(name)
        );
        Ok(self.call(&body).await?.as_str().map(str::to_string))
    }

    async fn is_displayed(&self) -> DriverResult<bool> {
        let value = self
            .call(
                "const style = window.getComputedStyle(this);\n  \
                 const rect = this.getBoundingClientRect();\n  \
                 return style.display !== 'none' && style.visibility !== 'hidden' \
                 && (rect.width > 0 || rect.height > 0);",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self) -> DriverResult<bool> {
        let value = self.call("return !this.disabled;").await?;
        Ok(value.as_bool().unwrap_or(true))
    }

    async fn click(&self) -> DriverResult<()> {
        self.ensure_connected().await?;
        self.node.click().await.map_err(classify)?;
        Ok(())
    }

    async fn send_keys(&self, input: KeyInput) -> DriverResult<()> {
        self.ensure_connected().await?;
        self.node.focus().await.map_err(classify)?;
        match input {
            KeyInput::Text(text) => {
                self.node.type_str(text).await.map_err(classify)?;
            }
            KeyInput::Key(key) => {
                self.node.press_key(key.name()).await.map_err(classify)?;
            }
        }
        Ok(())
    }

    async fn clear(&self) -> DriverResult<()> {
        self.call(
            "this.value = '';\n  \
             this.dispatchEvent(new Event('input', { bubbles: true }));\n  \
             this.dispatchEvent(new Event('change', { bubbles: true }));\n  \
             return true;",
        )
        .await
        .map(|_| ())
    }
}

/// [`WebDriver`] over one Chromium tab
#[derive(Debug)]
pub struct CdpDriver {
    browser: Mutex<Option<CdpBrowser>>,
    page: CdpPage,
    handler: JoinHandle<()>,
}

impl CdpDriver {
    /// Launch Chromium and open a blank tab
    pub async fn launch(config: BrowserConfig) -> FirmeResult<Self> {
        let mut builder = CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(|message| FirmeError::Config { message })?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config)
            .await
            .map_err(|e| DriverError::session(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler stopped");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::session(e.to_string()))?;

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler,
        })
    }

    /// Underlying chromiumoxide page
    #[must_use]
    pub const fn page(&self) -> &CdpPage {
        &self.page
    }

    async fn evaluate(&self, expression: String) -> DriverResult<Value> {
        let result = self.page.evaluate(expression).await.map_err(classify)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<CdpNode>> {
        match locator.to_native() {
            NativeQuery::Css(css) => self.page.find_elements(css).await.map_err(classify),
            NativeQuery::XPath(xpath) => {
                // DOM search fails instead of returning nothing, so count first
                let count = self
                    .evaluate(format!("{}.length", NativeQuery::XPath(xpath.clone()).to_js_all()))
                    .await?;
                if count.as_u64().unwrap_or(0) == 0 {
                    return Ok(Vec::new());
                }
                self.page.find_xpaths(xpath).await.map_err(classify)
            }
        }
    }
}

#[async_trait]
impl WebDriver for CdpDriver {
    type Element = CdpElement;

    async fn find_element(&self, locator: &Locator) -> DriverResult<Option<CdpElement>> {
        Ok(self
            .find_all(locator)
            .await?
            .into_iter()
            .next()
            .map(|node| CdpElement { node }))
    }

    async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<CdpElement>> {
        Ok(self
            .find_all(locator)
            .await?
            .into_iter()
            .map(|node| CdpElement { node })
            .collect())
    }

    async fn execute_script(&self, script: &str) -> DriverResult<Value> {
        self.evaluate(format!("(() => {{\n{script}\n}})()")).await
    }

    async fn navigate(&self, navigation: Navigation) -> DriverResult<()> {
        match navigation {
            Navigation::To(url) => {
                self.page.goto(url).await.map_err(classify)?;
            }
            Navigation::Back => {
                self.evaluate("history.back()".to_string()).await?;
                self.page.wait_for_navigation().await.map_err(classify)?;
            }
            Navigation::Refresh => {
                self.page.reload().await.map_err(classify)?;
            }
        }
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.page.url().await.map_err(classify)?.unwrap_or_default())
    }

    async fn delete_all_cookies(&self) -> DriverResult<()> {
        self.page
            .execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn quit(&self) -> DriverResult<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Err(DriverError::session("browser already closed"));
        };
        if let Err(e) = browser.close().await {
            warn!(error = %e, "browser did not close cleanly");
        }
        let _ = browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}
