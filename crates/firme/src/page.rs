//! Page-object base: every robust operation addressed by a locator string.
//!
//! A [`Page`] owns one driver session for its whole lifetime, together with
//! the session's configuration and [`ErrorList`]. Page objects for a
//! concrete application wrap or hold a `Page` and express their flows in
//! terms of its operations:
//!
//! ```ignore
//! struct LoginPage<D: WebDriver> {
//!     page: Page<D>,
//! }
//!
//! impl<D: WebDriver> LoginPage<D> {
//!     async fn sign_in(&self, user: &str, password: &str) -> FirmeResult<()> {
//!         self.page.set_input_value("name=username", user).await?;
//!         self.page.set_input_value("name=password", password).await?;
//!         self.page
//!             .click_and_wait_for_displayed("css=button[type=submit]", "#dashboard")
//!             .await?;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Toyota Way Application
//!
//! - **Poka-Yoke**: Locator strings are parsed before any browser call
//! - **Jidoka**: Every failure names the operation and the locator
//! - **Genchi Genbutsu**: `capture_on_failure` saves the DOM the test saw

use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::click::{Clicked, RobustClicker};
use crate::config::SessionConfig;
use crate::driver::{KeyInput, Navigation, WebDriver, WebElement};
use crate::failures::ErrorList;
use crate::locator::{js_string, Target};
use crate::query::ElementQuery;
use crate::result::{FirmeError, FirmeResult};
use crate::retry::retry_once;
use crate::settle::{ActivitySettler, SettleReport};
use crate::snapshot::{DiagnosticCapture, FsSnapshotStore, SnapshotStore};
use crate::wait::{WaitEngine, WaitSpec};

/// Number of body-text checks spread over the wait timeout
const TEXT_POLL_SLICES: u32 = 10;

/// Script running `body` against the first match of `target`; `false` when
/// nothing matches
fn on_first_match(target: &Target, body: &str) -> String {
    format!(
        "const el = {};\nif (!el) {{ return false; }}\n{body}\nreturn true;",
        target.locator().to_js_first()
    )
}

/// Pause after moving the `focus` class, so styles and listeners react
const FOCUS_DELAY: Duration = Duration::from_millis(100);

/// How [`Page::select_option`] picks an `<option>` of a `<select>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectBy<'a> {
    /// Option whose visible text, trimmed, equals this
    Text(&'a str),
    /// Option whose `value` attribute equals this
    Value(&'a str),
}

impl SelectBy<'_> {
    fn predicate(self) -> String {
        match self {
            Self::Text(text) => format!("o => o.text.trim() === {}", js_string(text)),
            Self::Value(value) => format!("o => o.value === {}", js_string(value)),
        }
    }
}

impl fmt::Display for SelectBy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "text \"{text}\""),
            Self::Value(value) => write!(f, "value \"{value}\""),
        }
    }
}

/// Script selecting an option on the first match of `target` and firing
/// `change`. Returns `false` when nothing matches, `null` when no option does.
fn select_script(target: &Target, by: SelectBy<'_>) -> String {
    format!(
        "const el = {};\n\
         if (!el) {{ return false; }}\n\
         const option = Array.from(el.options || []).find({});\n\
         if (!option) {{ return null; }}\n\
         option.selected = true;\n\
         el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n\
         return true;",
        target.locator().to_js_first(),
        by.predicate()
    )
}

/// Page-object base over one driver session
#[derive(Debug)]
pub struct Page<D: WebDriver, S: SnapshotStore = FsSnapshotStore> {
    driver: D,
    config: SessionConfig,
    errors: Arc<ErrorList>,
    capture: DiagnosticCapture<S>,
    closed: bool,
}

impl<D: WebDriver> Page<D> {
    /// Page writing snapshots to `config.snapshot_dir`
    #[must_use]
    pub fn new(driver: D, config: SessionConfig) -> Self {
        let capture = DiagnosticCapture::in_directory(config.snapshot_dir.clone());
        Self::with_capture(driver, config, capture)
    }
}

impl<D: WebDriver, S: SnapshotStore> Page<D, S> {
    /// Page with a custom snapshot store
    #[must_use]
    pub fn with_capture(driver: D, config: SessionConfig, capture: DiagnosticCapture<S>) -> Self {
        Self {
            driver,
            config,
            errors: Arc::new(ErrorList::new()),
            capture,
            closed: false,
        }
    }

    /// Share an existing error list (e.g. one per test run)
    #[must_use]
    pub fn with_error_list(mut self, errors: Arc<ErrorList>) -> Self {
        self.errors = errors;
        self
    }

    /// Underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Session configuration
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Session error list
    #[must_use]
    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    /// Shared handle to the session error list
    #[must_use]
    pub fn error_list(&self) -> Arc<ErrorList> {
        Arc::clone(&self.errors)
    }

    fn target(locator: &str) -> FirmeResult<Target> {
        Target::parse(locator)
    }

    fn query(&self) -> ElementQuery<'_, D> {
        ElementQuery::new(&self.driver)
    }

    fn waits(&self) -> WaitEngine<'_, D> {
        WaitEngine::new(&self.driver)
    }

    fn settler(&self) -> ActivitySettler<'_, D> {
        ActivitySettler::new(&self.driver, self.config.settle_config())
    }

    fn clicker(&self) -> RobustClicker<'_, D> {
        RobustClicker::new(
            &self.driver,
            &self.errors,
            self.config.wait_spec(),
            self.config.click_config(),
            self.config.settle_config(),
        )
    }

    /// Run `read`; on a stale element run it once more, and report a second
    /// stale reference as [`FirmeError::StaleElement`]
    async fn read_fresh<T, F, Fut>(
        operation: &'static str,
        target: &Target,
        read: F,
    ) -> FirmeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FirmeResult<T>>,
    {
        retry_once(operation, read, FirmeError::is_stale)
            .await
            .map_err(|e| {
                if e.is_stale() {
                    FirmeError::StaleElement {
                        operation,
                        locator: target.raw().to_string(),
                    }
                } else {
                    e
                }
            })
    }

    // =========================================================================
    // WAITS
    // =========================================================================

    /// Wait (default timeout) until the locator matches; returns the first match
    pub async fn wait_for_present(&self, locator: &str) -> FirmeResult<D::Element> {
        self.wait_for_present_within(locator, self.config.wait_timeout_secs)
            .await
    }

    /// [`Self::wait_for_present`] with an explicit timeout
    pub async fn wait_for_present_within(
        &self,
        locator: &str,
        timeout_secs: u64,
    ) -> FirmeResult<D::Element> {
        let target = Self::target(locator)?;
        self.waits()
            .wait_for_present(&target, self.config.wait_spec_secs(timeout_secs))
            .await
    }

    /// Wait until at least one element matches; returns all matches
    pub async fn wait_for_elements_present(&self, locator: &str) -> FirmeResult<Vec<D::Element>> {
        let target = Self::target(locator)?;
        let waits = self.waits();
        waits.wait_for_present(&target, self.config.wait_spec()).await?;
        waits.query().find_many(&target).await
    }

    /// Wait (default timeout) until the locator matches nothing
    pub async fn wait_for_absent(&self, locator: &str) -> FirmeResult<()> {
        self.wait_for_absent_within(locator, self.config.wait_timeout_secs)
            .await
    }

    /// [`Self::wait_for_absent`] with an explicit timeout
    pub async fn wait_for_absent_within(&self, locator: &str, timeout_secs: u64) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        self.waits()
            .wait_for_absent(&target, self.config.wait_spec_secs(timeout_secs))
            .await
    }

    /// Wait (default timeout) until the match is present and visible
    pub async fn wait_for_displayed(&self, locator: &str) -> FirmeResult<D::Element> {
        self.wait_for_displayed_within(locator, self.config.wait_timeout_secs)
            .await
    }

    /// [`Self::wait_for_displayed`] with an explicit timeout
    pub async fn wait_for_displayed_within(
        &self,
        locator: &str,
        timeout_secs: u64,
    ) -> FirmeResult<D::Element> {
        let target = Self::target(locator)?;
        self.waits()
            .wait_for_displayed(&target, self.config.wait_spec_secs(timeout_secs))
            .await
    }

    /// Wait until an already-resolved element is visible
    pub async fn wait_for_element_displayed(&self, element: &D::Element, label: &str) -> FirmeResult<()> {
        self.waits()
            .wait_for_element_displayed(element, label, self.config.wait_spec())
            .await
    }

    /// Wait (default timeout) until exactly `expected` elements match
    pub async fn wait_for_count(&self, locator: &str, expected: usize) -> FirmeResult<Vec<D::Element>> {
        self.wait_for_count_within(locator, expected, self.config.wait_timeout_secs)
            .await
    }

    /// [`Self::wait_for_count`] with an explicit timeout
    pub async fn wait_for_count_within(
        &self,
        locator: &str,
        expected: usize,
        timeout_secs: u64,
    ) -> FirmeResult<Vec<D::Element>> {
        let target = Self::target(locator)?;
        self.waits()
            .wait_for_count(&target, expected, self.config.wait_spec_secs(timeout_secs))
            .await
    }

    // =========================================================================
    // CLICKS
    // =========================================================================

    /// Robust click; see [`RobustClicker::click`]
    pub async fn click(&self, locator: &str) -> FirmeResult<Clicked<D::Element>> {
        let target = Self::target(locator)?;
        self.clicker().click(&target).await
    }

    /// Click an element that removes itself and wait for it to go
    pub async fn click_to_dismiss(&self, locator: &str) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        self.clicker().click_to_dismiss(&target).await
    }

    /// Click, then wait for `present_locator` to match
    pub async fn click_and_wait_for_present(
        &self,
        click_locator: &str,
        present_locator: &str,
    ) -> FirmeResult<D::Element> {
        let click = Self::target(click_locator)?;
        let present = Self::target(present_locator)?;
        self.clicker()
            .click_and_wait_for_present(&click, &present)
            .await
    }

    /// Click, then wait for `displayed_locator` to be visible
    pub async fn click_and_wait_for_displayed(
        &self,
        click_locator: &str,
        displayed_locator: &str,
    ) -> FirmeResult<D::Element> {
        let click = Self::target(click_locator)?;
        let displayed = Self::target(displayed_locator)?;
        self.clicker()
            .click_and_wait_for_displayed(&click, &displayed)
            .await
    }

    /// Click a checkbox until it reads as checked (at most twice)
    pub async fn click_checkbox(&self, locator: &str) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        self.clicker().click_checkbox(&target).await
    }

    /// Synthetic click on an SVG node
    pub async fn click_svg(&self, locator: &str) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        self.clicker().click_svg(&target).await
    }

    /// SVG click on a node that removes itself, then wait for it to go
    pub async fn click_svg_to_dismiss(&self, locator: &str) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        self.clicker().click_svg_to_dismiss(&target).await
    }

    /// SVG click, then wait for `present_locator` to match
    pub async fn click_svg_and_wait_for_present(
        &self,
        click_locator: &str,
        present_locator: &str,
    ) -> FirmeResult<D::Element> {
        let click = Self::target(click_locator)?;
        let present = Self::target(present_locator)?;
        self.clicker()
            .click_svg_and_wait_for_present(&click, &present)
            .await
    }

    /// SVG click, then wait for `displayed_locator` to be visible
    pub async fn click_svg_and_wait_for_displayed(
        &self,
        click_locator: &str,
        displayed_locator: &str,
    ) -> FirmeResult<D::Element> {
        let click = Self::target(click_locator)?;
        let displayed = Self::target(displayed_locator)?;
        self.clicker()
            .click_svg_and_wait_for_displayed(&click, &displayed)
            .await
    }

    // =========================================================================
    // ELEMENT STATE
    // =========================================================================

    /// Text of the first match, waiting for presence
    pub async fn get_text(&self, locator: &str) -> FirmeResult<String> {
        let target = Self::target(locator)?;
        let waits = &self.waits();
        let spec = self.config.wait_spec();
        let target_ref = &target;
        Self::read_fresh("get_text", &target, move || async move {
            let element = waits.wait_for_present(target_ref, spec).await?;
            Ok(element.text().await?)
        })
        .await
    }

    /// Texts of all current matches, in document order
    pub async fn get_texts(&self, locator: &str) -> FirmeResult<Vec<String>> {
        let target = Self::target(locator)?;
        let query = &self.query();
        let target_ref = &target;
        Self::read_fresh("get_texts", &target, move || async move {
            let mut texts = Vec::new();
            for element in query.find_many(target_ref).await? {
                texts.push(element.text().await?);
            }
            Ok(texts)
        })
        .await
    }

    /// Replace the value of an input; an empty `value` only clears it
    pub async fn set_input_value(&self, locator: &str, value: &str) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        let waits = &self.waits();
        let spec = self.config.wait_spec();
        let target_ref = &target;
        Self::read_fresh("set_input_value", &target, move || async move {
            let element = waits.wait_for_present(target_ref, spec).await?;
            element.clear().await?;
            if !value.is_empty() {
                element.send_keys(KeyInput::text(value)).await?;
            }
            Ok(())
        })
        .await
    }

    /// Pick an option of a `<select>` and fire `change`.
    ///
    /// Waits for the select to be present. A select re-rendered between the
    /// lookup and the selection is looked up once more. A disabled select or
    /// a missing option fails the assertion.
    pub async fn select_option(&self, locator: &str, by: SelectBy<'_>) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        let waits = &self.waits();
        let spec = self.config.wait_spec();
        let target_ref = &target;
        let script = &select_script(&target, by);
        let driver = &self.driver;
        Self::read_fresh("select_option", &target, move || async move {
            let element = waits.wait_for_present(target_ref, spec).await?;
            if !element.is_enabled().await? {
                return Err(FirmeError::assertion(format!(
                    "select should be enabled: {target_ref}"
                )));
            }
            match driver.execute_script(script).await? {
                Value::Bool(true) => Ok(()),
                Value::Bool(false) => Err(FirmeError::ElementNotFound {
                    operation: "select_option",
                    locator: target_ref.raw().to_string(),
                }),
                _ => Err(FirmeError::assertion(format!(
                    "no option with {by} in {target_ref}"
                ))),
            }
        })
        .await?;
        info!(locator = %target, option = %by, "selected");
        Ok(())
    }

    /// [`Self::select_option`] by visible text
    pub async fn select_by_text(&self, locator: &str, text: &str) -> FirmeResult<()> {
        self.select_option(locator, SelectBy::Text(text)).await
    }

    /// [`Self::select_option`] by option value
    pub async fn select_by_value(&self, locator: &str, value: &str) -> FirmeResult<()> {
        self.select_option(locator, SelectBy::Value(value)).await
    }

    /// Whether the first match carries `class_name` in its class list
    pub async fn has_class(&self, locator: &str, class_name: &str) -> FirmeResult<bool> {
        let target = Self::target(locator)?;
        let waits = &self.waits();
        let spec = self.config.wait_spec();
        let target_ref = &target;
        Self::read_fresh("has_class", &target, move || async move {
            let element = waits.wait_for_present(target_ref, spec).await?;
            let classes = element.attribute("class").await?.unwrap_or_default();
            Ok(classes.split_whitespace().any(|class| class == class_name))
        })
        .await
    }

    /// Whether anything matches right now (no waiting)
    pub async fn element_exists(&self, locator: &str) -> FirmeResult<bool> {
        let target = Self::target(locator)?;
        Ok(self.query().find_one(&target).await?.is_some())
    }

    /// Whether the first match accepts interaction; a missing element is an error
    pub async fn is_enabled(&self, locator: &str) -> FirmeResult<bool> {
        let target = Self::target(locator)?;
        let element = self
            .query()
            .find_one(&target)
            .await?
            .ok_or_else(|| FirmeError::ElementNotFound {
                operation: "is_enabled",
                locator: target.raw().to_string(),
            })?;
        Ok(element.is_enabled().await?)
    }

    // =========================================================================
    // ASSERTIONS
    // =========================================================================

    /// Fail unless something matches right now
    pub async fn assert_element_present(&self, locator: &str) -> FirmeResult<D::Element> {
        let target = Self::target(locator)?;
        self.query()
            .find_one(&target)
            .await?
            .ok_or_else(|| FirmeError::assertion(format!("element should be present: {target}")))
    }

    /// Fail if something matches right now
    pub async fn assert_element_not_present(&self, locator: &str) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        if self.query().find_one(&target).await?.is_some() {
            return Err(FirmeError::assertion(format!(
                "element should not be present: {target}"
            )));
        }
        Ok(())
    }

    /// Fail with `fail_message` if the locator becomes displayed within the
    /// wait timeout. Anything short of a dead session counts as not shown.
    pub async fn assert_element_not_shown(&self, locator: &str, fail_message: &str) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        match self.waits().wait_for_displayed(&target, self.config.wait_spec()).await {
            Ok(_) => Err(FirmeError::assertion(fail_message)),
            Err(FirmeError::Driver(e)) if e.is_session_failure() => Err(e.into()),
            Err(e) => {
                info!(locator = %target, reason = %e, "not shown");
                Ok(())
            }
        }
    }

    /// Fail unless some match's text contains `substring`; returns that match
    pub async fn assert_element_present_with_text(
        &self,
        locator: &str,
        substring: &str,
    ) -> FirmeResult<D::Element> {
        let target = Self::target(locator)?;
        let matches = self.query().find_many(&target).await?;
        if matches.is_empty() {
            return Err(FirmeError::assertion(format!(
                "element should be present: {target}"
            )));
        }
        for element in matches {
            if element.text().await?.contains(substring) {
                return Ok(element);
            }
        }
        Err(FirmeError::assertion(format!(
            "no element matching \"{target}\" contains text \"{substring}\""
        )))
    }

    /// Fail if the first match has any text (a missing element has none)
    pub async fn assert_element_has_no_text(&self, locator: &str) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        let text = match self.query().find_one(&target).await? {
            Some(element) => element.text().await?,
            None => String::new(),
        };
        if text.is_empty() {
            Ok(())
        } else {
            Err(FirmeError::assertion(format!(
                "{text}  Selector=\"{target}\""
            )))
        }
    }

    async fn body_text(&self) -> FirmeResult<Option<String>> {
        let body = Self::target("tag=body")?;
        match self.query().find_one(&body).await? {
            Some(element) => Ok(Some(element.text().await?)),
            None => Ok(None),
        }
    }

    /// Poll the page text until `check` returns no offending strings or the
    /// slices run out; returns what was still offending
    async fn poll_body_text<'a>(
        &self,
        needles: &[&'a str],
        offending: impl Fn(&str, &'a str) -> bool,
    ) -> FirmeResult<Vec<&'a str>> {
        let slice = self.config.wait_spec().timeout() / TEXT_POLL_SLICES;
        let mut remaining = needles.to_vec();
        for round in 0..TEXT_POLL_SLICES {
            let body = self.body_text().await?.unwrap_or_default();
            remaining = needles
                .iter()
                .copied()
                .filter(|needle| offending(&body, *needle))
                .collect();
            if remaining.is_empty() {
                break;
            }
            if round + 1 < TEXT_POLL_SLICES {
                sleep(slice).await;
            }
        }
        Ok(remaining)
    }

    /// Fail unless every string appears in the page text within the wait timeout
    pub async fn assert_text_present(&self, texts: &[&str]) -> FirmeResult<()> {
        let missing = self
            .poll_body_text(texts, |body, needle| !body.contains(needle))
            .await?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FirmeError::assertion(format!(
                "expected text not found: {missing:?}"
            )))
        }
    }

    /// Fail unless every string is gone from the page text within the wait timeout
    pub async fn assert_text_not_present(&self, texts: &[&str]) -> FirmeResult<()> {
        let found = self
            .poll_body_text(texts, |body, needle| body.contains(needle))
            .await?;
        if found.is_empty() {
            Ok(())
        } else {
            Err(FirmeError::assertion(format!(
                "unexpected text found: {found:?}"
            )))
        }
    }

    /// Whether any of the strings appears in the page text right now
    pub async fn is_text_present(&self, texts: &[&str]) -> FirmeResult<bool> {
        Ok(self
            .body_text()
            .await?
            .is_some_and(|body| texts.iter().any(|text| body.contains(text))))
    }

    // =========================================================================
    // POINTER & SCROLL
    // =========================================================================

    async fn run_on_first_match(&self, operation: &'static str, locator: &str, body: &str) -> FirmeResult<()> {
        let target = Self::target(locator)?;
        let found = self.execute_script(&on_first_match(&target, body)).await?;
        if found == Value::Bool(true) {
            Ok(())
        } else {
            Err(FirmeError::ElementNotFound {
                operation,
                locator: target.raw().to_string(),
            })
        }
    }

    /// Hover: dispatch `mouseover` and `mouseenter` on the first match
    pub async fn hover(&self, locator: &str) -> FirmeResult<()> {
        self.run_on_first_match(
            "hover",
            locator,
            "el.dispatchEvent(new MouseEvent('mouseover', { bubbles: true }));\n\
             el.dispatchEvent(new MouseEvent('mouseenter', { bubbles: false }));",
        )
        .await
    }

    /// Scroll the first match into view
    pub async fn scroll_into_view(&self, locator: &str) -> FirmeResult<()> {
        self.run_on_first_match("scroll_into_view", locator, "el.scrollIntoView(true);")
            .await
    }

    /// Scroll the window to absolute coordinates
    pub async fn scroll_to(&self, x: i64, y: i64) -> FirmeResult<()> {
        self.execute_script(&format!("window.scrollTo({x}, {y});"))
            .await
            .map(|_| ())
    }

    /// Add the `focus` class to the closest `ancestor` of the first match
    /// (the match itself counts). No matching ancestor leaves the page as is.
    pub async fn focus_on_closest(&self, locator: &str, ancestor: &str) -> FirmeResult<()> {
        let _ = self.wait_for_present(locator).await?;
        self.run_on_first_match(
            "focus_on_closest",
            locator,
            &format!(
                "const near = el.closest({});\nif (near) {{ near.classList.add('focus'); }}",
                js_string(ancestor)
            ),
        )
        .await?;
        sleep(FOCUS_DELAY).await;
        Ok(())
    }

    /// [`Self::focus_on_closest`] for the enclosing list item
    pub async fn focus_on_closest_li(&self, locator: &str) -> FirmeResult<()> {
        self.focus_on_closest(locator, "li").await
    }

    // =========================================================================
    // SESSION
    // =========================================================================

    /// Run a script body in the page; it may `return` a value
    pub async fn execute_script(&self, script: &str) -> FirmeResult<Value> {
        info!(script, "executing script");
        Ok(self.driver.execute_script(script).await?)
    }

    /// Wait for in-flight page activity to finish
    pub async fn settle(&self) -> FirmeResult<SettleReport> {
        self.settler().settle().await
    }

    /// Load a URL
    pub async fn launch_url(&self, url: &str) -> FirmeResult<()> {
        info!(url, "navigating");
        Ok(self.driver.navigate(Navigation::To(url.to_string())).await?)
    }

    /// Reload the page, then settle
    pub async fn refresh(&self) -> FirmeResult<()> {
        self.driver.navigate(Navigation::Refresh).await?;
        self.settle().await.map(|_| ())
    }

    /// Browser back button
    pub async fn back(&self) -> FirmeResult<()> {
        Ok(self.driver.navigate(Navigation::Back).await?)
    }

    /// URL of the current page
    pub async fn current_url(&self) -> FirmeResult<String> {
        Ok(self.driver.current_url().await?)
    }

    /// Delete all cookies of the session
    pub async fn delete_cookies(&self) -> FirmeResult<()> {
        Ok(self.driver.delete_all_cookies().await?)
    }

    /// End the browser session. Later snapshot captures become no-ops.
    pub async fn quit(&mut self) -> FirmeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        Ok(self.driver.quit().await?)
    }

    /// Whether [`Self::quit`] was called
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Record a failure without raising
    pub fn report_failure(&self, message: &str) {
        self.errors.report(message);
    }

    /// Save a sanitized DOM snapshot for a failed test; see
    /// [`DiagnosticCapture::capture`]
    pub async fn capture_on_failure(
        &self,
        label: &str,
        context: Option<&str>,
        cause: Option<&(dyn Error + Send + Sync)>,
    ) -> FirmeResult<Option<PathBuf>> {
        let driver = if self.closed {
            warn!(label, "session already closed");
            None
        } else {
            Some(&self.driver)
        };
        self.capture.capture(driver, label, context, cause).await
    }

    /// Wait spec used by operations without an explicit timeout
    #[must_use]
    pub fn wait_spec(&self) -> WaitSpec {
        self.config.wait_spec()
    }
}
