//! Scriptable in-memory driver for unit-testing page objects.
//!
//! Elements live on tokio's clock: pair [`MockDriver`] with
//! `#[tokio::test(start_paused = true)]` and waits, delays and timeouts run
//! instantly yet in the same order they would against a real page.
//!
//! ```ignore
//! let driver = MockDriver::new();
//! driver.add_element(MockElement::new(".item").appears_after(Duration::from_secs(2)));
//! driver.on_script("jQuery.active", ScriptResponse::value(0));
//! let page = Page::new(driver.clone(), SessionConfig::default());
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::driver::{Key, KeyInput, Navigation, WebDriver, WebElement};
use crate::locator::Locator;
use crate::result::{DriverError, DriverResult};

/// What a dynamic script responder can see
#[derive(Debug, Clone, Copy)]
pub struct ScriptContext {
    /// Time since the driver was created
    pub elapsed: Duration,
    /// Number of page reloads so far
    pub reloads: usize,
    /// Number of earlier calls answered by this responder
    pub calls: usize,
}

type DynamicResponder = Arc<dyn Fn(&ScriptContext) -> DriverResult<Value> + Send + Sync>;

/// Canned answer for scripts containing a pattern
#[derive(Clone)]
pub enum ScriptResponse {
    /// Always return this value
    Value(Value),
    /// Always fail with this error
    Error(DriverError),
    /// Compute the answer from the call context
    Dynamic(DynamicResponder),
}

impl ScriptResponse {
    /// Fixed value
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Fixed error
    #[must_use]
    pub const fn error(error: DriverError) -> Self {
        Self::Error(error)
    }

    /// Computed answer
    #[must_use]
    pub fn dynamic<F>(responder: F) -> Self
    where
        F: Fn(&ScriptContext) -> DriverResult<Value> + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(responder))
    }
}

impl fmt::Debug for ScriptResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Blueprint of a fake element
#[derive(Debug, Clone)]
pub struct MockElement {
    locator: Locator,
    text: String,
    attributes: HashMap<String, String>,
    displayed: bool,
    enabled: bool,
    appears_after: Duration,
    removed_after: Option<Duration>,
    displayed_after: Duration,
    click_error: Option<DriverError>,
    key_error: Option<DriverError>,
    stale_once: bool,
    checked_after_clicks: Option<usize>,
}

impl MockElement {
    /// Element found by the given locator string.
    ///
    /// Lookups match on the exact parsed strategy and value, not on DOM
    /// semantics: an element registered as `"li"` (CSS) is not found by
    /// `"tag=li"`, and `"#a"` is not found by `"id=a"`.
    ///
    /// Unparseable strings are kept as CSS so that a typo in a test shows up
    /// as "not found" rather than a panic.
    #[must_use]
    pub fn new(locator: &str) -> Self {
        Self {
            locator: Locator::parse(locator).unwrap_or_else(|_| Locator::Css(locator.to_string())),
            text: String::new(),
            attributes: HashMap::new(),
            displayed: true,
            enabled: true,
            appears_after: Duration::ZERO,
            removed_after: None,
            displayed_after: Duration::ZERO,
            click_error: None,
            key_error: None,
            stale_once: false,
            checked_after_clicks: None,
        }
    }

    /// Set the text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Never displayed
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Displayed only after the given time
    #[must_use]
    pub const fn displayed_after(mut self, after: Duration) -> Self {
        self.displayed_after = after;
        self
    }

    /// Disabled (`is_enabled` is false)
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Present in the DOM only after the given time
    #[must_use]
    pub const fn appears_after(mut self, after: Duration) -> Self {
        self.appears_after = after;
        self
    }

    /// Removed from the DOM at the given time
    #[must_use]
    pub const fn removed_after(mut self, after: Duration) -> Self {
        self.removed_after = Some(after);
        self
    }

    /// Native clicks fail with this error
    #[must_use]
    pub fn failing_click(mut self, error: DriverError) -> Self {
        self.click_error = Some(error);
        self
    }

    /// Key input fails with this error
    #[must_use]
    pub fn failing_keys(mut self, error: DriverError) -> Self {
        self.key_error = Some(error);
        self
    }

    /// The first handle used goes stale (the node is re-rendered once)
    #[must_use]
    pub const fn stale_once(mut self) -> Self {
        self.stale_once = true;
        self
    }

    /// `checked` reads `"true"` once the element was activated `clicks` times
    #[must_use]
    pub const fn checked_after_clicks(mut self, clicks: usize) -> Self {
        self.checked_after_clicks = Some(clicks);
        self
    }
}

#[derive(Debug)]
struct Slot {
    spec: MockElement,
    generation: u64,
    went_stale: bool,
    activations: usize,
    value: Option<String>,
}

impl Slot {
    fn present(&self, elapsed: Duration) -> bool {
        elapsed >= self.spec.appears_after
            && self.spec.removed_after.map_or(true, |gone| elapsed < gone)
    }
}

#[derive(Debug)]
struct Responder {
    pattern: String,
    response: ScriptResponse,
    calls: usize,
}

#[derive(Debug)]
struct MockState {
    started: Instant,
    url: String,
    back_stack: Vec<String>,
    reloads: usize,
    closed: bool,
    slots: Vec<Slot>,
    responders: Vec<Responder>,
    history: Vec<String>,
}

impl MockState {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            Err(DriverError::session("session already quit"))
        } else {
            Ok(())
        }
    }

    fn matching(&self, locator: &Locator) -> Vec<(usize, u64)> {
        let elapsed = self.elapsed();
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.spec.locator == *locator && slot.present(elapsed))
            .map(|(index, slot)| (index, slot.generation))
            .collect()
    }

    fn live_slot(&mut self, index: usize, generation: u64) -> DriverResult<&mut Slot> {
        self.ensure_open()?;
        let elapsed = self.elapsed();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| DriverError::stale("unknown element"))?;
        if !slot.present(elapsed) || slot.generation != generation {
            return Err(DriverError::stale(format!(
                "{} is no longer attached to the document",
                slot.spec.locator
            )));
        }
        if slot.spec.stale_once && !slot.went_stale {
            slot.went_stale = true;
            slot.generation += 1;
            return Err(DriverError::stale(format!(
                "{} was re-rendered",
                slot.spec.locator
            )));
        }
        Ok(slot)
    }
}

/// In-memory [`WebDriver`] with a call history.
///
/// Clones share state, so a test can keep one clone for inspection after
/// moving another into a `Page`.
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create a new mock driver on `about:blank`
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                started: Instant::now(),
                url: "about:blank".to_string(),
                back_stack: Vec::new(),
                reloads: 0,
                closed: false,
                slots: Vec::new(),
                responders: Vec::new(),
                history: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a mock element
    pub fn add_element(&self, element: MockElement) {
        self.lock().slots.push(Slot {
            spec: element,
            generation: 0,
            went_stale: false,
            activations: 0,
            value: None,
        });
    }

    /// Answer scripts containing `pattern`; earlier registrations win
    pub fn on_script(&self, pattern: impl Into<String>, response: ScriptResponse) {
        self.lock().responders.push(Responder {
            pattern: pattern.into(),
            response,
            calls: 0,
        });
    }

    /// Set the current URL without recording a navigation
    pub fn set_url(&self, url: impl Into<String>) {
        self.lock().url = url.into();
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.call_count(prefix) > 0
    }

    /// Number of calls starting with `prefix`
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.lock()
            .history
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Number of page reloads
    #[must_use]
    pub fn reloads(&self) -> usize {
        self.lock().reloads
    }

    /// Total activations (clicks and Enter presses) of elements matching `locator`
    #[must_use]
    pub fn activations(&self, locator: &str) -> usize {
        let Ok(locator) = Locator::parse(locator) else {
            return 0;
        };
        self.lock()
            .slots
            .iter()
            .filter(|slot| slot.spec.locator == locator)
            .map(|slot| slot.activations)
            .sum()
    }

    /// Current input value of the first element matching `locator`
    #[must_use]
    pub fn value_of(&self, locator: &str) -> Option<String> {
        let locator = Locator::parse(locator).ok()?;
        self.lock()
            .slots
            .iter()
            .find(|slot| slot.spec.locator == locator)
            .and_then(|slot| slot.value.clone())
    }

    /// Whether `quit` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn handle(&self, index: usize, generation: u64) -> MockElementHandle {
        MockElementHandle {
            state: Arc::clone(&self.state),
            index,
            generation,
        }
    }
}

#[async_trait]
impl WebDriver for MockDriver {
    type Element = MockElementHandle;

    async fn find_element(&self, locator: &Locator) -> DriverResult<Option<Self::Element>> {
        let first = {
            let mut state = self.lock();
            state.ensure_open()?;
            state.history.push(format!("find_element:{locator}"));
            state.matching(locator).first().copied()
        };
        Ok(first.map(|(index, generation)| self.handle(index, generation)))
    }

    async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<Self::Element>> {
        let all = {
            let mut state = self.lock();
            state.ensure_open()?;
            state.history.push(format!("find_elements:{locator}"));
            state.matching(locator)
        };
        Ok(all
            .into_iter()
            .map(|(index, generation)| self.handle(index, generation))
            .collect())
    }

    async fn execute_script(&self, script: &str) -> DriverResult<Value> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.history.push(format!("execute_script:{script}"));
        let elapsed = state.elapsed();
        let reloads = state.reloads;
        let Some(responder) = state
            .responders
            .iter_mut()
            .find(|r| script.contains(&r.pattern))
        else {
            return Ok(Value::Null);
        };
        let context = ScriptContext {
            elapsed,
            reloads,
            calls: responder.calls,
        };
        responder.calls += 1;
        match &responder.response {
            ScriptResponse::Value(value) => Ok(value.clone()),
            ScriptResponse::Error(error) => Err(error.clone()),
            ScriptResponse::Dynamic(respond) => respond(&context),
        }
    }

    async fn navigate(&self, navigation: Navigation) -> DriverResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        match navigation {
            Navigation::To(url) => {
                state.history.push(format!("navigate:{url}"));
                let previous = std::mem::replace(&mut state.url, url);
                state.back_stack.push(previous);
            }
            Navigation::Back => {
                state.history.push("navigate:back".to_string());
                if let Some(previous) = state.back_stack.pop() {
                    state.url = previous;
                }
            }
            Navigation::Refresh => {
                state.history.push("navigate:refresh".to_string());
                state.reloads += 1;
            }
        }
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        let state = self.lock();
        state.ensure_open()?;
        Ok(state.url.clone())
    }

    async fn delete_all_cookies(&self) -> DriverResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.history.push("delete_all_cookies".to_string());
        Ok(())
    }

    async fn quit(&self) -> DriverResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.history.push("quit".to_string());
        state.closed = true;
        Ok(())
    }
}

/// Handle to a [`MockElement`] as of the moment it was found
#[derive(Debug, Clone)]
pub struct MockElementHandle {
    state: Arc<Mutex<MockState>>,
    index: usize,
    generation: u64,
}

impl MockElementHandle {
    fn with_slot<T>(
        &self,
        call: &str,
        f: impl FnOnce(&mut Slot, Duration) -> DriverResult<T>,
    ) -> DriverResult<T> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = state.elapsed();
        let slot = state.live_slot(self.index, self.generation)?;
        let label = format!("{call}:{}", slot.spec.locator);
        let result = f(slot, elapsed);
        state.history.push(label);
        result
    }
}

#[async_trait]
impl WebElement for MockElementHandle {
    async fn text(&self) -> DriverResult<String> {
        self.with_slot("text", |slot, _| Ok(slot.spec.text.clone()))
    }

    async fn attribute(&self, name: &str) -> DriverResult<Option<String>> {
        self.with_slot("attribute", |slot, _| {
            if name == "checked" {
                if let Some(needed) = slot.spec.checked_after_clicks {
                    return Ok((slot.activations >= needed).then(|| "true".to_string()));
                }
            }
            if name == "value" {
                if let Some(value) = &slot.value {
                    return Ok(Some(value.clone()));
                }
            }
            Ok(slot.spec.attributes.get(name).cloned())
        })
    }

    async fn is_displayed(&self) -> DriverResult<bool> {
        self.with_slot("is_displayed", |slot, elapsed| {
            Ok(slot.spec.displayed && elapsed >= slot.spec.displayed_after)
        })
    }

    async fn is_enabled(&self) -> DriverResult<bool> {
        self.with_slot("is_enabled", |slot, _| Ok(slot.spec.enabled))
    }

    async fn click(&self) -> DriverResult<()> {
        self.with_slot("click", |slot, _| {
            if let Some(error) = &slot.spec.click_error {
                return Err(error.clone());
            }
            slot.activations += 1;
            Ok(())
        })
    }

    async fn send_keys(&self, input: KeyInput) -> DriverResult<()> {
        self.with_slot("send_keys", |slot, _| {
            if let Some(error) = &slot.spec.key_error {
                return Err(error.clone());
            }
            match input {
                KeyInput::Text(text) => slot.value.get_or_insert_with(String::new).push_str(&text),
                KeyInput::Key(Key::Enter | Key::Space) => slot.activations += 1,
                KeyInput::Key(_) => {}
            }
            Ok(())
        })
    }

    async fn clear(&self) -> DriverResult<()> {
        self.with_slot("clear", |slot, _| {
            slot.value = Some(String::new());
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn css(selector: &str) -> Locator {
        Locator::Css(selector.to_string())
    }

    mod element_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_element_appears_on_schedule() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new(".late").appears_after(Duration::from_secs(2)));

            assert!(driver.find_element(&css(".late")).await.unwrap().is_none());
            tokio::time::sleep(Duration::from_secs(2)).await;
            assert!(driver.find_element(&css(".late")).await.unwrap().is_some());
        }

        #[tokio::test(start_paused = true)]
        async fn test_removed_element_handle_goes_stale() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new("#toast").removed_after(Duration::from_secs(1)));

            let handle = driver.find_element(&css("#toast")).await.unwrap().unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(handle.text().await.unwrap_err().is_stale());
        }

        #[tokio::test(start_paused = true)]
        async fn test_stale_once_only_hits_first_handle() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new("#row").stale_once());

            let first = driver.find_element(&css("#row")).await.unwrap().unwrap();
            assert!(first.is_displayed().await.unwrap_err().is_stale());
            let second = driver.find_element(&css("#row")).await.unwrap().unwrap();
            assert!(second.is_displayed().await.unwrap());
        }

        #[tokio::test(start_paused = true)]
        async fn test_checked_after_clicks() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new("#agree").checked_after_clicks(2));

            let handle = driver.find_element(&css("#agree")).await.unwrap().unwrap();
            handle.click().await.unwrap();
            assert_eq!(handle.attribute("checked").await.unwrap(), None);
            handle.send_keys(Key::Enter.into()).await.unwrap();
            assert_eq!(
                handle.attribute("checked").await.unwrap(),
                Some("true".to_string())
            );
            assert_eq!(driver.activations("#agree"), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_typing_and_clearing() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new("name=q").with_attribute("value", "old"));

            let handle = driver
                .find_element(&Locator::Name("q".into()))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(handle.attribute("value").await.unwrap(), Some("old".into()));
            handle.clear().await.unwrap();
            handle.send_keys(KeyInput::text("rust")).await.unwrap();
            assert_eq!(driver.value_of("name=q"), Some("rust".to_string()));
        }

        #[tokio::test(start_paused = true)]
        async fn test_lookup_matches_exact_strategy() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new("li"));

            assert!(driver.find_element(&css("li")).await.unwrap().is_some());
            assert!(driver
                .find_element(&Locator::TagName("li".into()))
                .await
                .unwrap()
                .is_none());
        }
    }

    mod script_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_unmatched_script_returns_null() {
            let driver = MockDriver::new();
            assert_eq!(driver.execute_script("return 1").await.unwrap(), Value::Null);
            assert!(driver.was_called("execute_script:return 1"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_dynamic_responder_sees_reloads() {
            let driver = MockDriver::new();
            driver.on_script(
                "jQuery.active",
                ScriptResponse::dynamic(|ctx| Ok(json!(if ctx.reloads > 0 { 0 } else { 3 }))),
            );

            assert_eq!(
                driver.execute_script("return jQuery.active").await.unwrap(),
                json!(3)
            );
            driver.navigate(Navigation::Refresh).await.unwrap();
            assert_eq!(
                driver.execute_script("return jQuery.active").await.unwrap(),
                json!(0)
            );
            assert_eq!(driver.reloads(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_error_responder() {
            let driver = MockDriver::new();
            driver.on_script("boom", ScriptResponse::error(DriverError::script("boom")));
            assert!(driver.execute_script("boom()").await.is_err());
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_navigation_and_back() {
            let driver = MockDriver::new();
            driver
                .navigate(Navigation::To("https://a.test/".into()))
                .await
                .unwrap();
            driver
                .navigate(Navigation::To("https://b.test/".into()))
                .await
                .unwrap();
            driver.navigate(Navigation::Back).await.unwrap();
            assert_eq!(driver.current_url().await.unwrap(), "https://a.test/");
        }

        #[tokio::test(start_paused = true)]
        async fn test_quit_closes_session() {
            let driver = MockDriver::new();
            driver.quit().await.unwrap();
            assert!(driver.is_closed());
            let err = driver.find_element(&css("a")).await.unwrap_err();
            assert!(err.is_session_failure());
        }
    }
}
