//! Bounded polling waits over [`ElementQuery`].
//!
//! Every wait is one call to a single poll routine driven by a
//! [`WaitCondition`]: check, give up once the monotonic deadline has passed,
//! otherwise sleep for the poll interval (clamped to the time left) and check
//! again. A wait that never succeeds therefore fails no earlier than its
//! timeout and no later than one poll interval after it.
//!
//! ## Toyota Way Application
//!
//! - **Jidoka**: Timeouts name the operation and the locator that stalled
//! - **Poka-Yoke**: Counts must match exactly; "at least" is never success
//! - **Muda**: Sleeps are clamped so no wait overshoots its deadline

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::driver::{WebDriver, WebElement};
use crate::locator::Target;
use crate::query::ElementQuery;
use crate::result::{FirmeError, FirmeResult};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for element waits (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Lower bound for the derived poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

// =============================================================================
// WAIT SPEC
// =============================================================================

/// Timeout and poll interval of one wait call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSpec {
    timeout: Duration,
    poll_interval: Option<Duration>,
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_TIMEOUT)
    }
}

impl WaitSpec {
    /// Wait up to `timeout`, polling every `timeout / 10`
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: None,
        }
    }

    /// Wait up to `secs` seconds
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Override the derived poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Total time budget
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time between checks
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
            .unwrap_or(self.timeout / 10)
            .max(MIN_POLL_INTERVAL)
    }
}

// =============================================================================
// CONDITIONS
// =============================================================================

/// What a wait is waiting for
#[derive(Debug)]
pub enum WaitCondition<'a, E> {
    /// At least one element matches
    Present(&'a Target),
    /// No element matches
    Absent(&'a Target),
    /// Exactly this many elements match
    Count(&'a Target, usize),
    /// An already-resolved element reports itself visible
    Displayed {
        /// Element to watch
        element: &'a E,
        /// Locator it was resolved from, for error messages
        label: &'a str,
    },
}

impl<E> WaitCondition<'_, E> {
    /// Operation name used in timeout errors
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Present(_) => "present",
            Self::Absent(_) => "absent",
            Self::Count(..) => "count",
            Self::Displayed { .. } => "displayed",
        }
    }

    /// Locator string as written by the caller
    #[must_use]
    pub fn locator(&self) -> &str {
        match self {
            Self::Present(target) | Self::Absent(target) | Self::Count(target, _) => target.raw(),
            Self::Displayed { label, .. } => label,
        }
    }
}

/// Outcome of a satisfied [`WaitCondition`]
#[derive(Debug)]
pub enum Satisfied<E> {
    /// First matching element
    Present(E),
    /// Nothing matches
    Absent,
    /// The exact set of matches
    Count(Vec<E>),
    /// The element is visible
    Displayed,
}

impl<E> Satisfied<E> {
    fn into_element(self) -> Option<E> {
        match self {
            Self::Present(element) => Some(element),
            _ => None,
        }
    }

    fn into_elements(self) -> Option<Vec<E>> {
        match self {
            Self::Count(found) => Some(found),
            _ => None,
        }
    }
}

// =============================================================================
// WAIT ENGINE
// =============================================================================

/// Polling waits against one driver session
#[derive(Debug)]
pub struct WaitEngine<'d, D: WebDriver> {
    query: ElementQuery<'d, D>,
}

impl<'d, D: WebDriver> WaitEngine<'d, D> {
    /// Wait engine over a driver
    #[must_use]
    pub const fn new(driver: &'d D) -> Self {
        Self {
            query: ElementQuery::new(driver),
        }
    }

    /// Underlying non-waiting query
    #[must_use]
    pub const fn query(&self) -> &ElementQuery<'d, D> {
        &self.query
    }

    async fn check(
        &self,
        condition: &WaitCondition<'_, D::Element>,
    ) -> FirmeResult<Option<Satisfied<D::Element>>> {
        Ok(match condition {
            WaitCondition::Present(target) => {
                self.query.find_one(target).await?.map(Satisfied::Present)
            }
            WaitCondition::Absent(target) => self
                .query
                .find_one(target)
                .await?
                .is_none()
                .then_some(Satisfied::Absent),
            WaitCondition::Count(target, expected) => {
                let found = self.query.find_many(target).await?;
                (found.len() == *expected).then(|| Satisfied::Count(found))
            }
            WaitCondition::Displayed { element, .. } => element
                .is_displayed()
                .await?
                .then_some(Satisfied::Displayed),
        })
    }

    /// Poll a condition until it holds or the deadline passes
    pub async fn poll(
        &self,
        condition: &WaitCondition<'_, D::Element>,
        spec: WaitSpec,
    ) -> FirmeResult<Satisfied<D::Element>> {
        let started = Instant::now();
        let deadline = started + spec.timeout();
        let interval = spec.poll_interval();
        loop {
            if let Some(done) = self.check(condition).await? {
                debug!(
                    operation = condition.operation(),
                    locator = condition.locator(),
                    elapsed = ?started.elapsed(),
                    "wait satisfied"
                );
                return Ok(done);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    operation = condition.operation(),
                    locator = condition.locator(),
                    timeout_ms = spec.timeout().as_millis() as u64,
                    "wait timed out"
                );
                return Err(FirmeError::WaitTimeout {
                    operation: condition.operation(),
                    locator: condition.locator().to_string(),
                    timeout: spec.timeout(),
                });
            }
            sleep(interval.min(deadline - now)).await;
        }
    }

    /// Wait until the target matches at least one element; returns the first
    pub async fn wait_for_present(&self, target: &Target, spec: WaitSpec) -> FirmeResult<D::Element> {
        self.poll(&WaitCondition::Present(target), spec)
            .await?
            .into_element()
            .ok_or_else(|| FirmeError::ElementNotFound {
                operation: "present",
                locator: target.raw().to_string(),
            })
    }

    /// Wait until the target matches nothing
    pub async fn wait_for_absent(&self, target: &Target, spec: WaitSpec) -> FirmeResult<()> {
        self.poll(&WaitCondition::Absent(target), spec).await.map(|_| ())
    }

    /// Wait until the target matches exactly `expected` elements
    pub async fn wait_for_count(
        &self,
        target: &Target,
        expected: usize,
        spec: WaitSpec,
    ) -> FirmeResult<Vec<D::Element>> {
        self.poll(&WaitCondition::Count(target, expected), spec)
            .await?
            .into_elements()
            .ok_or_else(|| FirmeError::ElementNotFound {
                operation: "count",
                locator: target.raw().to_string(),
            })
    }

    /// Wait until an already-resolved element is visible.
    ///
    /// A stale handle surfaces as a driver error; see [`Self::wait_for_displayed`]
    /// for the re-resolving variant.
    pub async fn wait_for_element_displayed(
        &self,
        element: &D::Element,
        label: &str,
        spec: WaitSpec,
    ) -> FirmeResult<()> {
        self.poll(&WaitCondition::Displayed { element, label }, spec)
            .await
            .map(|_| ())
    }

    /// Wait until the target is present and visible; returns the element.
    ///
    /// `spec` is a per-stage budget, not a deadline for the whole call: the
    /// presence wait and the visibility poll each get the full timeout. An
    /// element that shows up late and never becomes visible therefore fails
    /// only after up to twice the timeout.
    ///
    /// If the handle goes stale while polling, the locator is resolved again
    /// once and both stages run again with fresh budgets, so the worst case
    /// is four timeouts. A second stale reference fails with
    /// [`FirmeError::StaleElement`].
    pub async fn wait_for_displayed(&self, target: &Target, spec: WaitSpec) -> FirmeResult<D::Element> {
        let element = self.wait_for_present(target, spec).await?;
        let first = self
            .wait_for_element_displayed(&element, target.raw(), spec)
            .await;
        match first {
            Ok(()) => return Ok(element),
            Err(e) if e.is_stale() => {
                warn!(locator = %target, "element went stale while waiting for visibility, re-resolving");
            }
            Err(e) => return Err(e),
        }

        let element = self.wait_for_present(target, spec).await?;
        let second = self
            .wait_for_element_displayed(&element, target.raw(), spec)
            .await;
        match second {
            Ok(()) => Ok(element),
            Err(e) if e.is_stale() => Err(FirmeError::StaleElement {
                operation: "displayed",
                locator: target.raw().to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement};

    fn target(raw: &str) -> Target {
        Target::parse(raw).unwrap()
    }

    mod wait_spec_tests {
        use super::*;

        #[test]
        fn test_default_is_thirty_seconds() {
            let spec = WaitSpec::default();
            assert_eq!(spec.timeout(), Duration::from_secs(30));
            assert_eq!(spec.poll_interval(), Duration::from_secs(3));
        }

        #[test]
        fn test_poll_interval_override() {
            let spec = WaitSpec::from_secs(5).with_poll_interval(Duration::from_millis(250));
            assert_eq!(spec.poll_interval(), Duration::from_millis(250));
        }

        #[test]
        fn test_poll_interval_floor() {
            assert_eq!(WaitSpec::new(Duration::ZERO).poll_interval(), MIN_POLL_INTERVAL);
        }
    }

    mod presence_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_present_after_delay() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new("#late").appears_after(Duration::from_secs(2)));
            let engine = WaitEngine::new(&driver);

            let start = Instant::now();
            engine
                .wait_for_present(&target("#late"), WaitSpec::from_secs(5))
                .await
                .unwrap();
            let waited = start.elapsed();
            assert!(waited >= Duration::from_secs(2));
            assert!(waited < Duration::from_secs(3));
        }

        #[tokio::test(start_paused = true)]
        async fn test_present_timeout_bounds() {
            let driver = MockDriver::new();
            let engine = WaitEngine::new(&driver);
            let spec = WaitSpec::from_secs(5);

            let start = Instant::now();
            let err = engine
                .wait_for_present(&target("#never"), spec)
                .await
                .unwrap_err();
            let waited = start.elapsed();

            assert!(matches!(
                err,
                FirmeError::WaitTimeout { operation: "present", ref locator, .. } if locator == "#never"
            ));
            assert!(waited >= spec.timeout());
            assert!(waited <= spec.timeout() + spec.poll_interval());
        }

        #[tokio::test(start_paused = true)]
        async fn test_absent_after_removal() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new(".spinner").removed_after(Duration::from_secs(1)));
            let engine = WaitEngine::new(&driver);

            engine
                .wait_for_absent(&target(".spinner"), WaitSpec::from_secs(5))
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_absent_timeout_names_operation() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new(".modal"));
            let engine = WaitEngine::new(&driver);

            let err = engine
                .wait_for_absent(&target(".modal"), WaitSpec::from_secs(1))
                .await
                .unwrap_err();
            assert!(err.to_string().starts_with("absent(\".modal\")"));
        }
    }

    mod count_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_count_reached() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new(".item"));
            driver.add_element(MockElement::new(".item"));
            driver.add_element(MockElement::new(".item").appears_after(Duration::from_secs(2)));
            let engine = WaitEngine::new(&driver);

            let found = engine
                .wait_for_count(&target(".item"), 3, WaitSpec::from_secs(5))
                .await
                .unwrap();
            assert_eq!(found.len(), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_count_above_target_is_not_success() {
            let driver = MockDriver::new();
            for _ in 0..4 {
                driver.add_element(MockElement::new(".item"));
            }
            let engine = WaitEngine::new(&driver);

            let err = engine
                .wait_for_count(&target(".item"), 3, WaitSpec::from_secs(2))
                .await
                .unwrap_err();
            assert!(err.is_timeout());
        }
    }

    mod displayed_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_displayed_after_delay() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new("#panel").displayed_after(Duration::from_secs(1)));
            let engine = WaitEngine::new(&driver);

            engine
                .wait_for_displayed(&target("#panel"), WaitSpec::from_secs(5))
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_stale_handle_is_re_resolved_once() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new("#row").stale_once());
            let engine = WaitEngine::new(&driver);

            engine
                .wait_for_displayed(&target("#row"), WaitSpec::from_secs(5))
                .await
                .unwrap();
            assert_eq!(driver.call_count("find_element:"), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_hidden_element_times_out() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new("#ghost").hidden());
            let engine = WaitEngine::new(&driver);

            let err = engine
                .wait_for_displayed(&target("#ghost"), WaitSpec::from_secs(2))
                .await
                .unwrap_err();
            assert!(matches!(err, FirmeError::WaitTimeout { operation: "displayed", .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_each_stage_gets_its_own_budget() {
            let driver = MockDriver::new();
            driver.add_element(
                MockElement::new("#late")
                    .appears_after(Duration::from_secs(4))
                    .hidden(),
            );
            let engine = WaitEngine::new(&driver);
            let spec = WaitSpec::from_secs(5);

            let start = Instant::now();
            let err = engine
                .wait_for_displayed(&target("#late"), spec)
                .await
                .unwrap_err();
            let waited = start.elapsed();

            assert!(matches!(err, FirmeError::WaitTimeout { operation: "displayed", .. }));
            assert!(waited >= Duration::from_secs(9));
            assert!(waited <= 2 * (spec.timeout() + spec.poll_interval()));
        }
    }
}
