//! Best-effort clicking with escalating fallback strategies.
//!
//! A click resolves its target with a presence wait, refuses ambiguous
//! targets, then walks a fallback chain until one strategy succeeds:
//!
//! ```text
//! native click ──fail──► script click ──fail──► Enter key ──fail──► AllFailed
//!      │                  (mousedown,               │              (recorded in
//!      ▼                   mouseup, click)          ▼               ErrorList)
//!   Clicked(Native)            │              Clicked(Keyboard)
//!                              ▼
//!                        Clicked(Script)
//! ```
//!
//! Every click ends with a short delay and an activity settle, whichever
//! strategy won. Compound operations (click then wait) are retried once as
//! a whole when they time out.
//!
//! ## Toyota Way Application
//!
//! - **Jidoka**: Ambiguous targets stop the test instead of clicking a guess
//! - **Genchi Genbutsu**: Each failed stage is logged with the locator
//! - **Heijunka**: Fixed pre/post delays give the UI the same rhythm every run

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::driver::{Key, WebDriver, WebElement};
use crate::failures::ErrorList;
use crate::locator::{Locator, Target};
use crate::result::{DriverError, FirmeError, FirmeResult};
use crate::retry::retry_once;
use crate::settle::{ActivitySettler, SettleConfig};
use crate::wait::{WaitEngine, WaitSpec};

/// Default delay between presence and the first click attempt
pub const DEFAULT_PRE_CLICK_DELAY: Duration = Duration::from_millis(50);

/// Default delay between the click chain and the settle
pub const DEFAULT_POST_CLICK_DELAY: Duration = Duration::from_millis(100);

/// Click timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickConfig {
    /// Pause after the target is present
    pub pre_click_delay: Duration,
    /// Pause after the fallback chain, before settling
    pub post_click_delay: Duration,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            pre_click_delay: DEFAULT_PRE_CLICK_DELAY,
            post_click_delay: DEFAULT_POST_CLICK_DELAY,
        }
    }
}

/// Stage of the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickStrategy {
    /// Driver-native click
    Native,
    /// Synthetic mouse events dispatched by script
    Script,
    /// Enter key sent to the element
    Keyboard,
}

impl ClickStrategy {
    /// Chain order
    pub const CHAIN: [Self; 3] = [Self::Native, Self::Script, Self::Keyboard];

    /// Short name for logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Script => "script",
            Self::Keyboard => "keyboard",
        }
    }
}

impl fmt::Display for ClickStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the fallback chain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// This strategy succeeded
    Clicked(ClickStrategy),
    /// Every strategy failed; the failure was recorded, not raised
    AllFailed,
}

impl ClickOutcome {
    /// Whether some strategy succeeded
    #[must_use]
    pub const fn succeeded(self) -> bool {
        matches!(self, Self::Clicked(_))
    }
}

/// A clicked element and how it was clicked
#[derive(Debug)]
pub struct Clicked<E> {
    /// The element the chain acted on
    pub element: E,
    /// Which strategy won
    pub outcome: ClickOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClickKind {
    Robust,
    Svg,
}

/// JavaScript expression for the `index`-th match of `locator`, in document
/// order. Matches the order of [`WebDriver::find_elements`].
fn nth_match(locator: &Locator, index: usize) -> String {
    format!("({})[{index}]", locator.to_js_all())
}

/// Script dispatching mousedown, mouseup and click on the `index`-th match.
/// Returns `false` when nothing matches.
fn script_click(locator: &Locator, index: usize) -> String {
    format!(
        "const el = {};\n\
         if (!el) {{ return false; }}\n\
         for (const type of ['mousedown', 'mouseup', 'click']) {{\n\
         \x20 el.dispatchEvent(new MouseEvent(type, {{ bubbles: true, cancelable: true, view: window }}));\n\
         }}\n\
         return true;",
        nth_match(locator, index)
    )
}

/// Script dispatching a generic click event, which SVG nodes accept where
/// `HTMLElement.click()` does not exist. Returns `false` when nothing matches.
fn svg_click(locator: &Locator) -> String {
    format!(
        "const el = {};\n\
         if (!el) {{ return false; }}\n\
         const evt = document.createEvent('SVGEvents');\n\
         evt.initEvent('click', true, true);\n\
         el.dispatchEvent(evt);\n\
         return true;",
        locator.to_js_first()
    )
}

/// The element a click acts on, and its position among all matches
#[derive(Debug)]
struct ClickTarget<E> {
    element: E,
    index: usize,
}

/// Clicks with fallbacks, then settles page activity
#[derive(Debug)]
pub struct RobustClicker<'d, D: WebDriver> {
    driver: &'d D,
    waits: WaitEngine<'d, D>,
    settler: ActivitySettler<'d, D>,
    errors: &'d ErrorList,
    config: ClickConfig,
    spec: WaitSpec,
}

impl<'d, D: WebDriver> RobustClicker<'d, D> {
    /// Clicker over a driver, recording unrecoverable clicks in `errors`
    #[must_use]
    pub const fn new(
        driver: &'d D,
        errors: &'d ErrorList,
        spec: WaitSpec,
        config: ClickConfig,
        settle: SettleConfig,
    ) -> Self {
        Self {
            driver,
            waits: WaitEngine::new(driver),
            settler: ActivitySettler::new(driver, settle),
            errors,
            config,
            spec,
        }
    }

    /// Pick the element to click among all current matches.
    ///
    /// More than one visible match is an authoring error. A single visible
    /// match wins over hidden duplicates wherever they sit in document order.
    /// With no visible match the first one is used, so the fallback chain
    /// still gets its chance.
    async fn resolve_click_target(
        &self,
        operation: &'static str,
        target: &Target,
        present: D::Element,
    ) -> FirmeResult<ClickTarget<D::Element>> {
        let mut candidates = self.waits.query().find_many(target).await?;
        if candidates.len() < 2 {
            let element = candidates.pop().unwrap_or(present);
            return Ok(ClickTarget { element, index: 0 });
        }
        let mut visible = Vec::new();
        for (index, candidate) in candidates.iter().enumerate() {
            match candidate.is_displayed().await {
                Ok(true) => visible.push(index),
                Ok(false) => {}
                Err(e) if e.is_session_failure() => return Err(e.into()),
                Err(_) => {}
            }
        }
        if visible.len() > 1 {
            return Err(FirmeError::AmbiguousSelector {
                operation,
                locator: target.raw().to_string(),
                count: visible.len(),
            });
        }
        let index = visible.first().copied().unwrap_or(0);
        let element = candidates.swap_remove(index);
        Ok(ClickTarget { element, index })
    }

    async fn try_strategy(
        &self,
        strategy: ClickStrategy,
        target: &Target,
        chosen: &ClickTarget<D::Element>,
    ) -> Result<(), DriverError> {
        let element = &chosen.element;
        match strategy {
            ClickStrategy::Native => element.click().await,
            ClickStrategy::Script => {
                let dispatched = self
                    .driver
                    .execute_script(&script_click(target.locator(), chosen.index))
                    .await?;
                if dispatched == Value::Bool(true) {
                    Ok(())
                } else {
                    Err(DriverError::interaction("script click found no element"))
                }
            }
            ClickStrategy::Keyboard => element.send_keys(Key::Enter.into()).await,
        }
    }

    /// Walk the fallback chain; only a dead session escapes as an error
    async fn activate(
        &self,
        target: &Target,
        chosen: &ClickTarget<D::Element>,
    ) -> FirmeResult<ClickOutcome> {
        for strategy in ClickStrategy::CHAIN {
            match self.try_strategy(strategy, target, chosen).await {
                Ok(()) => return Ok(ClickOutcome::Clicked(strategy)),
                Err(e) if e.is_session_failure() => return Err(e.into()),
                Err(e) => {
                    info!(locator = %target, strategy = %strategy, error = %e, "click strategy failed");
                }
            }
        }
        Ok(ClickOutcome::AllFailed)
    }

    /// Click the single element matching `target`.
    ///
    /// Waits for presence, rejects more than one visible candidate with
    /// [`FirmeError::AmbiguousSelector`], then tries native, script and
    /// keyboard activation in turn, all on the same candidate: the only
    /// visible match, or the first match when none is visible. When all three fail the outcome is
    /// [`ClickOutcome::AllFailed`] and a message is recorded in the session
    /// error list; the call itself still succeeds.
    pub async fn click(&self, target: &Target) -> FirmeResult<Clicked<D::Element>> {
        let present = self.waits.wait_for_present(target, self.spec).await?;
        sleep(self.config.pre_click_delay).await;
        let chosen = self.resolve_click_target("click", target, present).await?;

        info!(locator = %target, index = chosen.index, "clicking");
        let outcome = self.activate(target, &chosen).await?;
        if outcome == ClickOutcome::AllFailed {
            warn!(locator = %target, "every click strategy failed");
            self.errors
                .report(&format!("click(\"{target}\"): every click strategy failed"));
        }

        sleep(self.config.post_click_delay).await;
        let _ = self.settler.settle().await?;
        Ok(Clicked {
            element: chosen.element,
            outcome,
        })
    }

    /// Dispatch a synthetic click event on an SVG node, then settle
    pub async fn click_svg(&self, target: &Target) -> FirmeResult<()> {
        info!(locator = %target, "clicking svg");
        let dispatched = self.driver.execute_script(&svg_click(target.locator())).await?;
        if dispatched != Value::Bool(true) {
            return Err(FirmeError::ElementNotFound {
                operation: "click_svg",
                locator: target.raw().to_string(),
            });
        }
        let _ = self.settler.settle().await?;
        Ok(())
    }

    async fn click_with(&self, kind: ClickKind, target: &Target) -> FirmeResult<()> {
        match kind {
            ClickKind::Robust => self.click(target).await.map(|_| ()),
            ClickKind::Svg => self.click_svg(target).await,
        }
    }

    async fn click_then_present(
        &self,
        kind: ClickKind,
        click: &Target,
        present: &Target,
    ) -> FirmeResult<D::Element> {
        retry_once(
            "click_and_wait_for_present",
            move || async move {
                self.click_with(kind, click).await?;
                self.waits.wait_for_present(present, self.spec).await
            },
            FirmeError::is_timeout,
        )
        .await
    }

    async fn click_then_displayed(
        &self,
        kind: ClickKind,
        click: &Target,
        displayed: &Target,
    ) -> FirmeResult<D::Element> {
        retry_once(
            "click_and_wait_for_displayed",
            move || async move {
                self.click_with(kind, click).await?;
                self.waits.wait_for_displayed(displayed, self.spec).await
            },
            FirmeError::is_timeout,
        )
        .await
    }

    async fn click_then_absent(&self, kind: ClickKind, target: &Target) -> FirmeResult<()> {
        retry_once(
            "click_to_dismiss",
            move || async move {
                self.click_with(kind, target).await?;
                self.waits.wait_for_absent(target, self.spec).await
            },
            FirmeError::is_timeout,
        )
        .await
    }

    /// Click, then wait for another element to appear (one retry on timeout)
    pub async fn click_and_wait_for_present(
        &self,
        click: &Target,
        present: &Target,
    ) -> FirmeResult<D::Element> {
        self.click_then_present(ClickKind::Robust, click, present).await
    }

    /// Click, then wait for another element to be visible (one retry on timeout)
    pub async fn click_and_wait_for_displayed(
        &self,
        click: &Target,
        displayed: &Target,
    ) -> FirmeResult<D::Element> {
        self.click_then_displayed(ClickKind::Robust, click, displayed)
            .await
    }

    /// Click an element that removes itself, then wait for it to leave the DOM
    /// (one retry on timeout). Hidden-but-attached elements never qualify.
    pub async fn click_to_dismiss(&self, target: &Target) -> FirmeResult<()> {
        self.click_then_absent(ClickKind::Robust, target).await
    }

    /// SVG variant of [`Self::click_and_wait_for_present`]
    pub async fn click_svg_and_wait_for_present(
        &self,
        click: &Target,
        present: &Target,
    ) -> FirmeResult<D::Element> {
        self.click_then_present(ClickKind::Svg, click, present).await
    }

    /// SVG variant of [`Self::click_and_wait_for_displayed`]
    pub async fn click_svg_and_wait_for_displayed(
        &self,
        click: &Target,
        displayed: &Target,
    ) -> FirmeResult<D::Element> {
        self.click_then_displayed(ClickKind::Svg, click, displayed).await
    }

    /// SVG variant of [`Self::click_to_dismiss`]
    pub async fn click_svg_to_dismiss(&self, target: &Target) -> FirmeResult<()> {
        self.click_then_absent(ClickKind::Svg, target).await
    }

    /// Click a checkbox; if it does not read as checked, click once more,
    /// then fail unless `checked` is `"true"`
    pub async fn click_checkbox(&self, target: &Target) -> FirmeResult<()> {
        let clicked = self.click(target).await?;
        let mut checked = clicked.element.attribute("checked").await?;
        if checked.as_deref() != Some("true") {
            info!(locator = %target, "checkbox still unchecked, clicking again");
            let clicked = self.click(target).await?;
            checked = clicked.element.attribute("checked").await?;
        }
        if checked.as_deref() == Some("true") {
            Ok(())
        } else {
            Err(FirmeError::assertion(format!("should be checked: {target}")))
        }
    }
}
