//! Firme: robust element lookup, waiting, clicking and failure snapshots
//! for browser-driven tests.
//!
//! Browser tests fail for reasons that have nothing to do with the
//! application: an element rendered a few hundred milliseconds late, a
//! node replaced by a re-render between lookup and use, a click swallowed
//! by an overlay, an XHR still in flight. Firme wraps a [`WebDriver`] in a
//! page-object base ([`Page`]) whose operations absorb that noise and, when
//! they do fail, say exactly which operation on which locator timed out.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      FIRME Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Page       │    │ Wait /     │    │ WebDriver  │            │
//! │   │ Object     │───►│ Click /    │───►│ (CDP or    │            │
//! │   │ (locators) │    │ Settle     │    │  mock)     │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │          │                                   │                   │
//! │          ▼                                   ▼                   │
//! │   ┌────────────┐                      ┌────────────┐            │
//! │   │ ErrorList  │                      │ DOM        │            │
//! │   │            │                      │ Snapshot   │            │
//! │   └────────────┘                      └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use firme::{MockDriver, MockElement, Page, SessionConfig};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let driver = MockDriver::new();
//! driver.add_element(MockElement::new("#greeting").with_text("hello"));
//!
//! let page = Page::new(driver, SessionConfig::default());
//! assert_eq!(page.get_text("#greeting").await.unwrap(), "hello");
//! # });
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod click;
mod config;
mod driver;
mod failures;
mod locator;
mod page;
mod query;
mod result;
mod retry;
mod settle;
mod snapshot;
mod wait;

/// In-memory driver for exercising page objects without a browser
///
/// Scripted element timelines (appear, disappear, become visible) run on
/// tokio time, so tests under a paused clock are deterministic.
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod mock;

/// Chromium backend (requires the `browser` feature)
#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod browser;

pub use click::{
    ClickConfig, ClickOutcome, ClickStrategy, Clicked, RobustClicker, DEFAULT_POST_CLICK_DELAY,
    DEFAULT_PRE_CLICK_DELAY,
};
pub use config::SessionConfig;
pub use driver::{Key, KeyInput, Navigation, WebDriver, WebElement};
pub use failures::ErrorList;
pub use locator::{Locator, NativeQuery, Strategy, Target};
pub use mock::{MockDriver, MockElement, MockElementHandle, ScriptContext, ScriptResponse};
pub use page::{Page, SelectBy};
pub use query::ElementQuery;
pub use result::{DriverError, DriverResult, FirmeError, FirmeResult};
pub use retry::retry_once;
pub use settle::{
    Activity, ActivitySettler, SettleConfig, SettleReport, DEFAULT_ACTIVITY_PROBE,
    DEFAULT_SETTLE_POLL_INTERVAL, DEFAULT_SETTLE_TIMEOUT,
};
pub use snapshot::{
    sanitize_snapshot, snapshot_file_name, DiagnosticCapture, FsSnapshotStore, SnapshotStore,
    DEFAULT_SNAPSHOT_DIR,
};
pub use wait::{
    Satisfied, WaitCondition, WaitEngine, WaitSpec, DEFAULT_WAIT_TIMEOUT, MIN_POLL_INTERVAL,
};

#[cfg(feature = "browser")]
pub use browser::{BrowserConfig, CdpDriver, CdpElement};

/// Prelude for page objects
pub mod prelude {
    pub use crate::{
        DiagnosticCapture, DriverError, FirmeError, FirmeResult, Locator, Page, SessionConfig,
        Target, WaitSpec, WebDriver, WebElement,
    };
}
