//! Driver capability - abstract browser automation traits.
//!
//! Everything above this module talks to the browser only through
//! [`WebDriver`] and [`WebElement`], so a session can run against Chromium
//! (feature `browser`), a remote WebDriver adapter, or [`crate::MockDriver`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Page (page-object base)                                      │
//! │    ├── RobustClicker ──► ActivitySettler                      │
//! │    ├── WaitEngine ─────► ElementQuery ──► LocatorParser       │
//! │    └── DiagnosticCapture                                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  WebDriver / WebElement (this module)                         │
//! ├──────────────────┬──────────────────┬────────────────────────┤
//! │  CdpDriver       │  MockDriver      │  your adapter          │
//! │  (chromiumoxide) │  (unit tests)    │                        │
//! └──────────────────┴──────────────────┴────────────────────────┘
//! ```
//!
//! Absence is never an error here: `find_element` returns `Ok(None)` and
//! `find_elements` returns an empty vector. `Err` is reserved for the
//! conditions in [`DriverError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::locator::Locator;
use crate::result::DriverResult;

/// Special keys that can be sent to an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Enter / Return
    Enter,
    /// Tab
    Tab,
    /// Escape
    Escape,
    /// Space bar
    Space,
    /// Backspace
    Backspace,
}

impl Key {
    /// DOM `KeyboardEvent.key` name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Enter => "Enter",
            Self::Tab => "Tab",
            Self::Escape => "Escape",
            Self::Space => " ",
            Self::Backspace => "Backspace",
        }
    }
}

/// Input accepted by [`WebElement::send_keys`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    /// Literal text to type
    Text(String),
    /// A single special key press
    Key(Key),
}

impl KeyInput {
    /// Literal text input
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

impl From<Key> for KeyInput {
    fn from(key: Key) -> Self {
        Self::Key(key)
    }
}

/// Navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Load a URL
    To(String),
    /// Go back in history
    Back,
    /// Reload the current page
    Refresh,
}

/// A located UI element.
///
/// Handles are transient: any call may fail with
/// [`DriverError::StaleElement`](crate::DriverError::StaleElement) once the
/// page re-renders the node.
#[async_trait]
pub trait WebElement: Send + Sync {
    /// Rendered text content
    async fn text(&self) -> DriverResult<String>;

    /// Attribute (or boolean property) value; `None` when unset
    async fn attribute(&self, name: &str) -> DriverResult<Option<String>>;

    /// Whether the element is rendered and visible
    async fn is_displayed(&self) -> DriverResult<bool>;

    /// Whether the element accepts interaction
    async fn is_enabled(&self) -> DriverResult<bool>;

    /// Native click
    async fn click(&self) -> DriverResult<()>;

    /// Type text or press a special key
    async fn send_keys(&self, input: KeyInput) -> DriverResult<()>;

    /// Clear an editable element
    async fn clear(&self) -> DriverResult<()>;
}

/// Browser automation session.
///
/// One session is driven sequentially by one caller; implementations only
/// need `&self` because the underlying protocols serialize commands.
#[async_trait]
pub trait WebDriver: Send + Sync {
    /// Element handle type
    type Element: WebElement;

    /// First element matching the locator
    async fn find_element(&self, locator: &Locator) -> DriverResult<Option<Self::Element>>;

    /// All elements matching the locator, in document order
    async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<Self::Element>>;

    /// Execute a script body in the page; the body may `return` a value
    async fn execute_script(&self, script: &str) -> DriverResult<serde_json::Value>;

    /// Navigate (load, back, refresh)
    async fn navigate(&self, navigation: Navigation) -> DriverResult<()>;

    /// URL of the current page
    async fn current_url(&self) -> DriverResult<String>;

    /// Delete all cookies visible to the session
    async fn delete_all_cookies(&self) -> DriverResult<()>;

    /// End the session
    async fn quit(&self) -> DriverResult<()>;
}
