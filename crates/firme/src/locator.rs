//! Locator grammar: flexible locator strings resolved into typed lookups.
//!
//! A locator string is either `type=value`, where `type` is one of
//! `css`, `id`/`identifier`, `link`, `name`, `tag` or `xpath`
//! (case-insensitive), or a bare value:
//!
//! ```text
//! "css=#submit-btn"   -> Css("#submit-btn")
//! "id=happy"          -> Id("happy")
//! "//div[@id='x']"    -> XPath("//div[@id='x']")
//! "#submit-btn"       -> Css("#submit-btn")
//! "input[name=q]"     -> Css("input[name=q]")   (unknown prefix, CSS fallback)
//! ```
//!
//! ## Toyota Way Application
//!
//! - **Poka-Yoke**: Empty locators fail at parse time, not inside a wait
//! - **Heijunka**: One grammar for every page operation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::result::{FirmeError, FirmeResult};

/// Lookup strategy of a [`Locator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Element id attribute
    Id,
    /// CSS selector
    Css,
    /// XPath expression
    XPath,
    /// Exact visible text of a link
    LinkText,
    /// Element name attribute
    Name,
    /// Tag name
    TagName,
}

impl Strategy {
    /// Canonical prefix used in locator strings
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::LinkText => "link",
            Self::Name => "name",
            Self::TagName => "tag",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        const PREFIXES: [(&str, Strategy); 7] = [
            ("css", Strategy::Css),
            ("identifier", Strategy::Id),
            ("id", Strategy::Id),
            ("link", Strategy::LinkText),
            ("name", Strategy::Name),
            ("tag", Strategy::TagName),
            ("xpath", Strategy::XPath),
        ];
        PREFIXES
            .iter()
            .find(|(name, _)| prefix.eq_ignore_ascii_case(name))
            .map(|(_, strategy)| *strategy)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A structured, strategy-tagged element lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// By id attribute
    Id(String),
    /// By CSS selector
    Css(String),
    /// By XPath expression
    XPath(String),
    /// By exact link text
    LinkText(String),
    /// By name attribute
    Name(String),
    /// By tag name
    TagName(String),
}

impl Locator {
    /// Parse a locator string.
    ///
    /// # Errors
    ///
    /// Returns [`FirmeError::InvalidLocator`] for an empty string or a
    /// recognized `type=` prefix with nothing after it.
    pub fn parse(raw: &str) -> FirmeResult<Self> {
        if raw.is_empty() {
            return Err(FirmeError::invalid_locator(raw, "locator must not be empty"));
        }

        if let Some((prefix, value)) = raw.split_once('=') {
            if let Some(strategy) = Strategy::from_prefix(prefix) {
                if value.is_empty() {
                    return Err(FirmeError::invalid_locator(
                        raw,
                        format!("nothing after the '{prefix}=' prefix"),
                    ));
                }
                return Ok(Self::with_strategy(strategy, value));
            }
        }

        // Bare value: "/" means XPath, "#", "." and "[" are CSS shorthands,
        // and anything else (tags, compound selectors) is tried as CSS too.
        if raw.starts_with('/') {
            Ok(Self::XPath(raw.to_string()))
        } else {
            Ok(Self::Css(raw.to_string()))
        }
    }

    /// Build a locator from a strategy and value
    #[must_use]
    pub fn with_strategy(strategy: Strategy, value: impl Into<String>) -> Self {
        let value = value.into();
        match strategy {
            Strategy::Id => Self::Id(value),
            Strategy::Css => Self::Css(value),
            Strategy::XPath => Self::XPath(value),
            Strategy::LinkText => Self::LinkText(value),
            Strategy::Name => Self::Name(value),
            Strategy::TagName => Self::TagName(value),
        }
    }

    /// Strategy of this locator
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        match self {
            Self::Id(_) => Strategy::Id,
            Self::Css(_) => Strategy::Css,
            Self::XPath(_) => Strategy::XPath,
            Self::LinkText(_) => Strategy::LinkText,
            Self::Name(_) => Strategy::Name,
            Self::TagName(_) => Strategy::TagName,
        }
    }

    /// Lookup value (selector, id, text, ...)
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Id(v)
            | Self::Css(v)
            | Self::XPath(v)
            | Self::LinkText(v)
            | Self::Name(v)
            | Self::TagName(v) => v,
        }
    }

    /// Equivalent CSS or XPath query, for backends that only speak those two
    #[must_use]
    pub fn to_native(&self) -> NativeQuery {
        match self {
            Self::Id(id) => NativeQuery::Css(format!("[id=\"{}\"]", escape_css_string(id))),
            Self::Css(css) => NativeQuery::Css(css.clone()),
            Self::XPath(xpath) => NativeQuery::XPath(xpath.clone()),
            Self::LinkText(text) => {
                NativeQuery::XPath(format!("//a[normalize-space(.)={}]", xpath_literal(text.trim())))
            }
            Self::Name(name) => {
                NativeQuery::Css(format!("[name=\"{}\"]", escape_css_string(name)))
            }
            Self::TagName(tag) => NativeQuery::Css(tag.clone()),
        }
    }

    /// JavaScript expression evaluating to the first match, or `null`
    #[must_use]
    pub fn to_js_first(&self) -> String {
        self.to_native().to_js_first()
    }

    /// JavaScript expression evaluating to an array of all matches
    #[must_use]
    pub fn to_js_all(&self) -> String {
        self.to_native().to_js_all()
    }
}

impl FromStr for Locator {
    type Err = FirmeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// A CSS or XPath query understood natively by browser backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "query", rename_all = "lowercase")]
pub enum NativeQuery {
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
}

impl NativeQuery {
    /// Query text
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(q) | Self::XPath(q) => q,
        }
    }

    /// JavaScript expression evaluating to the first match, or `null`
    #[must_use]
    pub fn to_js_first(&self) -> String {
        match self {
            Self::Css(css) => format!("document.querySelector({})", js_string(css)),
            Self::XPath(xpath) => format!(
                "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_string(xpath)
            ),
        }
    }

    /// JavaScript expression evaluating to an array of all matches
    #[must_use]
    pub fn to_js_all(&self) -> String {
        match self {
            Self::Css(css) => format!("Array.from(document.querySelectorAll({}))", js_string(css)),
            Self::XPath(xpath) => format!(
                "(function() {{ const r = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; for (let i = 0; i < r.snapshotLength; i++) {{ out.push(r.snapshotItem(i)); }} return out; }})()",
                js_string(xpath)
            ),
        }
    }
}

/// A parsed locator that remembers the string the caller wrote.
///
/// Error messages always quote [`Target::raw`], never the normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    raw: String,
    locator: Locator,
}

impl Target {
    /// Parse a locator string
    ///
    /// # Errors
    ///
    /// Same as [`Locator::parse`].
    pub fn parse(raw: &str) -> FirmeResult<Self> {
        Ok(Self {
            raw: raw.to_string(),
            locator: Locator::parse(raw)?,
        })
    }

    /// Locator string as written by the caller
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed locator
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// JSON string literal, which is also a valid JavaScript string literal
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn escape_css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// XPath 1.0 has no escapes, so mixed quotes need `concat()`
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
