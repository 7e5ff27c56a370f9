//! Output formatting

use console::{style, Term};
use firme::{Locator, NativeQuery};
use serde::{Deserialize, Serialize};

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON lines
    Json,
}

/// Status messages on stderr
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }
}

/// One locator as reported by `firme locate --json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatorReport<'a> {
    /// String as given on the command line
    pub input: &'a str,
    /// Strategy prefix (`css`, `xpath`, `id`, ...)
    pub strategy: &'static str,
    /// Value after the prefix
    pub value: &'a str,
    /// Query a browser backend will run
    pub native: NativeQuery,
}

impl<'a> LocatorReport<'a> {
    /// Describe a parsed locator
    #[must_use]
    pub fn new(input: &'a str, locator: &'a Locator) -> Self {
        Self {
            input,
            strategy: locator.strategy().prefix(),
            value: locator.value(),
            native: locator.to_native(),
        }
    }

    /// Multi-line text form
    #[must_use]
    pub fn render_text(&self, use_color: bool) -> String {
        let kind = match self.native {
            NativeQuery::Css(_) => "css",
            NativeQuery::XPath(_) => "xpath",
        };
        let input = if use_color {
            style(self.input).bold().to_string()
        } else {
            self.input.to_string()
        };
        format!(
            "{input}\n  strategy: {}\n  value:    {}\n  native:   {kind} {}\n",
            self.strategy,
            self.value,
            self.native.as_str()
        )
    }
}
