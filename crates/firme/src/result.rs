//! Result and error types for Firme.

use std::time::Duration;
use thiserror::Error;

/// Result type for Firme operations
pub type FirmeResult<T> = Result<T, FirmeError>;

/// Result type for raw driver/element calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Failures reported by a driver backend or one of its element handles
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// The element handle no longer points at a live DOM node
    #[error("stale element reference: {message}")]
    StaleElement {
        /// Error message
        message: String,
    },

    /// The element exists but refused the interaction (covered, disabled, ...)
    #[error("element interaction failed: {message}")]
    Interaction {
        /// Error message
        message: String,
    },

    /// A script threw or could not be evaluated
    #[error("script execution failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// The automation session itself is gone (disconnected, crashed, quit)
    #[error("browser session failure: {message}")]
    Session {
        /// Error message
        message: String,
    },
}

impl DriverError {
    /// Create a stale element error
    #[must_use]
    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleElement {
            message: message.into(),
        }
    }

    /// Create an interaction error
    #[must_use]
    pub fn interaction(message: impl Into<String>) -> Self {
        Self::Interaction {
            message: message.into(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create a session error
    #[must_use]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Whether the page mutated under the handle
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleElement { .. })
    }

    /// Whether the browser session is unusable
    #[must_use]
    pub const fn is_session_failure(&self) -> bool {
        matches!(self, Self::Session { .. })
    }
}

/// Errors that can occur in Firme
#[derive(Debug, Error)]
pub enum FirmeError {
    /// Empty or malformed locator string
    #[error("Invalid locator {locator:?}: {message}")]
    InvalidLocator {
        /// Locator as passed by the caller
        locator: String,
        /// Error message
        message: String,
    },

    /// A wait deadline passed before its condition held
    #[error("{operation}(\"{locator}\") timed out after {timeout:?}")]
    WaitTimeout {
        /// Wait operation name
        operation: &'static str,
        /// Locator as passed by the caller
        locator: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// Page activity never quiesced, even after a reload
    #[error("Page activity still pending after {attempts} attempt(s) of {timeout:?}")]
    SettleTimeout {
        /// Per-attempt timeout
        timeout: Duration,
        /// Number of poll attempts made
        attempts: u32,
    },

    /// A single-target action matched several visible elements
    #[error("{operation}(\"{locator}\") matched {count} visible elements, expected exactly one")]
    AmbiguousSelector {
        /// Operation name
        operation: &'static str,
        /// Locator as passed by the caller
        locator: String,
        /// Number of visible candidates
        count: usize,
    },

    /// The element went stale again after one re-resolve
    #[error("{operation}(\"{locator}\") kept hitting stale element references")]
    StaleElement {
        /// Operation name
        operation: &'static str,
        /// Locator as passed by the caller
        locator: String,
    },

    /// An operation needed an element that is not on the page
    #[error("{operation}(\"{locator}\") found no matching element")]
    ElementNotFound {
        /// Operation name
        operation: &'static str,
        /// Locator as passed by the caller
        locator: String,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// API misuse (e.g. capturing a snapshot without a cause)
    #[error("Precondition violated: {message}")]
    Precondition {
        /// Error message
        message: String,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Driver failure
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FirmeError {
    /// Create an invalid locator error
    #[must_use]
    pub fn invalid_locator(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidLocator {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Create an assertion error
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a precondition error
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Whether a deadline expired (the only errors compound clicks retry)
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. } | Self::SettleTimeout { .. })
    }

    /// Whether a driver call hit a stale element reference
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Driver(DriverError::StaleElement { .. }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod driver_error_tests {
        use super::*;

        #[test]
        fn test_classification() {
            assert!(DriverError::stale("gone").is_stale());
            assert!(!DriverError::interaction("covered").is_stale());
            assert!(DriverError::session("closed").is_session_failure());
            assert!(!DriverError::script("boom").is_session_failure());
        }

        #[test]
        fn test_messages() {
            assert_eq!(
                DriverError::interaction("covered").to_string(),
                "element interaction failed: covered"
            );
        }
    }

    mod firme_error_tests {
        use super::*;

        #[test]
        fn test_wait_timeout_names_operation_and_locator() {
            let err = FirmeError::WaitTimeout {
                operation: "present",
                locator: "#submit".to_string(),
                timeout: Duration::from_secs(5),
            };
            assert_eq!(err.to_string(), "present(\"#submit\") timed out after 5s");
        }

        #[test]
        fn test_ambiguous_selector_message() {
            let err = FirmeError::AmbiguousSelector {
                operation: "click",
                locator: ".row button".to_string(),
                count: 3,
            };
            assert!(err.to_string().contains("matched 3 visible elements"));
        }

        #[test]
        fn test_is_timeout() {
            let settle = FirmeError::SettleTimeout {
                timeout: Duration::from_secs(45),
                attempts: 2,
            };
            assert!(settle.is_timeout());
            assert!(!FirmeError::assertion("nope").is_timeout());
        }

        #[test]
        fn test_is_stale() {
            let err: FirmeError = DriverError::stale("detached").into();
            assert!(err.is_stale());
            assert!(!FirmeError::precondition("x").is_stale());
        }

        #[test]
        fn test_io_error_from() {
            let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
            let err: FirmeError = io_err.into();
            assert!(err.to_string().contains("I/O"));
        }
    }
}
