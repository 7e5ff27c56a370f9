//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Firme library error
    #[error("{0}")]
    Firme(firme::FirmeError),

    /// JSON rendering error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<firme::FirmeError> for CliError {
    /// Session configuration failures become [`CliError::Config`]
    fn from(err: firme::FirmeError) -> Self {
        match err {
            firme::FirmeError::Config { message } => Self::config(message),
            other => Self::Firme(other),
        }
    }
}
