//! Session-scoped failure accumulator.
//!
//! Best-effort operations (a click whose every strategy failed, a
//! caller-reported problem) record a message here instead of raising.
//! The list belongs to one session; appends are serialized by a mutex so a
//! page object shared across test threads cannot interleave entries.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Failure messages collected during one session
#[derive(Debug, Default)]
pub struct ErrorList {
    entries: Mutex<Vec<String>>,
}

impl ErrorList {
    /// Empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failure. Single quotes are stripped so the message can be
    /// embedded in generated reports verbatim.
    pub fn report(&self, message: &str) {
        let sanitized = message.replace('\'', "");
        let sanitized = sanitized.trim();
        warn!(failure = sanitized, "failure recorded");
        self.lock().push(sanitized.to_string());
    }

    /// Snapshot of the recorded messages, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Number of recorded messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take every message, leaving the list empty (session boundary)
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }
}
