//! Session configuration.
//!
//! Every field has a default, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! wait_timeout_secs: 10
//! activity_probe: "return window.pendingRequests || 0"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::click::ClickConfig;
use crate::result::{FirmeError, FirmeResult};
use crate::settle::{SettleConfig, DEFAULT_ACTIVITY_PROBE};
use crate::snapshot::DEFAULT_SNAPSHOT_DIR;
use crate::wait::WaitSpec;

/// Timeouts, delays and paths for one page-object session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Default timeout for element waits
    pub wait_timeout_secs: u64,
    /// Poll interval override; `timeout / 10` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    /// Per-attempt activity settle timeout
    pub settle_timeout_secs: u64,
    /// Activity probe poll interval
    pub settle_poll_interval_ms: u64,
    /// Script returning the number of in-flight async units
    pub activity_probe: String,
    /// Reload once when activity stalls
    pub reload_on_stall: bool,
    /// Delay before clicking
    pub pre_click_delay_ms: u64,
    /// Delay after clicking
    pub post_click_delay_ms: u64,
    /// Diagnostic snapshot directory
    pub snapshot_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 30,
            poll_interval_ms: None,
            settle_timeout_secs: 45,
            settle_poll_interval_ms: 500,
            activity_probe: DEFAULT_ACTIVITY_PROBE.to_string(),
            reload_on_stall: true,
            pre_click_delay_ms: 50,
            post_click_delay_ms: 100,
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
        }
    }
}

impl SessionConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML
    pub fn from_yaml_str(yaml: &str) -> FirmeResult<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| FirmeError::Config {
            message: e.to_string(),
        })
    }

    /// Load a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> FirmeResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| FirmeError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&yaml).map_err(|e| match e {
            FirmeError::Config { message } => FirmeError::Config {
                message: format!("{}: {message}", path.display()),
            },
            other => other,
        })
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> FirmeResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| FirmeError::Config {
            message: e.to_string(),
        })
    }

    /// Set the default wait timeout
    #[must_use]
    pub const fn with_wait_timeout_secs(mut self, secs: u64) -> Self {
        self.wait_timeout_secs = secs;
        self
    }

    /// Override the wait poll interval
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = Some(ms);
        self
    }

    /// Set the per-attempt settle timeout
    #[must_use]
    pub const fn with_settle_timeout_secs(mut self, secs: u64) -> Self {
        self.settle_timeout_secs = secs;
        self
    }

    /// Set the activity probe script
    #[must_use]
    pub fn with_activity_probe(mut self, probe: impl Into<String>) -> Self {
        self.activity_probe = probe.into();
        self
    }

    /// Enable or disable reload on stall
    #[must_use]
    pub const fn with_reload_on_stall(mut self, reload: bool) -> Self {
        self.reload_on_stall = reload;
        self
    }

    /// Set both click delays
    #[must_use]
    pub const fn with_click_delays_ms(mut self, pre: u64, post: u64) -> Self {
        self.pre_click_delay_ms = pre;
        self.post_click_delay_ms = post;
        self
    }

    /// Set the snapshot directory
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    /// Default wait spec
    #[must_use]
    pub fn wait_spec(&self) -> WaitSpec {
        self.wait_spec_secs(self.wait_timeout_secs)
    }

    /// Wait spec with an explicit timeout and the configured poll override
    #[must_use]
    pub fn wait_spec_secs(&self, secs: u64) -> WaitSpec {
        let spec = WaitSpec::from_secs(secs);
        match self.poll_interval_ms {
            Some(ms) => spec.with_poll_interval(Duration::from_millis(ms)),
            None => spec,
        }
    }

    /// Activity settle configuration
    #[must_use]
    pub fn settle_config(&self) -> SettleConfig {
        SettleConfig::default()
            .with_timeout(Duration::from_secs(self.settle_timeout_secs))
            .with_poll_interval(Duration::from_millis(self.settle_poll_interval_ms))
            .with_probe(self.activity_probe.clone())
            .with_reload_on_stall(self.reload_on_stall)
    }

    /// Click timing
    #[must_use]
    pub const fn click_config(&self) -> ClickConfig {
        ClickConfig {
            pre_click_delay: Duration::from_millis(self.pre_click_delay_ms),
            post_click_delay: Duration::from_millis(self.post_click_delay_ms),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.wait_spec().timeout(), Duration::from_secs(30));
        assert_eq!(config.settle_config().timeout, Duration::from_secs(45));
        assert_eq!(config.click_config(), ClickConfig::default());
        assert_eq!(config.snapshot_dir, PathBuf::from("target/screenshots"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = SessionConfig::from_yaml_str("wait_timeout_secs: 5\npoll_interval_ms: 100\n").unwrap();
        assert_eq!(config.wait_timeout_secs, 5);
        assert_eq!(
            config.wait_spec().poll_interval(),
            Duration::from_millis(100)
        );
        assert_eq!(config.settle_timeout_secs, 45);
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let err = SessionConfig::from_yaml_str("wait_timeout: 5\n").unwrap_err();
        assert!(matches!(err, FirmeError::Config { .. }));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = SessionConfig::new()
            .with_activity_probe("return 0")
            .with_reload_on_stall(false);
        let yaml = config.to_yaml().unwrap();
        assert_eq!(SessionConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "settle_timeout_secs: 10").unwrap();
        let config = SessionConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.settle_timeout_secs, 10);
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = SessionConfig::from_yaml_file("/nonexistent/firme.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/firme.yaml"));
    }
}
