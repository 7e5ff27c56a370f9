//! Activity settling: wait for in-flight asynchronous page work to drain.
//!
//! A probe script reports how many async units (by default jQuery AJAX
//! requests) are still running. A page without the probed framework makes
//! the probe throw; that counts as quiescent.
//!
//! ## Toyota Way Application
//!
//! - **Jidoka**: A persistent stall stops the line with `SettleTimeout`
//! - **Kaizen**: One reload absorbs the transient network hiccup first

use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error};

use crate::driver::{Navigation, WebDriver};
use crate::result::{FirmeError, FirmeResult};

/// Default per-attempt settle timeout (45 seconds)
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(45);

/// Default time between probe calls
pub const DEFAULT_SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default quiescence probe
pub const DEFAULT_ACTIVITY_PROBE: &str = "return jQuery.active";

/// Settle behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleConfig {
    /// Budget of one poll attempt
    pub timeout: Duration,
    /// Time between probe calls
    pub poll_interval: Duration,
    /// Script returning the number of in-flight async units
    pub probe: String,
    /// Reload the page and poll again after the first timeout
    pub reload_on_stall: bool,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SETTLE_TIMEOUT,
            poll_interval: DEFAULT_SETTLE_POLL_INTERVAL,
            probe: DEFAULT_ACTIVITY_PROBE.to_string(),
            reload_on_stall: true,
        }
    }
}

impl SettleConfig {
    /// Set the per-attempt timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the probe poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the probe script
    #[must_use]
    pub fn with_probe(mut self, probe: impl Into<String>) -> Self {
        self.probe = probe.into();
        self
    }

    /// Enable or disable the reload escalation
    #[must_use]
    pub const fn with_reload_on_stall(mut self, reload: bool) -> Self {
        self.reload_on_stall = reload;
        self
    }
}

/// One probe reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Nothing in flight (or nothing to probe)
    Quiescent,
    /// This many units still in flight
    Busy(u64),
}

impl Activity {
    /// Interpret a probe result: a positive count (number or numeric
    /// string) is busy, anything else is quiescent
    #[must_use]
    pub fn from_probe(value: &Value) -> Self {
        let count = match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f.ceil() as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        match count {
            Some(n) if n > 0 => Self::Busy(n),
            _ => Self::Quiescent,
        }
    }

    /// Whether nothing is in flight
    #[must_use]
    pub const fn is_quiescent(self) -> bool {
        matches!(self, Self::Quiescent)
    }
}

/// Result of a successful settle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleReport {
    /// Total time spent, reload included
    pub elapsed: Duration,
    /// Whether the reload escalation was needed
    pub reloaded: bool,
}

/// Waits for page activity to quiesce, reloading once on a stall
#[derive(Debug)]
pub struct ActivitySettler<'d, D: WebDriver> {
    driver: &'d D,
    config: SettleConfig,
}

impl<'d, D: WebDriver> ActivitySettler<'d, D> {
    /// Settler over a driver
    #[must_use]
    pub const fn new(driver: &'d D, config: SettleConfig) -> Self {
        Self { driver, config }
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &SettleConfig {
        &self.config
    }

    /// Read the probe once. Probe failures mean "nothing to wait for",
    /// except a dead session, which propagates.
    pub async fn sample(&self) -> FirmeResult<Activity> {
        match self.driver.execute_script(&self.config.probe).await {
            Ok(value) => Ok(Activity::from_probe(&value)),
            Err(e) if e.is_session_failure() => Err(e.into()),
            Err(e) => {
                debug!(error = %e, "activity probe unavailable, treating page as quiescent");
                Ok(Activity::Quiescent)
            }
        }
    }

    async fn attempt(&self) -> FirmeResult<bool> {
        let deadline = Instant::now() + self.config.timeout;
        loop {
            let activity = self.sample().await?;
            if activity.is_quiescent() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(?activity, "activity still pending at deadline");
                return Ok(false);
            }
            sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    /// Wait until the probe reports quiescence.
    ///
    /// On the first timeout the page is reloaded and the poll repeated once
    /// with the same budget; a second timeout fails with
    /// [`FirmeError::SettleTimeout`].
    pub async fn settle(&self) -> FirmeResult<SettleReport> {
        let started = Instant::now();
        if self.attempt().await? {
            return Ok(SettleReport {
                elapsed: started.elapsed(),
                reloaded: false,
            });
        }

        let timeout_ms = self.config.timeout.as_millis() as u64;
        if !self.config.reload_on_stall {
            error!(timeout_ms, "page activity did not settle");
            return Err(FirmeError::SettleTimeout {
                timeout: self.config.timeout,
                attempts: 1,
            });
        }

        error!(timeout_ms, "page activity did not settle, reloading page");
        self.driver.navigate(Navigation::Refresh).await?;
        if self.attempt().await? {
            return Ok(SettleReport {
                elapsed: started.elapsed(),
                reloaded: true,
            });
        }

        error!(timeout_ms, "page activity still pending after reload");
        Err(FirmeError::SettleTimeout {
            timeout: self.config.timeout,
            attempts: 2,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, ScriptResponse};
    use crate::result::DriverError;
    use serde_json::json;

    fn config() -> SettleConfig {
        SettleConfig::default().with_timeout(Duration::from_secs(10))
    }

    mod activity_tests {
        use super::*;

        #[test]
        fn test_from_probe() {
            assert_eq!(Activity::from_probe(&json!(0)), Activity::Quiescent);
            assert_eq!(Activity::from_probe(&json!(2)), Activity::Busy(2));
            assert_eq!(Activity::from_probe(&json!("3")), Activity::Busy(3));
            assert_eq!(Activity::from_probe(&json!(1.5)), Activity::Busy(2));
            assert_eq!(Activity::from_probe(&Value::Null), Activity::Quiescent);
            assert_eq!(Activity::from_probe(&json!(-1)), Activity::Quiescent);
            assert_eq!(Activity::from_probe(&json!("n/a")), Activity::Quiescent);
        }

        #[test]
        fn test_default_config() {
            let config = SettleConfig::default();
            assert_eq!(config.timeout, Duration::from_secs(45));
            assert_eq!(config.probe, "return jQuery.active");
            assert!(config.reload_on_stall);
        }
    }

    mod settle_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_quiescent_page_settles_immediately() {
            let driver = MockDriver::new();
            driver.on_script("jQuery.active", ScriptResponse::value(0));
            let report = ActivitySettler::new(&driver, config()).settle().await.unwrap();
            assert!(!report.reloaded);
            assert_eq!(report.elapsed, Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_framework_counts_as_quiescent() {
            let driver = MockDriver::new();
            driver.on_script(
                "jQuery.active",
                ScriptResponse::error(DriverError::script("jQuery is not defined")),
            );
            let report = ActivitySettler::new(&driver, config()).settle().await.unwrap();
            assert!(!report.reloaded);
            assert_eq!(driver.reloads(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_busy_then_quiet_without_reload() {
            let driver = MockDriver::new();
            driver.on_script(
                "jQuery.active",
                ScriptResponse::dynamic(|ctx| {
                    Ok(json!(if ctx.elapsed < Duration::from_secs(3) { 2 } else { 0 }))
                }),
            );
            let report = ActivitySettler::new(&driver, config()).settle().await.unwrap();
            assert!(!report.reloaded);
            assert!(report.elapsed >= Duration::from_secs(3));
        }

        #[tokio::test(start_paused = true)]
        async fn test_stall_cleared_by_reload() {
            let driver = MockDriver::new();
            driver.on_script(
                "jQuery.active",
                ScriptResponse::dynamic(|ctx| Ok(json!(if ctx.reloads == 0 { 1 } else { 0 }))),
            );
            let report = ActivitySettler::new(&driver, config()).settle().await.unwrap();
            assert!(report.reloaded);
            assert_eq!(driver.reloads(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_two_timeouts_fail_after_exactly_one_reload() {
            let driver = MockDriver::new();
            driver.on_script("jQuery.active", ScriptResponse::value(4));
            let err = ActivitySettler::new(&driver, config()).settle().await.unwrap_err();
            assert!(matches!(err, FirmeError::SettleTimeout { attempts: 2, .. }));
            assert_eq!(driver.reloads(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_reload_disabled() {
            let driver = MockDriver::new();
            driver.on_script("jQuery.active", ScriptResponse::value(4));
            let settler =
                ActivitySettler::new(&driver, config().with_reload_on_stall(false));
            let err = settler.settle().await.unwrap_err();
            assert!(matches!(err, FirmeError::SettleTimeout { attempts: 1, .. }));
            assert_eq!(driver.reloads(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_dead_session_propagates() {
            let driver = MockDriver::new();
            driver.on_script(
                "jQuery.active",
                ScriptResponse::error(DriverError::session("browser crashed")),
            );
            let err = ActivitySettler::new(&driver, config()).settle().await.unwrap_err();
            assert!(matches!(err, FirmeError::Driver(DriverError::Session { .. })));
        }
    }
}
