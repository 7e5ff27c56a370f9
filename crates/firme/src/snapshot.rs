//! Failure diagnostics: persist the live DOM as an inert HTML snapshot.
//!
//! The snapshot is the client-side DOM at the moment of failure, not the
//! server response. Script blocks are commented out rather than removed so
//! the file still shows what ran, and a `<base>` tag points relative links
//! at the original page so the snapshot renders with its styles when opened
//! later.
//!
//! ## Toyota Way Application
//!
//! - **Genchi Genbutsu**: Look at the page the test actually saw
//! - **Jidoka**: A capture without a cause is a bug and fails immediately

use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::error;

use crate::driver::WebDriver;
use crate::result::{FirmeError, FirmeResult};

/// Default snapshot directory
pub const DEFAULT_SNAPSHOT_DIR: &str = "target/screenshots";

const DOM_SCRIPT: &str = "return document.documentElement.innerHTML;";

const DISABLED_SCRIPT_PREFIX: &str = "\n<!-- Disabled to preserve page integrity ";

/// Where snapshots are written
pub trait SnapshotStore: Send + Sync {
    /// Write `contents` to `path`, creating parent directories as needed
    fn write_text(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Filesystem-backed [`SnapshotStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSnapshotStore;

impl SnapshotStore for FsSnapshotStore {
    fn write_text(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }
}

fn script_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("hardcoded regex"))
}

fn head_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<head(\s[^>]*)?>").expect("hardcoded regex"))
}

fn html_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<html(\s[^>]*)?>").expect("hardcoded regex"))
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Make captured HTML inert and self-locating.
///
/// Every `<script>` block becomes an HTML comment (`--` inside it is split
/// so the comment cannot close early) and `<base href="base_url"/>` is
/// inserted right after the opening `<head>` tag, creating the head when
/// the document has none.
#[must_use]
pub fn sanitize_snapshot(html: &str, base_url: &str) -> String {
    let disabled = script_block().replace_all(html, |caps: &regex::Captures<'_>| {
        let mut block = caps[0].to_string();
        while block.contains("--") {
            block = block.replace("--", "- -");
        }
        format!("{DISABLED_SCRIPT_PREFIX}{block} -->")
    });

    let base = format!("<base href=\"{}\"/>", escape_attribute(base_url));
    if let Some(head) = head_open().find(&disabled) {
        let mut out = String::with_capacity(disabled.len() + base.len());
        out.push_str(&disabled[..head.end()]);
        out.push_str(&base);
        out.push_str(&disabled[head.end()..]);
        return out;
    }
    let head = format!("<head>{base}</head>");
    match html_open().find(&disabled) {
        Some(open) => format!(
            "{}{head}{}",
            &disabled[..open.end()],
            &disabled[open.end()..]
        ),
        None => format!("{head}{disabled}"),
    }
}

/// `<label>-<millis>-failure-report-snapshot.html`, with the label reduced
/// to characters safe in any file system
#[must_use]
pub fn snapshot_file_name(label: &str, epoch_millis: i64) -> String {
    let safe: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.is_empty() { "snapshot".to_string() } else { safe };
    format!("{safe}-{epoch_millis}-failure-report-snapshot.html")
}

/// Captures DOM snapshots when a test fails
#[derive(Debug, Clone)]
pub struct DiagnosticCapture<S = FsSnapshotStore> {
    store: S,
    directory: PathBuf,
}

impl DiagnosticCapture<FsSnapshotStore> {
    /// Capture to a directory on disk
    #[must_use]
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self::new(FsSnapshotStore, directory)
    }
}

impl<S: SnapshotStore> DiagnosticCapture<S> {
    /// Capture through a custom store
    #[must_use]
    pub fn new(store: S, directory: impl Into<PathBuf>) -> Self {
        Self {
            store,
            directory: directory.into(),
        }
    }

    /// Snapshot directory
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Persist a snapshot of the current DOM.
    ///
    /// Returns the snapshot path, or `Ok(None)` when there is no usable
    /// browser session (nothing to capture). A missing `cause` is a
    /// [`FirmeError::Precondition`]; a write failure is [`FirmeError::Io`].
    pub async fn capture<D: WebDriver>(
        &self,
        driver: Option<&D>,
        label: &str,
        context: Option<&str>,
        cause: Option<&(dyn Error + Send + Sync)>,
    ) -> FirmeResult<Option<PathBuf>> {
        let Some(cause) = cause else {
            return Err(FirmeError::precondition(
                "diagnostic capture requires the failure that triggered it",
            ));
        };
        let Some(driver) = driver else {
            error!(label, cause = %cause, "no browser session, DOM snapshot skipped");
            return Ok(None);
        };

        let dom = match driver.execute_script(DOM_SCRIPT).await {
            Ok(Value::String(dom)) => dom,
            Ok(other) => {
                error!(label, result = %other, "page returned no DOM, snapshot skipped");
                return Ok(None);
            }
            Err(e) => {
                error!(label, error = %e, "could not read DOM, snapshot skipped");
                return Ok(None);
            }
        };
        let base_url = match driver.current_url().await {
            Ok(url) => url,
            Err(e) => {
                error!(label, error = %e, "could not read page URL, snapshot skipped");
                return Ok(None);
            }
        };

        let html = sanitize_snapshot(&format!("<html>{dom}</html>"), &base_url);
        let path = self
            .directory
            .join(snapshot_file_name(label, Utc::now().timestamp_millis()));
        self.store.write_text(&path, &html)?;

        error!(
            path = %path.display(),
            context = context.unwrap_or(""),
            cause = %cause,
            "failure snapshot written"
        );
        Ok(Some(path))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, ScriptResponse};
    use crate::result::DriverError;

    fn cause() -> FirmeError {
        FirmeError::assertion("total should be 3")
    }

    mod sanitize_tests {
        use super::*;

        #[test]
        fn test_scripts_are_commented_not_removed() {
            let html = "<html><head><script src=\"a.js\"></script></head><body>\
                        <SCRIPT type=\"text/javascript\">\nvar x = 1;\n</SCRIPT><p>hi</p></body></html>";
            let out = sanitize_snapshot(html, "https://shop.test/cart");

            assert!(!out.contains("<script src=\"a.js\"></script></head>"));
            assert!(out.contains("<!-- Disabled to preserve page integrity <script src=\"a.js\"></script> -->"));
            assert!(out.contains("var x = 1;"));
            assert!(out.contains("<p>hi</p>"));
            assert_eq!(out.matches("Disabled to preserve page integrity").count(), 2);
        }

        #[test]
        fn test_double_dash_inside_script_is_split() {
            let out = sanitize_snapshot("<head></head><script>i--; // -->\n</script>", "x");
            let comment_start = out.find("<!--").unwrap();
            let body = &out[comment_start + 4..];
            assert_eq!(body.matches("--").count(), 1);
            assert!(body.trim_end().ends_with("-->"));
        }

        #[test]
        fn test_base_injected_after_head() {
            let out = sanitize_snapshot(
                "<html><head lang=\"en\"><title>t</title></head></html>",
                "https://shop.test/a?b=1&c=2",
            );
            assert!(out.contains(
                "<head lang=\"en\"><base href=\"https://shop.test/a?b=1&amp;c=2\"/><title>"
            ));
        }

        #[test]
        fn test_header_tag_is_not_head() {
            let out = sanitize_snapshot("<html><body><header>x</header></body></html>", "u");
            assert!(out.starts_with("<html><head><base href=\"u\"/></head><body><header>"));
        }

        #[test]
        fn test_head_created_without_html_tag() {
            let out = sanitize_snapshot("<p>bare</p>", "u");
            assert_eq!(out, "<head><base href=\"u\"/></head><p>bare</p>");
        }
    }

    mod file_name_tests {
        use super::*;

        #[test]
        fn test_file_name_shape() {
            assert_eq!(
                snapshot_file_name("CheckoutTest.pays", 1_700_000_000_000),
                "CheckoutTest.pays-1700000000000-failure-report-snapshot.html"
            );
        }

        #[test]
        fn test_label_is_made_path_safe() {
            assert_eq!(
                snapshot_file_name("../etc/passwd test", 1),
                ".._etc_passwd_test-1-failure-report-snapshot.html"
            );
            assert!(snapshot_file_name("", 1).starts_with("snapshot-1-"));
        }
    }

    mod capture_tests {
        use super::*;

        fn page_driver() -> MockDriver {
            let driver = MockDriver::new();
            driver.set_url("https://shop.test/cart");
            driver.on_script(
                "documentElement.innerHTML",
                ScriptResponse::value("<head></head><body><script>track()</script>Cart</body>"),
            );
            driver
        }

        #[tokio::test]
        async fn test_capture_writes_sanitized_snapshot() {
            let dir = tempfile::tempdir().unwrap();
            let capture = DiagnosticCapture::in_directory(dir.path().join("shots"));
            let driver = page_driver();
            let cause = cause();

            let path = capture
                .capture(Some(&driver), "CartTest", Some("after checkout"), Some(&cause))
                .await
                .unwrap()
                .unwrap();

            let name = path.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with("CartTest-"));
            assert!(name.ends_with("-failure-report-snapshot.html"));
            let html = std::fs::read_to_string(&path).unwrap();
            assert!(html.starts_with("<html><head><base href=\"https://shop.test/cart\"/>"));
            assert!(html.contains("<!-- Disabled to preserve page integrity <script>track()</script> -->"));
        }

        #[tokio::test]
        async fn test_missing_cause_is_precondition_error() {
            let dir = tempfile::tempdir().unwrap();
            let capture = DiagnosticCapture::in_directory(dir.path());
            let driver = page_driver();

            let err = capture
                .capture(Some(&driver), "CartTest", None, None)
                .await
                .unwrap_err();
            assert!(matches!(err, FirmeError::Precondition { .. }));
        }

        #[tokio::test]
        async fn test_no_driver_is_noop() {
            let dir = tempfile::tempdir().unwrap();
            let capture = DiagnosticCapture::in_directory(dir.path().join("shots"));
            let cause = cause();

            let written = capture
                .capture::<MockDriver>(None, "CartTest", None, Some(&cause))
                .await
                .unwrap();
            assert!(written.is_none());
            assert!(!dir.path().join("shots").exists());
        }

        #[tokio::test]
        async fn test_dead_session_is_noop() {
            let dir = tempfile::tempdir().unwrap();
            let capture = DiagnosticCapture::in_directory(dir.path());
            let driver = MockDriver::new();
            driver.on_script(
                "innerHTML",
                ScriptResponse::error(DriverError::session("browser gone")),
            );
            let cause = cause();

            let written = capture
                .capture(Some(&driver), "CartTest", None, Some(&cause))
                .await
                .unwrap();
            assert!(written.is_none());
        }

        #[tokio::test]
        async fn test_write_failure_is_io_error() {
            struct ReadOnly;
            impl SnapshotStore for ReadOnly {
                fn write_text(&self, _: &Path, _: &str) -> io::Result<()> {
                    Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
                }
            }

            let capture = DiagnosticCapture::new(ReadOnly, "shots");
            let driver = page_driver();
            let cause = cause();

            let err = capture
                .capture(Some(&driver), "CartTest", None, Some(&cause))
                .await
                .unwrap_err();
            assert!(matches!(err, FirmeError::Io(_)));
        }
    }
}
