//! Command handlers. Each writes its result to `out` so tests can capture it.

use firme::{sanitize_snapshot, Locator, SessionConfig};
use std::fs;
use std::io::Write;
use tracing::{debug, info};

use crate::commands::{ConfigArgs, LocateArgs, SanitizeArgs};
use crate::error::CliResult;
use crate::output::{LocatorReport, OutputFormat, Reporter};

/// Explain every locator; stops at the first invalid one
pub fn locate(args: &LocateArgs, use_color: bool, out: &mut impl Write) -> CliResult<()> {
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    for raw in &args.locators {
        let locator = Locator::parse(raw)?;
        debug!(input = %raw, locator = %locator, "parsed");
        let report = LocatorReport::new(raw, &locator);
        match format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&report)?)?,
            OutputFormat::Text => write!(out, "{}", report.render_text(use_color))?,
        }
    }
    Ok(())
}

/// Sanitize a saved DOM; writes to `--output` or `out`
pub fn sanitize(args: &SanitizeArgs, reporter: &Reporter, out: &mut impl Write) -> CliResult<()> {
    let html = fs::read_to_string(&args.input)?;
    let snapshot = sanitize_snapshot(&html, &args.base_url);
    info!(input = %args.input.display(), bytes = snapshot.len(), "sanitized");
    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, snapshot)?;
            reporter.success(&format!("snapshot written to {}", path.display()));
        }
        None => out.write_all(snapshot.as_bytes())?,
    }
    Ok(())
}

/// Print the effective session configuration as YAML
pub fn config(args: &ConfigArgs, out: &mut impl Write) -> CliResult<()> {
    let config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading session configuration");
            SessionConfig::from_yaml_file(path)?
        }
        None => SessionConfig::default(),
    };
    write!(out, "{}", config.to_yaml()?)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use std::path::PathBuf;

    fn quiet_reporter() -> Reporter {
        Reporter::new(false, true)
    }

    mod locate_tests {
        use super::*;

        fn run(locators: &[&str], json: bool) -> CliResult<String> {
            let args = LocateArgs {
                locators: locators.iter().map(|s| (*s).to_string()).collect(),
                json,
            };
            let mut out = Vec::new();
            locate(&args, false, &mut out)?;
            Ok(String::from_utf8(out).unwrap())
        }

        #[test]
        fn test_text_output_per_locator() {
            let text = run(&["#submit-btn", "//div[@id='x']"], false).unwrap();
            assert!(text.contains("strategy: css"));
            assert!(text.contains("strategy: xpath"));
            assert!(text.contains("native:   xpath //div[@id='x']"));
        }

        #[test]
        fn test_json_lines() {
            let text = run(&["name=q", "tag=body"], true).unwrap();
            let lines: Vec<serde_json::Value> = text
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect();
            assert_eq!(lines.len(), 2);
            assert_eq!(lines[0]["native"]["query"], "[name=\"q\"]");
            assert_eq!(lines[1]["strategy"], "tag");
        }

        #[test]
        fn test_invalid_locator_fails() {
            let err = run(&["css="], false).unwrap_err();
            assert!(matches!(err, CliError::Firme(_)));
        }
    }

    mod sanitize_tests {
        use super::*;

        #[test]
        fn test_sanitize_to_stdout() {
            let dir = tempfile::tempdir().unwrap();
            let input = dir.path().join("dom.html");
            fs::write(&input, "<html><head></head><body><script>x()</script></body></html>")
                .unwrap();
            let args = SanitizeArgs {
                input,
                base_url: "https://shop.test/".to_string(),
                output: None,
            };

            let mut out = Vec::new();
            sanitize(&args, &quiet_reporter(), &mut out).unwrap();
            let html = String::from_utf8(out).unwrap();
            assert!(html.contains("<base href=\"https://shop.test/\"/>"));
            assert!(html.contains("Disabled to preserve page integrity"));
        }

        #[test]
        fn test_sanitize_to_nested_file() {
            let dir = tempfile::tempdir().unwrap();
            let input = dir.path().join("dom.html");
            fs::write(&input, "<body>plain</body>").unwrap();
            let output = dir.path().join("reports/snap.html");
            let args = SanitizeArgs {
                input,
                base_url: "https://shop.test/".to_string(),
                output: Some(output.clone()),
            };

            let mut out = Vec::new();
            sanitize(&args, &quiet_reporter(), &mut out).unwrap();
            assert!(out.is_empty());
            assert!(fs::read_to_string(output).unwrap().contains("plain"));
        }

        #[test]
        fn test_missing_input_is_io_error() {
            let args = SanitizeArgs {
                input: PathBuf::from("/nonexistent/dom.html"),
                base_url: "https://shop.test/".to_string(),
                output: None,
            };
            let err = sanitize(&args, &quiet_reporter(), &mut Vec::new()).unwrap_err();
            assert!(matches!(err, CliError::Io(_)));
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let mut out = Vec::new();
            config(&ConfigArgs { config: None }, &mut out).unwrap();
            let yaml = String::from_utf8(out).unwrap();
            assert!(yaml.contains("wait_timeout_secs: 30"));
            assert!(yaml.contains("jQuery.active"));
        }

        #[test]
        fn test_file_overrides() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("firme.yaml");
            fs::write(&path, "wait_timeout_secs: 7\nreload_on_stall: false\n").unwrap();

            let mut out = Vec::new();
            config(&ConfigArgs { config: Some(path) }, &mut out).unwrap();
            let yaml = String::from_utf8(out).unwrap();
            assert!(yaml.contains("wait_timeout_secs: 7"));
            assert!(yaml.contains("reload_on_stall: false"));
        }

        #[test]
        fn test_unknown_key_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("firme.yaml");
            fs::write(&path, "timeout: 7\n").unwrap();

            let err = config(&ConfigArgs { config: Some(path) }, &mut Vec::new()).unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
            assert!(err.to_string().contains("firme.yaml"));
        }
    }
}
