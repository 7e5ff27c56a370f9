//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Firme: robust element lookup, waiting and failure snapshots for browser tests
#[derive(Parser, Debug)]
#[command(name = "firme")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Explain how locator strings are interpreted
    Locate(LocateArgs),

    /// Turn a saved DOM into a self-contained diagnostic snapshot
    Sanitize(SanitizeArgs),

    /// Show the effective session configuration
    Config(ConfigArgs),
}

/// Arguments for the locate command
#[derive(Parser, Debug)]
pub struct LocateArgs {
    /// Locator strings (e.g. "css=#submit", "//div", "link=Sign in")
    #[arg(required = true)]
    pub locators: Vec<String>,

    /// Print one JSON object per locator
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the sanitize command
#[derive(Parser, Debug)]
pub struct SanitizeArgs {
    /// Saved DOM (HTML) file
    pub input: PathBuf,

    /// URL the page was loaded from; becomes the snapshot's `<base href>`
    #[arg(long)]
    pub base_url: String,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// YAML session configuration to load (defaults otherwise)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::ColorChoice;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_verify_cli() {
            use clap::CommandFactory;
            Cli::command().debug_assert();
        }

        #[test]
        fn test_locate_many() {
            let cli = Cli::parse_from(["firme", "locate", "#a", "xpath=//b", "--json"]);
            match cli.command {
                Commands::Locate(args) => {
                    assert_eq!(args.locators, vec!["#a", "xpath=//b"]);
                    assert!(args.json);
                }
                other => panic!("expected locate, got {other:?}"),
            }
        }

        #[test]
        fn test_locate_requires_a_locator() {
            assert!(Cli::try_parse_from(["firme", "locate"]).is_err());
        }

        #[test]
        fn test_sanitize_args() {
            let cli = Cli::parse_from([
                "firme",
                "sanitize",
                "dom.html",
                "--base-url",
                "https://shop.test/",
                "-o",
                "out.html",
            ]);
            match cli.command {
                Commands::Sanitize(args) => {
                    assert_eq!(args.input, PathBuf::from("dom.html"));
                    assert_eq!(args.base_url, "https://shop.test/");
                    assert_eq!(args.output, Some(PathBuf::from("out.html")));
                }
                other => panic!("expected sanitize, got {other:?}"),
            }
        }

        #[test]
        fn test_sanitize_requires_base_url() {
            assert!(Cli::try_parse_from(["firme", "sanitize", "dom.html"]).is_err());
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let cli = Cli::parse_from(["firme", "config", "-vv", "--color", "never"]);
            assert_eq!(cli.verbose, 2);
            assert_eq!(ColorChoice::from(cli.color), ColorChoice::Never);
        }
    }
}
