//! Firme CLI Library
//!
//! Command-line tooling around the Firme library that needs no browser:
//! explaining locator strings, sanitizing saved DOM dumps into diagnostic
//! snapshots, and printing the effective session configuration.

#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, LocateArgs, SanitizeArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{LocatorReport, OutputFormat, Reporter};
