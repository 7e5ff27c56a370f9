//! Firme CLI
//!
//! ## Usage
//!
//! ```bash
//! firme locate "css=#submit" "//div[@id='x']"      # Explain locators
//! firme locate --json "link=Sign in"              # JSON lines
//! firme sanitize dom.html --base-url https://app.test/ -o snap.html
//! firme config --config firme.yaml                # Effective settings
//! ```

use clap::Parser;
use firme_cli::{handlers, logging, Cli, CliConfig, CliResult, ColorChoice, Commands, Reporter, Verbosity};
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    let use_color = config.color.should_color();
    logging::init(config.verbosity, use_color);

    let reporter = Reporter::new(use_color, config.verbosity.is_quiet());
    match run(cli.command, &reporter, use_color) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            reporter.failure(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
}

fn run(command: Commands, reporter: &Reporter, use_color: bool) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match command {
        Commands::Locate(args) => handlers::locate(&args, use_color, &mut out),
        Commands::Sanitize(args) => handlers::sanitize(&args, reporter, &mut out),
        Commands::Config(args) => handlers::config(&args, &mut out),
    }
}
