//! Log subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::Verbosity;

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` overrides the level chosen by `-v`/`-q`. Verbose levels also
/// print the emitting module. Installing twice is a no-op.
pub fn init(verbosity: Verbosity, color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity.is_verbose())
        .with_ansi(color)
        .with_writer(std::io::stderr)
        .try_init();
}
