//! Logging setup for the command line
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber
///
/// The filter is read from `RUST_LOG`, e.g. `RUST_LOG=runalloc_core=debug`, and
/// defaults to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();
}
