//! Logging initialization and configuration.
//!
//! Logs go to stderr so they never interleave with teed stdout.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a level is configured.
pub const DEFAULT_FILTER: &str = "shell_cmd=info";

fn filter_from_env() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the logging system.
///
/// Uses the `RUST_LOG` environment variable for filtering. If not set,
/// defaults to `shell_cmd=info`.
///
/// # Panics
///
/// Panics if a tracing subscriber has already been set.
pub fn init() {
    tracing_subscriber::registry()
        .with(filter_from_env())
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Err` if logging has already been initialized.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter_from_env())
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
}

/// Initialize with an explicit filter such as `debug` or `shell_cmd=trace`.
///
/// Bare levels apply to this crate only. Invalid filters fall back to the
/// default.
pub fn try_init_with_filter(filter: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let directive = if is_bare_level(filter) {
        format!("shell_cmd={filter}")
    } else {
        filter.to_string()
    };
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
}

fn is_bare_level(filter: &str) -> bool {
    matches!(
        filter.to_ascii_lowercase().as_str(),
        "error" | "warn" | "info" | "debug" | "trace" | "off"
    )
}
