//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

use crate::{LogFormat, ObservabilityConfig};

/// Initialize tracing/logging for the process.
///
/// `RUST_LOG` wins over `config.default_filter`. Safe to call multiple times
/// (subsequent calls are no-ops).
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let _ = match config.format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Plain => builder.with_target(true).try_init(),
    };
}
