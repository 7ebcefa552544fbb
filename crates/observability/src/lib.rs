//! Tracing/logging setup shared by herald binaries and tests.

use serde::{Deserialize, Serialize};

/// Initialize process-wide tracing with the default configuration.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&ObservabilityConfig::default());
}

/// Initialize process-wide tracing with an explicit configuration.
pub fn init_with(config: &ObservabilityConfig) {
    tracing::init(config);
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Plain,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter used when `RUST_LOG` is not set (e.g. `"info"`, `"herald_events=debug"`).
    pub default_filter: String,
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl ObservabilityConfig {
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Tracing configuration (filters, layers).
pub mod tracing;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init_with(&ObservabilityConfig::default().with_format(LogFormat::Plain));
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = ObservabilityConfig::default()
            .with_default_filter("herald_events=debug")
            .with_format(LogFormat::Plain);
        assert_eq!(config.default_filter, "herald_events=debug");
        assert_eq!(config.format, LogFormat::Plain);
        assert_eq!(ObservabilityConfig::default().format, LogFormat::Json);
    }
}
