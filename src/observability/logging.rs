//! # Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` wins when set,
//! otherwise the configured level applies to the whole process.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Subscriber output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    /// Anything but `text` selects JSON
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("text") {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    }
}

/// Filter directive for a level name such as `INFO` or `debug`
#[must_use]
pub fn filter_directive(level: &str) -> String {
    match level.trim().to_lowercase().as_str() {
        level @ ("error" | "warn" | "info" | "debug" | "trace") => level.to_string(),
        "warning" => "warn".to_string(),
        _ => "info".to_string(),
    }
}

/// Install the subscriber. Call once at startup.
///
/// # Errors
/// Returns an error if a global subscriber is already installed
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
