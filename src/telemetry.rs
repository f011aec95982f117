//! Logging initialization
//!
//! Structured logging with tracing: a compact console layer for
//! development, an optional non-blocking file layer, and JSON output for
//! log aggregation.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Telemetry configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Default filter when no environment variable is set
    pub default_level: Option<String>,
    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
    /// Emit JSON instead of the compact console format
    pub json: bool,
}

/// Initialize the tracing subscriber
///
/// Filter precedence: `VISION_LOG`, then `RUST_LOG`, then the configured
/// default (falling back to `info`). `VISION_LOG_FORMAT=json` switches
/// the console to JSON regardless of the config. The returned guard must
/// stay alive for the program's lifetime when file logging is on, so
/// buffered lines are flushed on exit.
pub fn init(config: &TelemetryConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let default_level = config.default_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_env("VISION_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let json = config.json
        || std::env::var("VISION_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let mut guard = None;

    match &config.log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            let (writer, file_guard) = tracing_appender::non_blocking(file);
            guard = Some(file_guard);
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            if json {
                registry
                    .with(file_layer)
                    .with(fmt::layer().json().with_target(true))
                    .init();
            } else {
                registry
                    .with(file_layer)
                    .with(fmt::layer().compact().with_target(true))
                    .init();
            }
        }
        None => {
            if json {
                registry.with(fmt::layer().json().with_target(true)).init();
            } else {
                registry
                    .with(fmt::layer().compact().with_target(true))
                    .init();
            }
        }
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), json, "telemetry ready");
    Ok(guard)
}

/// Initialize with defaults; suitable for binaries and examples
pub fn init_default() -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    init(&TelemetryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert!(config.default_level.is_none());
        assert!(config.log_file.is_none());
        assert!(!config.json);
    }
}
