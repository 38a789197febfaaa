//! Tracing subscriber setup: human-readable stderr output plus an optional daily
//! rolling JSON log file.

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::DriftError;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

/// Install the global subscriber: human-readable stderr output, plus daily-rotated
/// JSON files when enabled. `RUST_LOG` overrides the configured level.
///
/// Calling this again after a subscriber is installed is a no-op.
pub fn init_tracing(config: &LogConfig) -> Result<(), DriftError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // stdout carries NDJSON output from the CLI, so logs go to stderr
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    let registry = Registry::default().with(env_filter).with(stderr_layer);

    let result = if config.enable_file_logs {
        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("drift")
            .filename_suffix("log")
            .max_log_files(14)
            .build(&config.log_dir)
            .map_err(|e| DriftError::InvalidConfig(format!("log dir {}: {e}", config.log_dir)))?;
        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .json();
        registry.with(file_layer).try_init()
    } else {
        registry.try_init()
    };

    // Already installed (tests, repeated CLI setup) is fine
    if let Err(e) = result {
        let msg = e.to_string();
        if !msg.contains("already been set") {
            return Err(DriftError::InvalidConfig(format!("tracing init: {msg}")));
        }
    }
    Ok(())
}
