//! Runtime configuration read from `DRIFT_*` environment variables
//!
//! Unparsable values fall back to the default with a warning; `validate` rejects
//! combinations the pipeline cannot run with.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::controller::ControllerConfig;
use crate::error::DriftError;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::logging::LogConfig;
use crate::sensor::SensorConfig;

/// Runtime settings, read from `DRIFT_*` environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct DriftConfig {
    /// Period of the analysis alarm
    pub alarm_interval_secs: u64,
    pub sensor_flush_secs: u64,
    pub sensor_initial_delay_secs: u64,
    pub window_size: usize,
    pub history_capacity: usize,
    pub predict_timeout_ms: u64,
    pub intervention_cooldown_ticks: u32,
    pub skip_when_away: bool,
    pub store_path: String,
    /// Weights file for the windowed model; the rule scorer is used when unset
    pub model_path: Option<PathBuf>,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            alarm_interval_secs: 60,
            sensor_flush_secs: 30,
            sensor_initial_delay_secs: 5,
            window_size: 10,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            predict_timeout_ms: 5000,
            intervention_cooldown_ticks: 0,
            skip_when_away: true,
            store_path: "./data/drift.sled".to_string(),
            model_path: None,
            log_level: "info".to_string(),
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

impl DriftConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            alarm_interval_secs: env_or_parse("DRIFT_ALARM_INTERVAL_SECS", defaults.alarm_interval_secs),
            sensor_flush_secs: env_or_parse("DRIFT_SENSOR_FLUSH_SECS", defaults.sensor_flush_secs),
            sensor_initial_delay_secs: env_or_parse(
                "DRIFT_SENSOR_INITIAL_DELAY_SECS",
                defaults.sensor_initial_delay_secs,
            ),
            window_size: env_or_parse("DRIFT_WINDOW_SIZE", defaults.window_size),
            history_capacity: env_or_parse("DRIFT_HISTORY_CAPACITY", defaults.history_capacity),
            predict_timeout_ms: env_or_parse("DRIFT_PREDICT_TIMEOUT_MS", defaults.predict_timeout_ms),
            intervention_cooldown_ticks: env_or_parse(
                "DRIFT_INTERVENTION_COOLDOWN_TICKS",
                defaults.intervention_cooldown_ticks,
            ),
            skip_when_away: env_or_bool("DRIFT_SKIP_WHEN_AWAY", defaults.skip_when_away),
            store_path: env_or("DRIFT_STORE_PATH", &defaults.store_path),
            model_path: env::var("DRIFT_MODEL_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            log_level: env_or("RUST_LOG", &defaults.log_level),
            enable_file_logs: env_or_bool("DRIFT_ENABLE_FILE_LOGS", defaults.enable_file_logs),
            log_dir: env_or("DRIFT_LOG_DIR", &defaults.log_dir),
        }
    }

    /// Reject settings that would stall the pipeline
    pub fn validate(&self) -> Result<(), DriftError> {
        let checks: [(&str, bool); 5] = [
            ("DRIFT_ALARM_INTERVAL_SECS", self.alarm_interval_secs > 0),
            ("DRIFT_SENSOR_FLUSH_SECS", self.sensor_flush_secs > 0),
            ("DRIFT_WINDOW_SIZE", self.window_size > 0),
            ("DRIFT_HISTORY_CAPACITY", self.history_capacity > 0),
            ("DRIFT_PREDICT_TIMEOUT_MS", self.predict_timeout_ms > 0),
        ];
        for (key, ok) in checks {
            if !ok {
                return Err(DriftError::InvalidConfig(format!("{key} must be greater than 0")));
            }
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.alarm_interval_secs)
    }

    pub fn predict_timeout(&self) -> Duration {
        Duration::from_millis(self.predict_timeout_ms)
    }

    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            window_size: self.window_size,
            intervention_cooldown_ticks: self.intervention_cooldown_ticks,
            skip_when_away: self.skip_when_away,
        }
    }

    pub fn sensor(&self) -> SensorConfig {
        SensorConfig {
            flush_interval: Duration::from_secs(self.sensor_flush_secs),
            initial_delay: Duration::from_secs(self.sensor_initial_delay_secs),
        }
    }

    pub fn logging(&self) -> LogConfig {
        LogConfig {
            log_level: self.log_level.clone(),
            enable_file_logs: self.enable_file_logs,
            log_dir: self.log_dir.clone(),
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Failed to parse env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
