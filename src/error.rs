//! Error types for Drift

use thiserror::Error;

/// Errors that can occur anywhere in the sensing and scoring pipeline.
///
/// None of these are fatal to the background service: the scheduler logs them and
/// keeps ticking.
#[derive(Debug, Error)]
pub enum DriftError {
    #[error("Receiving context unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Scoring engine not ready")]
    EngineNotReady,

    #[error("Scoring engine failed to load: {0}")]
    EngineLoadFailure(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Invalid feature window: expected {expected} vectors, got {actual}")]
    InvalidWindow { expected: usize, actual: usize },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<sled::Error> for DriftError {
    fn from(e: sled::Error) -> Self {
        DriftError::Persistence(e.to_string())
    }
}

impl DriftError {
    /// Whether the error only means "skip this tick" rather than something worth
    /// surfacing at error level.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriftError::EngineNotReady | DriftError::TransportUnavailable(_) | DriftError::Timeout(_)
        )
    }
}
