//! Scoring engine
//!
//! The engine maps a full feature window to a distraction score. It is an opaque
//! backend behind two traits: a [`ModelLoader`] that produces a [`Predictor`], and the
//! predictor itself. [`ScoringEngine`] wraps them in the load state machine:
//!
//! ```text
//! NotLoaded --begin_load--> Loading --finish_load(Ok)--> Ready
//!                              \------finish_load(Err)--> Failed --begin_load--> Loading
//! ```
//!
//! Predictions outside `Ready` fail fast with [`DriftError::EngineNotReady`].

pub mod mock;
pub mod rule;
pub mod sequence;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::error::DriftError;
use crate::protocol::StatusResponse;
use crate::types::{clamp_score, ActivityFlags, FeatureVector};

pub use rule::{RuleLoader, RuleScorer, RuleWeights};
pub use sequence::{FileModelLoader, ModelSpec, WindowedLinearModel};

/// Maps a window of feature vectors to a raw distraction score
pub trait Predictor: Send + Sync {
    /// Identifier reported in `MODEL_READY`
    fn version(&self) -> &str;

    fn predict(&self, window: &[FeatureVector]) -> Result<f64, DriftError>;

    /// Score with the newest sample's flags available; most predictors ignore them.
    fn predict_with_flags(
        &self,
        window: &[FeatureVector],
        _flags: ActivityFlags,
    ) -> Result<f64, DriftError> {
        self.predict(window)
    }
}

/// Produces a predictor; may block (file reads, weight parsing)
pub trait ModelLoader: Send + Sync {
    /// Human-readable description of what is being loaded
    fn describe(&self) -> String;

    fn load(&self) -> Result<Box<dyn Predictor>, DriftError>;
}

/// The windowed model when a weights file is given, the rule scorer otherwise
pub fn select_loader(model_path: Option<&Path>) -> Arc<dyn ModelLoader> {
    match model_path {
        Some(path) => Arc::new(FileModelLoader::new(path)),
        None => Arc::new(RuleLoader::default()),
    }
}

/// Engine lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum EngineStatus {
    NotLoaded,
    Loading,
    Ready,
    Failed(String),
}

/// Outcome of asking the engine to start loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDecision {
    /// The caller should now run the loader and report back via `finish_load`
    Started,
    AlreadyLoading,
    AlreadyReady,
}

/// Load state machine around a predictor
pub struct ScoringEngine {
    status: EngineStatus,
    predictor: Option<Box<dyn Predictor>>,
    window_size: usize,
}

impl ScoringEngine {
    /// Create an unloaded engine that accepts windows of exactly `window_size` vectors
    pub fn new(window_size: usize) -> Self {
        Self {
            status: EngineStatus::NotLoaded,
            predictor: None,
            window_size,
        }
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn is_ready(&self) -> bool {
        self.status == EngineStatus::Ready
    }

    /// Read-only status snapshot; never changes state
    pub fn check_status(&self) -> StatusResponse {
        StatusResponse {
            is_ready: self.status == EngineStatus::Ready,
            is_loading: self.status == EngineStatus::Loading,
        }
    }

    /// Move into `Loading` unless a load is running or already succeeded.
    ///
    /// A failed engine may be loaded again; there is no automatic retry.
    pub fn begin_load(&mut self) -> LoadDecision {
        match self.status {
            EngineStatus::Loading => LoadDecision::AlreadyLoading,
            EngineStatus::Ready => LoadDecision::AlreadyReady,
            EngineStatus::NotLoaded | EngineStatus::Failed(_) => {
                self.status = EngineStatus::Loading;
                LoadDecision::Started
            }
        }
    }

    /// Complete a load started with [`begin_load`](Self::begin_load).
    ///
    /// Returns the model version on success or the failure message.
    pub fn finish_load(
        &mut self,
        result: Result<Box<dyn Predictor>, DriftError>,
    ) -> Result<String, String> {
        match result {
            Ok(predictor) => {
                let version = predictor.version().to_string();
                self.predictor = Some(predictor);
                self.status = EngineStatus::Ready;
                Ok(version)
            }
            Err(e) => {
                let message = e.to_string();
                self.predictor = None;
                self.status = EngineStatus::Failed(message.clone());
                Err(message)
            }
        }
    }

    /// Begin and finish a load on the current thread
    pub fn load_with(&mut self, loader: &dyn ModelLoader) -> Result<String, DriftError> {
        match self.begin_load() {
            LoadDecision::AlreadyReady => Ok(self.version().unwrap_or_default().to_string()),
            LoadDecision::AlreadyLoading => Err(DriftError::EngineNotReady),
            LoadDecision::Started => self
                .finish_load(loader.load())
                .map_err(DriftError::EngineLoadFailure),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.predictor.as_deref().map(|p| p.version())
    }

    /// Score a window of exactly `window_size` vectors; the result is clamped to 0-1.
    pub fn predict(&self, window: &[FeatureVector]) -> Result<f64, DriftError> {
        self.predict_with_flags(window, ActivityFlags::default())
    }

    pub fn predict_with_flags(
        &self,
        window: &[FeatureVector],
        flags: ActivityFlags,
    ) -> Result<f64, DriftError> {
        let predictor = match (&self.status, &self.predictor) {
            (EngineStatus::Ready, Some(p)) => p,
            _ => return Err(DriftError::EngineNotReady),
        };

        if window.len() != self.window_size {
            return Err(DriftError::InvalidWindow {
                expected: self.window_size,
                actual: window.len(),
            });
        }

        let raw = predictor.predict_with_flags(window, flags)?;
        if raw.is_nan() {
            return Err(DriftError::Prediction("model returned NaN".to_string()));
        }
        Ok(clamp_score(raw))
    }
}

impl std::fmt::Debug for ScoringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringEngine")
            .field("status", &self.status)
            .field("version", &self.version())
            .field("window_size", &self.window_size)
            .finish()
    }
}
