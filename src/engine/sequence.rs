//! Sequence model over the whole feature window
//!
//! Weights are loaded from a JSON file:
//!
//! ```json
//! { "version": "drift-seq-1", "window_size": 10,
//!   "weights": [1.2, 0.8, 0.9, -0.2, 0.6], "bias": -2.0, "decay": 0.8 }
//! ```
//!
//! Each step of the window contributes `weights · x_t`, discounted by how old it is;
//! the newest step has weight 1. The sum plus bias goes through a logistic squash.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::{ModelLoader, Predictor};
use crate::error::DriftError;
use crate::types::{FeatureVector, FEATURE_COUNT};

/// On-disk model description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub version: String,
    pub window_size: usize,
    pub weights: [f64; FEATURE_COUNT],
    #[serde(default)]
    pub bias: f64,
    #[serde(default = "default_decay")]
    pub decay: f64,
}

fn default_decay() -> f64 {
    1.0
}

impl ModelSpec {
    pub fn validate(&self) -> Result<(), DriftError> {
        if self.window_size == 0 {
            return Err(DriftError::EngineLoadFailure(
                "window_size must be at least 1".to_string(),
            ));
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(DriftError::EngineLoadFailure(format!(
                "decay must be in (0, 1], got {}",
                self.decay
            )));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(DriftError::EngineLoadFailure(
                "weights and bias must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exponentially discounted linear model with a sigmoid output
#[derive(Debug, Clone)]
pub struct WindowedLinearModel {
    spec: ModelSpec,
}

impl WindowedLinearModel {
    pub fn new(spec: ModelSpec) -> Result<Self, DriftError> {
        spec.validate()?;
        Ok(Self { spec })
    }

    pub fn from_json(json: &str) -> Result<Self, DriftError> {
        let spec: ModelSpec = serde_json::from_str(json)
            .map_err(|e| DriftError::EngineLoadFailure(format!("invalid model file: {e}")))?;
        Self::new(spec)
    }

    pub fn window_size(&self) -> usize {
        self.spec.window_size
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl Predictor for WindowedLinearModel {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn predict(&self, window: &[FeatureVector]) -> Result<f64, DriftError> {
        let w = self.spec.window_size;
        if window.len() != w {
            return Err(DriftError::InvalidWindow {
                expected: w,
                actual: window.len(),
            });
        }

        let logit = window
            .iter()
            .enumerate()
            .map(|(t, x)| self.spec.decay.powi((w - 1 - t) as i32) * x.dot(&self.spec.weights))
            .sum::<f64>()
            + self.spec.bias;

        Ok(sigmoid(logit))
    }
}

/// Loads a [`WindowedLinearModel`] from a JSON file on disk
#[derive(Debug, Clone)]
pub struct FileModelLoader {
    path: PathBuf,
}

impl FileModelLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModelLoader for FileModelLoader {
    fn describe(&self) -> String {
        format!("windowed model from {}", self.path.display())
    }

    fn load(&self) -> Result<Box<dyn Predictor>, DriftError> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            DriftError::EngineLoadFailure(format!("cannot read {}: {e}", self.path.display()))
        })?;
        Ok(Box::new(WindowedLinearModel::from_json(&json)?))
    }
}
