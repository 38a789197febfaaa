//! Rule-based fallback scorer
//!
//! A fixed weighted sum over the newest feature vector plus the newest sample's
//! erratic-scroll and top-hover flags. Deterministic, loads instantly, and needs no
//! weights file.

use serde::{Deserialize, Serialize};

use crate::engine::{ModelLoader, Predictor};
use crate::error::DriftError;
use crate::types::{clamp_score, ActivityFlags, FeatureVector, FEATURE_COUNT};

pub const RULE_SCORER_VERSION: &str = "rule-v1";

/// Per-feature weights in feature-vector order, then the two flag weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleWeights {
    pub tab_switches: f64,
    pub scroll_velocity: f64,
    pub mouse_entropy: f64,
    pub typing_interval: f64,
    pub error_rate: f64,
    pub erratic_scroll: f64,
    pub hovering_top: f64,
}

impl Default for RuleWeights {
    /// Tab switching dominates, then restless scrolling and pointer wandering,
    /// then corrections.
    fn default() -> Self {
        Self {
            tab_switches: 0.35,
            scroll_velocity: 0.25,
            mouse_entropy: 0.25,
            typing_interval: 0.0,
            error_rate: 0.15,
            erratic_scroll: 0.15,
            hovering_top: 0.1,
        }
    }
}

impl RuleWeights {
    fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.tab_switches,
            self.scroll_velocity,
            self.mouse_entropy,
            self.typing_interval,
            self.error_rate,
        ]
    }
}

/// Distraction score = clamp(weights · newest vector + flag weights)
///
/// Formula:
/// ```text
/// score = 0.35 * tab_switches
///       + 0.25 * scroll_velocity
///       + 0.25 * mouse_entropy
///       + 0.15 * error_rate
///       + 0.15 * [scroll erratic]
///       + 0.10 * [hovering top]
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleScorer {
    weights: RuleWeights,
}

impl RuleScorer {
    pub fn new(weights: RuleWeights) -> Self {
        Self { weights }
    }

    pub fn score_vector(&self, vector: &FeatureVector) -> f64 {
        self.score(vector, ActivityFlags::default())
    }

    pub fn score(&self, vector: &FeatureVector, flags: ActivityFlags) -> f64 {
        let mut raw = vector.dot(&self.weights.as_array());
        if flags.is_scroll_erratic {
            raw += self.weights.erratic_scroll;
        }
        if flags.is_hovering_top {
            raw += self.weights.hovering_top;
        }
        clamp_score(raw)
    }
}

impl Predictor for RuleScorer {
    fn version(&self) -> &str {
        RULE_SCORER_VERSION
    }

    fn predict(&self, window: &[FeatureVector]) -> Result<f64, DriftError> {
        self.predict_with_flags(window, ActivityFlags::default())
    }

    fn predict_with_flags(
        &self,
        window: &[FeatureVector],
        flags: ActivityFlags,
    ) -> Result<f64, DriftError> {
        let latest = window
            .last()
            .ok_or(DriftError::InvalidWindow { expected: 1, actual: 0 })?;
        Ok(self.score(latest, flags))
    }
}

/// Loader that always succeeds with a [`RuleScorer`]
#[derive(Debug, Clone, Default)]
pub struct RuleLoader {
    pub weights: RuleWeights,
}

impl ModelLoader for RuleLoader {
    fn describe(&self) -> String {
        format!("rule-based scorer ({RULE_SCORER_VERSION})")
    }

    fn load(&self) -> Result<Box<dyn Predictor>, DriftError> {
        Ok(Box::new(RuleScorer::new(self.weights)))
    }
}
