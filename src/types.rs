//! Core data types
//!
//! This module defines the values that flow through the focus pipeline: the per-interval
//! behavior summary produced by a sensor, the normalized feature vector fed to the
//! scoring engine, and the history entries persisted for analytics.

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of coordinates in a [`FeatureVector`]
pub const FEATURE_COUNT: usize = 5;

/// Index of each coordinate inside a [`FeatureVector`]
pub mod feature_index {
    pub const TAB_COUNT: usize = 0;
    pub const SCROLL_VELOCITY: usize = 1;
    pub const MOUSE_ENTROPY: usize = 2;
    pub const TYPING_SPEED: usize = 3;
    pub const ERROR_RATE: usize = 4;
}

/// Summary of one sampling interval observed in a single tab.
///
/// Produced by the sensor once per flush. Raw key identities never reach this struct;
/// only the inter-key timing and the number of deletions survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorSample {
    /// Mean scroll velocity in pixels per second
    #[serde(default, alias = "scrollVelocity", deserialize_with = "lenient::measure")]
    pub scroll_velocity_avg: f64,
    /// More than half of the scroll transitions reversed direction
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_scroll_erratic: bool,
    /// Pointer path tortuosity rescaled to 0-1
    #[serde(default, deserialize_with = "lenient::measure")]
    pub mouse_entropy: f64,
    /// Pointer was near the top of the viewport (tab strip / address bar)
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_hovering_top: bool,
    /// Mean inter-keystroke interval in milliseconds
    #[serde(default, deserialize_with = "lenient::measure")]
    pub avg_typing_interval: f64,
    /// Backspace/delete presses in the interval
    #[serde(default, deserialize_with = "lenient::count")]
    pub backspace_count: u32,
    /// Tab switches attributed to the interval (sensors report 0; the controller
    /// owns the real counter)
    #[serde(default, deserialize_with = "lenient::count")]
    pub tab_switch_count: u32,
    /// When the interval was flushed
    #[serde(with = "ts_milliseconds", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Sample fields arrive from page scripts, where `NaN` serializes as `null`.
/// Anything that is not a usable value reads as 0 / false instead of failing the sample.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn measure<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(0.0))
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(Value::as_u64)
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX)))
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }
}

impl BehaviorSample {
    /// Zero-valued sample used when no sensor reported during a tick.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            scroll_velocity_avg: 0.0,
            is_scroll_erratic: false,
            mouse_entropy: 0.0,
            is_hovering_top: false,
            avg_typing_interval: 0.0,
            backspace_count: 0,
            tab_switch_count: 0,
            timestamp,
        }
    }
}

/// Sample-level flags that have no slot in the feature vector.
///
/// Shipped next to the window in `PREDICT` so the rule scorer can weigh them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFlags {
    #[serde(default)]
    pub is_scroll_erratic: bool,
    #[serde(default)]
    pub is_hovering_top: bool,
}

impl ActivityFlags {
    pub fn from_sample(sample: &BehaviorSample) -> Self {
        Self {
            is_scroll_erratic: sample.is_scroll_erratic,
            is_hovering_top: sample.is_hovering_top,
        }
    }

    pub fn is_quiet(&self) -> bool {
        !self.is_scroll_erratic && !self.is_hovering_top
    }
}

/// Fixed-order normalized features: `[tabCount, scrollVelocity, mouseEntropy,
/// typingSpeed, errorRate]`, every coordinate in 0-1.
///
/// Serializes as a bare JSON array so it can be shipped verbatim in `PREDICT` requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Build a vector, clamping every coordinate into 0-1 (non-finite values become 0).
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        let mut clamped = [0.0; FEATURE_COUNT];
        for (slot, v) in clamped.iter_mut().zip(values) {
            *slot = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        }
        Self(clamped)
    }

    pub fn zeros() -> Self {
        Self([0.0; FEATURE_COUNT])
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn tab_count(&self) -> f64 {
        self.0[feature_index::TAB_COUNT]
    }

    pub fn scroll_velocity(&self) -> f64 {
        self.0[feature_index::SCROLL_VELOCITY]
    }

    pub fn mouse_entropy(&self) -> f64 {
        self.0[feature_index::MOUSE_ENTROPY]
    }

    pub fn typing_speed(&self) -> f64 {
        self.0[feature_index::TYPING_SPEED]
    }

    pub fn error_rate(&self) -> f64 {
        self.0[feature_index::ERROR_RATE]
    }

    /// Dot product with a weight vector
    pub fn dot(&self, weights: &[f64; FEATURE_COUNT]) -> f64 {
        self.0.iter().zip(weights).map(|(x, w)| x * w).sum()
    }
}

/// A scored tick, before it is folded into a [`HistoryEntry`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreResult {
    /// Distraction score (0-1)
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

impl ScoreResult {
    pub fn new(score: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            score: clamp_score(score),
            timestamp,
        }
    }
}

/// One persisted, scored tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Distraction score (0-1)
    #[serde(default)]
    pub distraction_score: f64,
    #[serde(default)]
    pub scroll_velocity: f64,
    #[serde(default)]
    pub is_hovering_top: bool,
    #[serde(default)]
    pub tab_switch_count: u32,
    #[serde(default)]
    pub avg_typing_interval: f64,
    #[serde(default)]
    pub backspace_count: u32,
}

impl HistoryEntry {
    /// Fold a score and the raw sample that produced it into an entry.
    pub fn from_score(result: &ScoreResult, sample: &BehaviorSample, tab_switch_count: u32) -> Self {
        Self {
            timestamp: result.timestamp,
            distraction_score: result.score,
            scroll_velocity: sample.scroll_velocity_avg,
            is_hovering_top: sample.is_hovering_top,
            tab_switch_count,
            avg_typing_interval: sample.avg_typing_interval,
            backspace_count: sample.backspace_count,
        }
    }

    /// Focus score (1 - distraction)
    pub fn focus_score(&self) -> f64 {
        1.0 - clamp_score(self.distraction_score)
    }
}

/// User-selected sensitivity controlling the distraction threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Low,
    #[default]
    Balanced,
    High,
}

impl Sensitivity {
    /// Distraction threshold; scores at or above it count as distracted.
    pub const fn threshold(self) -> f64 {
        match self {
            Sensitivity::Low => 0.8,
            Sensitivity::Balanced => 0.6,
            Sensitivity::High => 0.4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sensitivity::Low => "low",
            Sensitivity::Balanced => "balanced",
            Sensitivity::High => "high",
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Sensitivity::Low),
            "balanced" => Ok(Sensitivity::Balanced),
            "high" => Ok(Sensitivity::High),
            other => Err(format!("unknown sensitivity '{other}'")),
        }
    }
}

/// Controller state after the most recent scored tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusState {
    /// Nothing scored yet
    #[default]
    Unknown,
    Focused,
    Distracted,
}

/// Clamp a score into 0-1, mapping NaN to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
