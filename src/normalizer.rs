//! Feature normalization
//!
//! This module turns a raw behavior sample plus the controller's tab-switch counter into
//! a fixed-order feature vector:
//! - Counts and rates divided by a fixed cap, then clamped to 1.0
//! - Pointer entropy passed through (the sensor already rescaled it)
//! - Negative, NaN and infinite inputs treated as 0
//!
//! There is no failure mode: any sample produces a valid vector.

use crate::types::{BehaviorSample, FeatureVector};

/// Tab switches per tick that saturate the tab feature
pub const TAB_COUNT_CAP: f64 = 20.0;

/// Scroll velocity (px/s) that saturates the scroll feature
pub const SCROLL_VELOCITY_CAP: f64 = 200.0;

/// Inter-key interval (ms) that saturates the typing feature
pub const TYPING_INTERVAL_CAP: f64 = 1000.0;

/// Backspaces per interval that saturate the error-rate feature
pub const ERROR_COUNT_CAP: f64 = 20.0;

/// Stateless normalizer from samples to feature vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureNormalizer;

impl FeatureNormalizer {
    /// Normalize one sample; `tab_switch_count` comes from the controller, not the sample.
    pub fn normalize(sample: &BehaviorSample, tab_switch_count: u32) -> FeatureVector {
        FeatureVector::new([
            scale(tab_switch_count as f64, TAB_COUNT_CAP),
            scale(sample.scroll_velocity_avg, SCROLL_VELOCITY_CAP),
            sanitize(sample.mouse_entropy),
            scale(sample.avg_typing_interval, TYPING_INTERVAL_CAP),
            scale(sample.backspace_count as f64, ERROR_COUNT_CAP),
        ])
    }
}

/// Replace values that cannot be scaled with 0
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Divide by `cap` and clamp into 0-1
fn scale(value: f64, cap: f64) -> f64 {
    (sanitize(value) / cap).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> BehaviorSample {
        BehaviorSample::empty(Utc::now())
    }

    #[test]
    fn test_zero_sample_is_zero_vector() {
        let v = FeatureNormalizer::normalize(&sample(), 0);
        assert_eq!(v, FeatureVector::zeros());
    }

    #[test]
    fn test_caps_are_applied() {
        let mut s = sample();
        s.scroll_velocity_avg = 100.0;
        s.avg_typing_interval = 250.0;
        s.backspace_count = 5;
        s.mouse_entropy = 0.4;

        let v = FeatureNormalizer::normalize(&s, 4);
        assert!((v.tab_count() - 0.2).abs() < 1e-12);
        assert!((v.scroll_velocity() - 0.5).abs() < 1e-12);
        assert!((v.mouse_entropy() - 0.4).abs() < 1e-12);
        assert!((v.typing_speed() - 0.25).abs() < 1e-12);
        assert!((v.error_rate() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_pathological_inputs_saturate() {
        let mut s = sample();
        s.scroll_velocity_avg = 10_000.0;
        s.avg_typing_interval = 1e12;
        s.backspace_count = u32::MAX;
        s.mouse_entropy = 7.0;

        let v = FeatureNormalizer::normalize(&s, 500);
        assert_eq!(v.as_array(), &[1.0; 5]);
    }

    #[test]
    fn test_malformed_inputs_default_to_zero() {
        let mut s = sample();
        s.scroll_velocity_avg = f64::NAN;
        s.avg_typing_interval = -30.0;
        s.mouse_entropy = f64::INFINITY;

        let v = FeatureNormalizer::normalize(&s, 0);
        assert_eq!(v, FeatureVector::zeros());
    }

    #[test]
    fn test_deterministic() {
        let mut s = sample();
        s.scroll_velocity_avg = 42.0;
        s.backspace_count = 3;
        assert_eq!(
            FeatureNormalizer::normalize(&s, 2),
            FeatureNormalizer::normalize(&s, 2)
        );
    }
}
