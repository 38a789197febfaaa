//! Pointer path tortuosity and top-of-viewport hover tracking

/// Distance from the top of the viewport (px) that counts as hovering the browser chrome
pub const TOP_HOVER_THRESHOLD_PX: f64 = 50.0;

/// Minimum spacing between hover samples (ms)
pub const HOVER_SAMPLE_INTERVAL_MS: i64 = 200;

/// Tortuosity ratios are rescaled from this range onto 0-1
const TORTUOSITY_MIN: f64 = 1.0;
const TORTUOSITY_MAX: f64 = 5.0;

/// Tracks how indirect pointer movement is within an interval.
///
/// Entropy is `path_length / (displacement + 1)` rescaled from [1, 5] to [0, 1]: a
/// straight sweep scores 0, wandering back and forth approaches 1.
#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    first: Option<(f64, f64)>,
    last: Option<(f64, f64)>,
    path_length: f64,
    hovering_top: bool,
    last_hover_sample_ms: Option<i64>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, x: f64, y: f64, at_ms: i64) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }

        if let Some((lx, ly)) = self.last {
            self.path_length += ((x - lx).powi(2) + (y - ly).powi(2)).sqrt();
        }
        if self.first.is_none() {
            self.first = Some((x, y));
        }
        self.last = Some((x, y));

        let due = match self.last_hover_sample_ms {
            Some(prev) => at_ms
                .checked_sub(prev)
                .map_or(true, |dt| dt >= HOVER_SAMPLE_INTERVAL_MS),
            None => true,
        };
        if due {
            self.hovering_top = y < TOP_HOVER_THRESHOLD_PX;
            self.last_hover_sample_ms = Some(at_ms);
        }
    }

    /// Rescaled tortuosity for the interval (0 with fewer than two points)
    pub fn entropy(&self) -> f64 {
        let (Some((fx, fy)), Some((lx, ly))) = (self.first, self.last) else {
            return 0.0;
        };
        if self.path_length <= 0.0 {
            return 0.0;
        }

        let displacement = ((lx - fx).powi(2) + (ly - fy).powi(2)).sqrt();
        let ratio = self.path_length / (displacement + 1.0);
        ((ratio - TORTUOSITY_MIN) / (TORTUOSITY_MAX - TORTUOSITY_MIN)).clamp(0.0, 1.0)
    }

    pub fn is_hovering_top(&self) -> bool {
        self.hovering_top
    }

    /// Clear the path; the hover flag is state, not an accumulator, and is kept.
    pub fn reset(&mut self) {
        self.first = None;
        self.last = None;
        self.path_length = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_has_low_entropy() {
        let mut tracker = PointerTracker::new();
        for i in 0..=10 {
            tracker.observe(i as f64 * 50.0, 300.0, i * 300);
        }
        // path 500, displacement 500 -> ratio ~0.998 -> clamps to 0
        assert_eq!(tracker.entropy(), 0.0);
    }

    #[test]
    fn test_zigzag_has_high_entropy() {
        let mut tracker = PointerTracker::new();
        for i in 0..20 {
            let x = if i % 2 == 0 { 0.0 } else { 200.0 };
            tracker.observe(x, 300.0, i * 300);
        }
        // path 3800, displacement 200 -> ratio ~18.9 -> clamps to 1
        assert_eq!(tracker.entropy(), 1.0);
    }

    #[test]
    fn test_moderate_wandering_is_rescaled() {
        let mut tracker = PointerTracker::new();
        tracker.observe(0.0, 300.0, 0);
        tracker.observe(300.0, 300.0, 300);
        tracker.observe(0.0, 300.0, 600);
        tracker.observe(99.0, 300.0, 900);
        // path 699, displacement 99 -> ratio 6.99 -> 1.0
        assert_eq!(tracker.entropy(), 1.0);

        let mut tracker = PointerTracker::new();
        tracker.observe(0.0, 300.0, 0);
        tracker.observe(200.0, 300.0, 300);
        tracker.observe(100.0, 300.0, 600);
        // path 300, displacement 100 -> ratio 300/101 = 2.97 -> (2.97-1)/4 = 0.4926
        assert!((tracker.entropy() - (300.0 / 101.0 - 1.0) / 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_point_entropy_is_zero() {
        let mut tracker = PointerTracker::new();
        tracker.observe(10.0, 10.0, 0);
        assert_eq!(tracker.entropy(), 0.0);
    }

    #[test]
    fn test_hover_is_throttled() {
        let mut tracker = PointerTracker::new();
        tracker.observe(100.0, 20.0, 0);
        assert!(tracker.is_hovering_top());

        // Within the throttle window: ignored for hover purposes
        tracker.observe(100.0, 400.0, 100);
        assert!(tracker.is_hovering_top());

        tracker.observe(100.0, 400.0, 250);
        assert!(!tracker.is_hovering_top());
    }

    #[test]
    fn test_extreme_timestamps_resample_hover() {
        let mut tracker = PointerTracker::new();
        tracker.observe(100.0, 20.0, i64::MIN);
        assert!(tracker.is_hovering_top());

        tracker.observe(100.0, 400.0, i64::MAX);
        assert!(!tracker.is_hovering_top());

        // Going backwards never panics; a huge negative jump is treated as a fresh sample
        tracker.observe(100.0, 20.0, i64::MIN);
        assert!(tracker.is_hovering_top());
    }

    #[test]
    fn test_reset_clears_path_but_keeps_hover() {
        let mut tracker = PointerTracker::new();
        tracker.observe(0.0, 10.0, 0);
        tracker.observe(200.0, 10.0, 300);
        tracker.observe(0.0, 10.0, 600);
        assert!(tracker.entropy() > 0.0);

        tracker.reset();
        assert_eq!(tracker.entropy(), 0.0);
        assert!(tracker.is_hovering_top());
    }
}
