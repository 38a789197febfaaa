//! Scroll velocity and direction tracking

/// Share of direction reversals above which scrolling counts as erratic
const ERRATIC_REVERSAL_RATIO: f64 = 0.5;

/// Minimum measurements before the erratic flag is evaluated
const MIN_MEASUREMENTS_FOR_ERRATIC: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
    Still,
}

/// Scroll metrics for one flush interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Mean velocity in pixels per second
    pub average_velocity: f64,
    pub is_erratic: bool,
}

/// Accumulates per-event scroll velocities and direction reversals.
///
/// Memory is constant: only running sums and the previous direction are kept.
#[derive(Debug, Clone, Default)]
pub struct ScrollTracker {
    last_position: Option<(f64, i64)>,
    velocity_sum: f64,
    measurements: u32,
    previous_direction: Option<Direction>,
    reversals: u32,
}

impl ScrollTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the vertical scroll offset observed at `at_ms`.
    ///
    /// The first observation only establishes the reference position. Events with a
    /// non-positive time delta are ignored; a delta too large to represent re-anchors
    /// the reference instead of producing a velocity.
    pub fn observe(&mut self, y: f64, at_ms: i64) {
        if !y.is_finite() {
            return;
        }

        let Some((last_y, last_at)) = self.last_position else {
            self.last_position = Some((y, at_ms));
            return;
        };

        let dt_ms = match at_ms.checked_sub(last_at) {
            Some(dt) if dt > 0 => dt,
            Some(_) => return,
            None => {
                self.last_position = Some((y, at_ms));
                return;
            }
        };

        let displacement = y - last_y;
        let velocity = displacement.abs() / (dt_ms as f64 / 1000.0);
        let direction = if displacement > 0.0 {
            Direction::Down
        } else if displacement < 0.0 {
            Direction::Up
        } else {
            Direction::Still
        };

        if let Some(previous) = self.previous_direction {
            if previous != direction && previous != Direction::Still && direction != Direction::Still {
                self.reversals += 1;
            }
        }

        self.velocity_sum += velocity;
        self.measurements += 1;
        self.previous_direction = Some(direction);
        self.last_position = Some((y, at_ms));
    }

    /// Metrics accumulated since the last reset
    pub fn metrics(&self) -> ScrollMetrics {
        if self.measurements == 0 {
            return ScrollMetrics {
                average_velocity: 0.0,
                is_erratic: false,
            };
        }

        let average_velocity = self.velocity_sum / self.measurements as f64;
        let transitions = self.measurements - 1;
        let is_erratic = self.measurements >= MIN_MEASUREMENTS_FOR_ERRATIC
            && transitions > 0
            && (self.reversals as f64 / transitions as f64) > ERRATIC_REVERSAL_RATIO;

        ScrollMetrics {
            average_velocity,
            is_erratic,
        }
    }

    /// Clear the interval accumulators; the reference position survives so the next
    /// interval's first event still yields a velocity.
    pub fn reset(&mut self) {
        self.velocity_sum = 0.0;
        self.measurements = 0;
        self.previous_direction = None;
        self.reversals = 0;
    }

    pub fn measurement_count(&self) -> u32 {
        self.measurements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_events_yields_zero() {
        let tracker = ScrollTracker::new();
        let metrics = tracker.metrics();
        assert_eq!(metrics.average_velocity, 0.0);
        assert!(!metrics.is_erratic);
    }

    #[test]
    fn test_average_velocity_in_pixels_per_second() {
        let mut tracker = ScrollTracker::new();
        tracker.observe(0.0, 0);
        tracker.observe(100.0, 1000); // 100 px/s
        tracker.observe(400.0, 2000); // 300 px/s

        let metrics = tracker.metrics();
        assert!((metrics.average_velocity - 200.0).abs() < 1e-9);
        assert!(!metrics.is_erratic);
    }

    #[test]
    fn test_back_and_forth_is_erratic() {
        let mut tracker = ScrollTracker::new();
        tracker.observe(0.0, 0);
        tracker.observe(100.0, 100);
        tracker.observe(0.0, 200);
        tracker.observe(100.0, 300);
        tracker.observe(0.0, 400);

        // 4 measurements, 3 transitions, 3 reversals
        assert!(tracker.metrics().is_erratic);
    }

    #[test]
    fn test_erratic_needs_three_measurements() {
        let mut tracker = ScrollTracker::new();
        tracker.observe(0.0, 0);
        tracker.observe(100.0, 100);
        tracker.observe(0.0, 200);

        // 2 measurements with one reversal: ratio 1.0 but too few samples
        assert_eq!(tracker.measurement_count(), 2);
        assert!(!tracker.metrics().is_erratic);
    }

    #[test]
    fn test_still_transitions_do_not_count_as_reversals() {
        let mut tracker = ScrollTracker::new();
        tracker.observe(0.0, 0);
        tracker.observe(100.0, 100);
        tracker.observe(100.0, 200);
        tracker.observe(200.0, 300);
        tracker.observe(200.0, 400);

        assert!(!tracker.metrics().is_erratic);
    }

    #[test]
    fn test_zero_time_delta_ignored() {
        let mut tracker = ScrollTracker::new();
        tracker.observe(0.0, 500);
        tracker.observe(100.0, 500);
        assert_eq!(tracker.measurement_count(), 0);
    }

    #[test]
    fn test_extreme_timestamps_reanchor() {
        let mut tracker = ScrollTracker::new();
        tracker.observe(0.0, i64::MIN);
        tracker.observe(100.0, i64::MAX);
        assert_eq!(tracker.measurement_count(), 0);

        tracker.observe(0.0, i64::MIN);
        assert_eq!(tracker.measurement_count(), 0);

        tracker.observe(50.0, i64::MIN + 1000);
        assert_eq!(tracker.measurement_count(), 1);
        assert!((tracker.metrics().average_velocity - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_keeps_reference_position() {
        let mut tracker = ScrollTracker::new();
        tracker.observe(0.0, 0);
        tracker.observe(100.0, 1000);
        tracker.reset();
        assert_eq!(tracker.metrics().average_velocity, 0.0);

        tracker.observe(150.0, 2000);
        assert_eq!(tracker.measurement_count(), 1);
        assert!((tracker.metrics().average_velocity - 50.0).abs() < 1e-9);
    }
}
