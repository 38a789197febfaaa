//! Typing cadence tracking
//!
//! Only timing survives: the key itself is reduced to "was it a deletion".

/// Intervals shorter than this are treated as paste/auto-repeat bursts (ms)
pub const MIN_KEY_INTERVAL_MS: i64 = 10;

/// Intervals longer than this are idle gaps, not typing cadence (ms)
pub const MAX_KEY_INTERVAL_MS: i64 = 5000;

#[derive(Debug, Clone, Default)]
pub struct TypingTracker {
    last_key_ms: Option<i64>,
    interval_sum_ms: f64,
    interval_count: u32,
    backspace_count: u32,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, is_delete: bool, at_ms: i64) {
        if let Some(interval) = self.last_key_ms.and_then(|last| at_ms.checked_sub(last)) {
            if (MIN_KEY_INTERVAL_MS..=MAX_KEY_INTERVAL_MS).contains(&interval) {
                self.interval_sum_ms += interval as f64;
                self.interval_count += 1;
            }
        }
        self.last_key_ms = Some(at_ms);

        if is_delete {
            self.backspace_count = self.backspace_count.saturating_add(1);
        }
    }

    /// Mean accepted inter-key interval in ms (0 when none were accepted)
    pub fn average_interval_ms(&self) -> f64 {
        if self.interval_count == 0 {
            0.0
        } else {
            self.interval_sum_ms / self.interval_count as f64
        }
    }

    pub fn backspace_count(&self) -> u32 {
        self.backspace_count
    }

    pub fn reset(&mut self) {
        self.interval_sum_ms = 0.0;
        self.interval_count = 0;
        self.backspace_count = 0;
    }
}
