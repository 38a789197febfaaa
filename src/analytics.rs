//! Focus analytics over persisted history
//!
//! Read-only summaries for report surfaces. Everything here works on focus
//! (`1 - distraction`) rather than the raw distraction score, and buckets by the
//! calendar of the timezone carried by `now`.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike};
use serde::Serialize;

use crate::types::HistoryEntry;

/// Number of most recent entries that decide the current status
pub const STATUS_SAMPLE_COUNT: usize = 5;

/// Focus at or above this counts towards a sweet-spot run
pub const HIGH_FOCUS_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FocusStatus {
    #[serde(rename = "Flow State")]
    FlowState,
    Drifting,
    Distracted,
    Neutral,
}

impl FocusStatus {
    /// Classify a mean focus level (0-1)
    pub fn from_focus(focus: f64) -> Self {
        if focus >= 0.7 {
            FocusStatus::FlowState
        } else if focus >= 0.4 {
            FocusStatus::Drifting
        } else {
            FocusStatus::Distracted
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FocusStatus::FlowState => "Flow State",
            FocusStatus::Drifting => "Drifting",
            FocusStatus::Distracted => "Distracted",
            FocusStatus::Neutral => "Neutral",
        }
    }
}

/// Mean focus over the most recent entries and its classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurrentStatus {
    pub average_focus: f64,
    pub status: FocusStatus,
}

/// One bar of the weekly chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyFocus {
    pub date: NaiveDate,
    /// Short weekday name ("Mon")
    pub label: String,
    /// Mean focus percentage, 0 when the day has no data
    pub percent: f64,
}

/// Best adjacent two-hour window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakWindow {
    pub start_hour: u32,
    pub average_focus: f64,
    pub label: String,
}

/// Everything the report surface shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusReport {
    pub entries: usize,
    pub streak_minutes: u32,
    pub daily_average: u32,
    pub current: CurrentStatus,
    pub sweet_spot_minutes: u32,
    pub peak: Option<PeakWindow>,
    pub last_7_days: Vec<DailyFocus>,
    pub today_hourly: Vec<f64>,
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn sorted(history: &[HistoryEntry]) -> Vec<&HistoryEntry> {
    let mut entries: Vec<&HistoryEntry> = history.iter().collect();
    entries.sort_by_key(|e| e.timestamp);
    entries
}

fn local_date<Tz: TimeZone>(entry: &HistoryEntry, tz: &Tz) -> NaiveDate {
    entry.timestamp.with_timezone(tz).date_naive()
}

/// Mean focus for one local calendar day, as a percentage
fn day_percent<Tz: TimeZone>(history: &[HistoryEntry], day: NaiveDate, tz: &Tz) -> Option<f64> {
    mean(
        history
            .iter()
            .filter(|e| local_date(e, tz) == day)
            .map(HistoryEntry::focus_score),
    )
    .map(|m| m * 100.0)
}

/// Today's mean focus as a rounded percentage (0 with no data today)
pub fn daily_average<Tz: TimeZone>(history: &[HistoryEntry], now: &DateTime<Tz>) -> u32 {
    day_percent(history, now.date_naive(), &now.timezone())
        .map(|p| p.round() as u32)
        .unwrap_or(0)
}

/// Status over the last [`STATUS_SAMPLE_COUNT`] entries; `Neutral` when empty
pub fn current_status(history: &[HistoryEntry]) -> CurrentStatus {
    let entries = sorted(history);
    let recent = &entries[entries.len().saturating_sub(STATUS_SAMPLE_COUNT)..];
    match mean(recent.iter().map(|e| e.focus_score())) {
        Some(average_focus) => CurrentStatus {
            average_focus,
            status: FocusStatus::from_focus(average_focus),
        },
        None => CurrentStatus {
            average_focus: 0.0,
            status: FocusStatus::Neutral,
        },
    }
}

/// Seven daily bars ending today, oldest first
pub fn last_7_days<Tz: TimeZone>(history: &[HistoryEntry], now: &DateTime<Tz>) -> Vec<DailyFocus> {
    let tz = now.timezone();
    let today = now.date_naive();
    (0..7)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            DailyFocus {
                date,
                label: date.format("%a").to_string(),
                percent: day_percent(history, date, &tz).unwrap_or(0.0),
            }
        })
        .collect()
}

/// Mean length in minutes of high-focus runs longer than one minute (0 if none).
///
/// A run spans from its first to its last high-focus entry and ends at the first
/// entry below [`HIGH_FOCUS_THRESHOLD`].
pub fn sweet_spot_minutes(history: &[HistoryEntry]) -> u32 {
    let mut durations = Vec::new();
    let mut run: Option<(i64, i64)> = None;

    let mut close = |run: &mut Option<(i64, i64)>| {
        if let Some((start, end)) = run.take() {
            let minutes = (end - start) as f64 / 60_000.0;
            if minutes > 1.0 {
                durations.push(minutes);
            }
        }
    };

    for entry in sorted(history) {
        let ts = entry.timestamp.timestamp_millis();
        if entry.focus_score() >= HIGH_FOCUS_THRESHOLD {
            run = match run {
                Some((start, _)) => Some((start, ts)),
                None => Some((ts, ts)),
            };
        } else {
            close(&mut run);
        }
    }
    close(&mut run);

    mean(durations).map(|m| m.round() as u32).unwrap_or(0)
}

/// Mean focus per local hour of day across all history
fn hourly_focus<'a, Tz: TimeZone>(
    entries: impl Iterator<Item = &'a HistoryEntry>,
    tz: &Tz,
) -> [f64; 24] {
    let mut sums = [0.0; 24];
    let mut counts = [0u32; 24];
    for entry in entries {
        let hour = entry.timestamp.with_timezone(tz).hour() as usize;
        sums[hour] += entry.focus_score();
        counts[hour] += 1;
    }

    let mut averages = [0.0; 24];
    for h in 0..24 {
        if counts[h] > 0 {
            averages[h] = sums[h] / counts[h] as f64;
        }
    }
    averages
}

/// "10 AM", "12 PM", "12 AM"
pub fn format_hour(hour: u32) -> String {
    let hour = hour % 24;
    let suffix = if hour >= 12 { "PM" } else { "AM" };
    let twelve = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{twelve} {suffix}")
}

/// Best two adjacent hours by mean hourly focus; `None` without data
pub fn peak_productivity<Tz: TimeZone>(history: &[HistoryEntry], tz: &Tz) -> Option<PeakWindow> {
    let hourly = hourly_focus(history.iter(), tz);

    let mut best: Option<(u32, f64)> = None;
    for h in 0..23 {
        let (a, b) = (hourly[h], hourly[h + 1]);
        if a <= 0.0 && b <= 0.0 {
            continue;
        }
        let avg = (a + b) / 2.0;
        if best.map_or(true, |(_, score)| avg > score) {
            best = Some((h as u32, avg));
        }
    }

    best.filter(|(_, score)| *score > 0.0)
        .map(|(start_hour, average_focus)| PeakWindow {
            start_hour,
            average_focus,
            label: format!("{} - {}", format_hour(start_hour), format_hour(start_hour + 2)),
        })
}

/// 24 hourly mean-focus percentages for one local day (0 for empty hours)
pub fn hourly_timeline<Tz: TimeZone>(history: &[HistoryEntry], day: NaiveDate, tz: &Tz) -> Vec<f64> {
    let mut sums = [0.0; 24];
    let mut counts = [0u32; 24];
    for entry in history.iter().filter(|e| local_date(e, tz) == day) {
        let hour = entry.timestamp.with_timezone(tz).hour() as usize;
        sums[hour] += entry.focus_score();
        counts[hour] += 1;
    }

    sums.iter()
        .zip(counts.iter())
        .map(|(&sum, &n)| if n > 0 { sum / n as f64 * 100.0 } else { 0.0 })
        .collect()
}

/// Assemble the full report
pub fn build_report<Tz: TimeZone>(
    history: &[HistoryEntry],
    streak_minutes: u32,
    now: &DateTime<Tz>,
) -> FocusReport {
    let tz = now.timezone();
    FocusReport {
        entries: history.len(),
        streak_minutes,
        daily_average: daily_average(history, now),
        current: current_status(history),
        sweet_spot_minutes: sweet_spot_minutes(history),
        peak: peak_productivity(history, &tz),
        last_7_days: last_7_days(history, now),
        today_hourly: hourly_timeline(history, now.date_naive(), &tz),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, focus: f64) -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap(),
            distraction_score: 1.0 - focus,
            scroll_velocity: 0.0,
            is_hovering_top: false,
            tab_switch_count: 0,
            avg_typing_interval: 0.0,
            backspace_count: 0,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(daily_average(&[], &now()), 0);
        assert_eq!(current_status(&[]).status, FocusStatus::Neutral);
        assert_eq!(sweet_spot_minutes(&[]), 0);
        assert_eq!(peak_productivity(&[], &Utc), None);
        assert!(last_7_days(&[], &now()).iter().all(|d| d.percent == 0.0));
    }

    #[test]
    fn test_flow_state_over_last_five() {
        let history: Vec<_> = [0.9, 0.8, 0.85, 0.75, 0.9]
            .iter()
            .enumerate()
            .map(|(i, &f)| at(2024, 1, 15, 10, i as u32, f))
            .collect();

        let status = current_status(&history);
        assert!((status.average_focus - 0.84).abs() < 1e-9);
        assert_eq!(status.status, FocusStatus::FlowState);
        assert_eq!(status.status.label(), "Flow State");
    }

    #[test]
    fn test_status_uses_only_newest_five() {
        let mut history: Vec<_> = (0..5).map(|i| at(2024, 1, 15, 9, i, 0.1)).collect();
        history.extend((0..5).map(|i| at(2024, 1, 15, 10, i, 0.5)));
        assert_eq!(current_status(&history).status, FocusStatus::Drifting);

        history.push(at(2024, 1, 15, 11, 0, 0.0));
        history.push(at(2024, 1, 15, 11, 1, 0.0));
        history.push(at(2024, 1, 15, 11, 2, 0.0));
        // 0.5, 0.5, 0, 0, 0 -> 0.2
        assert_eq!(current_status(&history).status, FocusStatus::Distracted);
    }

    #[test]
    fn test_daily_average_counts_today_only() {
        let history = vec![
            at(2024, 1, 14, 10, 0, 0.0),
            at(2024, 1, 15, 10, 0, 0.8),
            at(2024, 1, 15, 11, 0, 0.7),
        ];
        assert_eq!(daily_average(&history, &now()), 75);
    }

    #[test]
    fn test_last_7_days_labels_and_values() {
        let history = vec![at(2024, 1, 15, 10, 0, 0.5), at(2024, 1, 9, 10, 0, 1.0)];
        let days = last_7_days(&history, &now());
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        assert_eq!(days[0].label, "Tue");
        assert!((days[0].percent - 100.0).abs() < 1e-9);
        assert_eq!(days[6].label, "Mon");
        assert!((days[6].percent - 50.0).abs() < 1e-9);
        assert_eq!(days[3].percent, 0.0);
    }

    #[test]
    fn test_sweet_spot_averages_long_runs() {
        let history = vec![
            // 10:00-10:20 high focus run (20 min)
            at(2024, 1, 15, 10, 0, 0.9),
            at(2024, 1, 15, 10, 10, 0.8),
            at(2024, 1, 15, 10, 20, 0.7),
            at(2024, 1, 15, 10, 21, 0.2),
            // single point run, 0 minutes, ignored
            at(2024, 1, 15, 11, 0, 0.9),
            at(2024, 1, 15, 11, 1, 0.1),
            // ongoing 10 min run at the end
            at(2024, 1, 15, 12, 0, 0.65),
            at(2024, 1, 15, 12, 10, 0.95),
        ];
        assert_eq!(sweet_spot_minutes(&history), 15);
    }

    #[test]
    fn test_peak_productivity_window() {
        let history = vec![
            at(2024, 1, 15, 9, 0, 0.3),
            at(2024, 1, 15, 10, 0, 0.9),
            at(2024, 1, 15, 11, 0, 0.8),
            at(2024, 1, 15, 15, 0, 0.6),
        ];
        let peak = peak_productivity(&history, &Utc).unwrap();
        assert_eq!(peak.start_hour, 10);
        assert_eq!(peak.label, "10 AM - 12 PM");
    }

    #[test]
    fn test_format_hour() {
        assert_eq!(format_hour(0), "12 AM");
        assert_eq!(format_hour(9), "9 AM");
        assert_eq!(format_hour(12), "12 PM");
        assert_eq!(format_hour(23), "11 PM");
        assert_eq!(format_hour(24), "12 AM");
    }

    #[test]
    fn test_hourly_timeline() {
        let history = vec![
            at(2024, 1, 15, 10, 0, 0.5),
            at(2024, 1, 15, 10, 30, 1.0),
            at(2024, 1, 14, 10, 0, 0.0),
        ];
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let timeline = hourly_timeline(&history, day, &Utc);
        assert_eq!(timeline.len(), 24);
        assert!((timeline[10] - 75.0).abs() < 1e-9);
        assert_eq!(timeline[9], 0.0);
    }

    #[test]
    fn test_report_serializes_status_label() {
        let history = vec![at(2024, 1, 15, 10, 0, 0.9)];
        let report = build_report(&history, 12, &now());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["current"]["status"], "Flow State");
        assert_eq!(value["streak_minutes"], 12);
        assert_eq!(value["daily_average"], 90);
    }
}
