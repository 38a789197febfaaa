//! Per-tab behavior sensor
//!
//! Consumes raw interaction events, keeps constant-size accumulators, and flushes one
//! [`BehaviorSample`] per interval. Accumulators reset on every flush, so samples cover
//! non-overlapping intervals and are never revised afterwards.
//!
//! Keystrokes are reduced to a timestamp and a "was it a deletion" flag at the event
//! boundary: [`SensorEvent::Key`] has no field that could carry the key itself.

pub mod pointer;
pub mod scroll;
pub mod typing;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::protocol::Message;
use crate::transport::MessageSender;
use crate::types::BehaviorSample;

pub use pointer::PointerTracker;
pub use scroll::{ScrollMetrics, ScrollTracker};
pub use typing::TypingTracker;

/// A raw interaction event observed in a page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorEvent {
    /// Vertical scroll offset
    Scroll { y: f64, at_ms: i64 },
    PointerMove { x: f64, y: f64, at_ms: i64 },
    Key { is_delete: bool, at_ms: i64 },
}

/// Flush timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    pub flush_interval: Duration,
    /// Delay before the first flush after start
    pub initial_delay: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(30),
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// All accumulators for one tab
#[derive(Debug, Clone, Default)]
pub struct BehaviorSensor {
    scroll: ScrollTracker,
    pointer: PointerTracker,
    typing: TypingTracker,
    events_since_flush: u64,
}

impl BehaviorSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::Scroll { y, at_ms } => self.scroll.observe(y, at_ms),
            SensorEvent::PointerMove { x, y, at_ms } => self.pointer.observe(x, y, at_ms),
            SensorEvent::Key { is_delete, at_ms } => self.typing.observe(is_delete, at_ms),
        }
        self.events_since_flush += 1;
    }

    /// Summarize the interval and reset the accumulators
    pub fn flush(&mut self, now: DateTime<Utc>) -> BehaviorSample {
        let ScrollMetrics {
            average_velocity,
            is_erratic,
        } = self.scroll.metrics();

        let sample = BehaviorSample {
            scroll_velocity_avg: average_velocity,
            is_scroll_erratic: is_erratic,
            mouse_entropy: self.pointer.entropy(),
            is_hovering_top: self.pointer.is_hovering_top(),
            avg_typing_interval: self.typing.average_interval_ms(),
            backspace_count: self.typing.backspace_count(),
            tab_switch_count: 0,
            timestamp: now,
        };

        self.scroll.reset();
        self.pointer.reset();
        self.typing.reset();
        self.events_since_flush = 0;

        sample
    }

    pub fn events_since_flush(&self) -> u64 {
        self.events_since_flush
    }
}

/// Drive a sensor from an event stream, flushing on a fixed interval.
///
/// Each flushed sample is sent as `BEHAVIOR_UPDATE`; a failed send is dropped and the
/// next interval's sample supersedes it. Returns when the event stream closes or on
/// shutdown.
pub async fn run_sensor(
    mut sensor: BehaviorSensor,
    mut events: mpsc::Receiver<SensorEvent>,
    outbound: MessageSender,
    config: SensorConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut flush = interval_at(Instant::now() + config.initial_delay, config.flush_interval);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => sensor.observe(event),
                None => break,
            },
            _ = flush.tick() => {
                let observed = sensor.events_since_flush();
                let sample = sensor.flush(Utc::now());
                trace!(events = observed, "Sensor flush");
                if let Err(e) = outbound.send(Message::BehaviorUpdate { payload: sample }) {
                    debug!(error = %e, "Dropping behavior sample");
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }

    // Whatever accumulated since the last flush is still worth reporting
    if sensor.events_since_flush() > 0 {
        let sample = sensor.flush(Utc::now());
        if let Err(e) = outbound.send(Message::BehaviorUpdate { payload: sample }) {
            debug!(error = %e, "Dropping final behavior sample");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Inbound;

    #[test]
    fn test_flush_summarizes_and_resets() {
        let mut sensor = BehaviorSensor::new();
        sensor.observe(SensorEvent::Scroll { y: 0.0, at_ms: 0 });
        sensor.observe(SensorEvent::Scroll { y: 100.0, at_ms: 1000 });
        sensor.observe(SensorEvent::PointerMove { x: 0.0, y: 10.0, at_ms: 0 });
        sensor.observe(SensorEvent::Key { is_delete: false, at_ms: 0 });
        sensor.observe(SensorEvent::Key { is_delete: true, at_ms: 150 });

        let now = Utc::now();
        let sample = sensor.flush(now);
        assert!((sample.scroll_velocity_avg - 100.0).abs() < 1e-9);
        assert!(!sample.is_scroll_erratic);
        assert!(sample.is_hovering_top);
        assert!((sample.avg_typing_interval - 150.0).abs() < 1e-9);
        assert_eq!(sample.backspace_count, 1);
        assert_eq!(sample.tab_switch_count, 0);
        assert_eq!(sample.timestamp, now);

        let next = sensor.flush(now);
        assert_eq!(next.scroll_velocity_avg, 0.0);
        assert_eq!(next.backspace_count, 0);
        assert_eq!(next.avg_typing_interval, 0.0);
        assert_eq!(sensor.events_since_flush(), 0);
    }

    #[test]
    fn test_event_json_shape() {
        let event: SensorEvent =
            serde_json::from_str(r#"{"kind":"key","is_delete":true,"at_ms":42}"#).unwrap();
        assert_eq!(event, SensorEvent::Key { is_delete: true, at_ms: 42 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sensor_emits_behavior_updates() {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (outbound, mut inbox) = MessageSender::channel(16);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let config = SensorConfig {
            flush_interval: Duration::from_secs(2),
            initial_delay: Duration::from_secs(5),
        };

        let task = tokio::spawn(run_sensor(
            BehaviorSensor::new(),
            event_rx,
            outbound,
            config,
            shutdown_rx,
        ));

        event_tx.send(SensorEvent::Key { is_delete: true, at_ms: 0 }).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let Inbound { message, reply } = inbox.recv().await.unwrap();
        assert!(reply.is_none());
        match message {
            Message::BehaviorUpdate { payload } => assert_eq!(payload.backspace_count, 1),
            other => panic!("unexpected {other:?}"),
        }

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_sensor_survives_closed_receiver() {
        let (event_tx, event_rx) = mpsc::channel(4);
        let (outbound, inbox) = MessageSender::channel(1);
        drop(inbox);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let config = SensorConfig {
            flush_interval: Duration::from_millis(5),
            initial_delay: Duration::from_millis(1),
        };

        let task = tokio::spawn(run_sensor(
            BehaviorSensor::new(),
            event_rx,
            outbound,
            config,
            shutdown_rx,
        ));
        event_tx.send(SensorEvent::Key { is_delete: false, at_ms: 0 }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Closing the event stream ends the task cleanly despite every send failing
        drop(event_tx);
        task.await.unwrap();
    }
}
