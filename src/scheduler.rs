//! Background service loop
//!
//! One task owns the [`InterventionController`] and multiplexes everything that can
//! touch it: the periodic analysis alarm, inbound messages, browser events and
//! shutdown. Ticks run inline, so a tick waiting on a slow prediction delays the next
//! one instead of overlapping it; alarms missed meanwhile are dropped.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::controller::{BrowserEvent, InterventionController, TickOutcome};
use crate::protocol::AckStatus;
use crate::store::KeyValueStore;
use crate::transport::Inbound;

/// Name of the recurring analysis alarm
pub const ALARM_NAME: &str = "drift-analysis-alarm";

pub struct BackgroundService<S> {
    controller: InterventionController<S>,
    inbox: mpsc::Receiver<Inbound>,
    browser_events: mpsc::Receiver<BrowserEvent>,
    tick_interval: Duration,
}

impl<S: KeyValueStore> BackgroundService<S> {
    pub fn new(
        controller: InterventionController<S>,
        inbox: mpsc::Receiver<Inbound>,
        browser_events: mpsc::Receiver<BrowserEvent>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            controller,
            inbox,
            browser_events,
            tick_interval,
        }
    }

    /// Request a model load, then serve until shutdown.
    ///
    /// Returns the controller so callers can inspect final state and stats.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> InterventionController<S> {
        match self.controller.engine().load_model().await {
            Ok(ack) if ack.status == AckStatus::Error => {
                warn!(error = ack.error.as_deref().unwrap_or("unknown"), "Model load rejected");
            }
            Ok(ack) => info!(status = ?ack.status, "Model load requested"),
            Err(e) => warn!(error = %e, "Could not request model load"),
        }

        let mut alarm = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        alarm.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            alarm = ALARM_NAME,
            period_secs = self.tick_interval.as_secs_f64(),
            "Analysis alarm armed"
        );

        loop {
            tokio::select! {
                _ = alarm.tick() => {
                    let outcome = self.controller.tick(chrono::Utc::now()).await;
                    log_outcome(&outcome);
                }
                Some(Inbound { message, reply }) = self.inbox.recv() => {
                    let kind = message.kind();
                    let response = self.controller.handle_message(message);
                    if let (Some(reply), Some(response)) = (reply, response) {
                        if reply.send(response).is_err() {
                            debug!(kind, "Sender stopped waiting for reply");
                        }
                    }
                }
                Some(event) = self.browser_events.recv() => {
                    self.controller.handle_browser_event(event);
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping background service");
                    break;
                }
            }
        }

        let stats = self.controller.stats();
        info!(
            ticks = stats.ticks,
            scored = stats.scored,
            interventions = stats.interventions,
            "Background service stopped"
        );
        self.controller
    }
}

fn log_outcome(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Scored(tick) => info!(
            score = tick.score,
            threshold = tick.threshold,
            state = ?tick.state,
            streak = tick.streak,
            intervention = tick.intervention_fired,
            "Tick scored"
        ),
        TickOutcome::Skipped(reason) => debug!(?reason, "Tick skipped"),
    }
}
