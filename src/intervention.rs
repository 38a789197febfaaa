//! Break interventions
//!
//! An [`Intervention`] is the user-facing prompt fired when the controller enters the
//! distracted state. Delivery goes through a [`Notifier`], so the controller never
//! knows whether it ends up as a desktop notification, a log line or a UI message.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DriftError;
use crate::protocol::Message;

/// Notification title
pub const INTERVENTION_TITLE: &str = "Drift";

/// Surface opened when the user clicks the notification
pub const BREAK_SURFACE: &str = "break.html";

/// A break prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intervention {
    pub id: Uuid,
    pub score: f64,
    pub title: String,
    pub message: String,
    pub click_target: String,
    pub issued_at: DateTime<Utc>,
}

impl Intervention {
    pub fn new(score: f64, issued_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            score,
            title: INTERVENTION_TITLE.to_string(),
            message: format!(
                "Focus drifting? Take a break! (AI Score: {}%)",
                score_percent(score)
            ),
            click_target: BREAK_SURFACE.to_string(),
            issued_at,
        }
    }
}

/// Score as a rounded whole percentage
pub fn score_percent(score: f64) -> u32 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Delivers interventions to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, intervention: &Intervention) -> Result<(), DriftError>;
}

/// Writes interventions to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, intervention: &Intervention) -> Result<(), DriftError> {
        info!(
            id = %intervention.id,
            score = intervention.score,
            target = %intervention.click_target,
            "{}: {}",
            intervention.title,
            intervention.message
        );
        Ok(())
    }
}

/// Broadcasts `TRIGGER_INTERVENTION` to every subscribed UI surface
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: broadcast::Sender<Message>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, intervention: &Intervention) -> Result<(), DriftError> {
        self.tx
            .send(Message::TriggerIntervention {
                score: intervention.score,
            })
            .map(|_| ())
            .map_err(|_| DriftError::TransportUnavailable("no UI surface listening".to_string()))
    }
}

/// Fans one intervention out to several notifiers; one failing does not stop the rest
#[derive(Default)]
pub struct FanoutNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, intervention: &Intervention) -> Result<(), DriftError> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(intervention) {
                warn!(error = %e, "Intervention delivery failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Minimum number of ticks between dispatched interventions (0 = every firing dispatches)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CooldownGate {
    cooldown_ticks: u32,
    ticks_since_dispatch: Option<u32>,
    suppressed: u64,
}

impl CooldownGate {
    pub fn new(cooldown_ticks: u32) -> Self {
        Self {
            cooldown_ticks,
            ticks_since_dispatch: None,
            suppressed: 0,
        }
    }

    /// Advance by one scored tick
    pub fn tick(&mut self) {
        if let Some(n) = self.ticks_since_dispatch.as_mut() {
            *n = n.saturating_add(1);
        }
    }

    /// Whether a firing on the current tick may be dispatched; records the outcome.
    pub fn admit(&mut self) -> bool {
        let open = match self.ticks_since_dispatch {
            None => true,
            Some(n) => n >= self.cooldown_ticks,
        };
        if open {
            self.ticks_since_dispatch = Some(0);
        } else {
            self.suppressed += 1;
        }
        open
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
