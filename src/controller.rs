//! Intervention controller
//!
//! Owns all process-wide pipeline state and advances it one tick at a time:
//!
//! 1. Take the latest behavior sample (zeros if none arrived) and the tab-switch
//!    counter, resetting both
//! 2. Normalize, push onto the feature window, persist the window
//! 3. When the window is full and the engine has reported ready, request a score
//! 4. Compare against the current sensitivity threshold, update the streak, append
//!    history, and fire an intervention on a distracted tick
//!
//! All mutation goes through `&mut self`, so a tick and an incoming message can never
//! interleave. The only suspension point inside a tick is the predict call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::DriftError;
use crate::intervention::{CooldownGate, Intervention, Notifier};
use crate::normalizer::FeatureNormalizer;
use crate::protocol::{Ack, AckStatus, LogLevel, Message, ReadyStatus, Response};
use crate::store::{KeyValueStore, PersistedState};
use crate::transport::EngineClient;
use crate::types::{
    ActivityFlags, BehaviorSample, FocusState, HistoryEntry, ScoreResult, Sensitivity,
};
use crate::window::FeatureWindow;

/// Score used by the demo trigger
pub const DEMO_INTERVENTION_SCORE: f64 = 0.85;

/// Browser-level events observed outside any page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrowserEvent {
    TabActivated { tab_id: u64 },
    FocusChanged { focused: bool },
}

/// Tuning for the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub window_size: usize,
    /// Ticks after a dispatched intervention during which further firings are
    /// suppressed (0 disables)
    pub intervention_cooldown_ticks: u32,
    /// Skip ticks while the browser window is unfocused
    pub skip_when_away: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            intervention_cooldown_ticks: 0,
            skip_when_away: true,
        }
    }
}

/// Everything the tick reads and writes
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub latest_sample: Option<BehaviorSample>,
    pub tab_switch_count: u32,
    pub last_active_tab: Option<u64>,
    pub browser_focused: bool,
    pub window: FeatureWindow,
    pub streak: u32,
    pub focus_state: FocusState,
    pub sensitivity: Sensitivity,
    pub engine_ready: bool,
    pub model_version: Option<String>,
}

impl PipelineState {
    pub fn new(window_size: usize) -> Self {
        Self {
            latest_sample: None,
            tab_switch_count: 0,
            last_active_tab: None,
            browser_focused: true,
            window: FeatureWindow::new(window_size),
            streak: 0,
            focus_state: FocusState::Unknown,
            sensitivity: Sensitivity::default(),
            engine_ready: false,
            model_version: None,
        }
    }
}

/// Why a tick produced no score
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    UserAway,
    CollectingWindow { have: usize, need: usize },
    EngineNotReady,
    PredictFailed { error: String },
}

/// A tick that produced a score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTick {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub threshold: f64,
    pub sensitivity: Sensitivity,
    pub state: FocusState,
    pub streak: u32,
    pub streak_broken: bool,
    pub intervention_fired: bool,
    pub intervention_suppressed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    Skipped(SkipReason),
    Scored(ScoredTick),
}

impl TickOutcome {
    pub fn scored(&self) -> Option<&ScoredTick> {
        match self {
            TickOutcome::Scored(tick) => Some(tick),
            TickOutcome::Skipped(_) => None,
        }
    }
}

/// Running counters, for logs and the CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub ticks: u64,
    pub scored: u64,
    pub skipped: u64,
    pub interventions: u64,
    pub suppressed_interventions: u64,
    pub predict_failures: u64,
    pub persistence_failures: u64,
}

pub struct InterventionController<S> {
    config: ControllerConfig,
    state: PipelineState,
    persisted: PersistedState<S>,
    engine: EngineClient,
    notifier: Box<dyn Notifier>,
    cooldown: CooldownGate,
    stats: ControllerStats,
}

impl<S: KeyValueStore> InterventionController<S> {
    /// Create a controller, restoring the window, streak and sensitivity from the store.
    ///
    /// Unreadable persisted values are logged and replaced with defaults.
    pub fn new(
        config: ControllerConfig,
        persisted: PersistedState<S>,
        engine: EngineClient,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let mut state = PipelineState::new(config.window_size);
        let mut stats = ControllerStats::default();

        match persisted.feature_window() {
            Ok(vectors) => state.window = FeatureWindow::restore(config.window_size, vectors),
            Err(e) => {
                warn!(error = %e, "Could not restore feature window");
                stats.persistence_failures += 1;
            }
        }
        match persisted.streak() {
            Ok(streak) => state.streak = streak,
            Err(e) => {
                warn!(error = %e, "Could not restore streak");
                stats.persistence_failures += 1;
            }
        }
        match persisted.sensitivity() {
            Ok(sensitivity) => state.sensitivity = sensitivity,
            Err(e) => {
                warn!(error = %e, "Could not read sensitivity");
                stats.persistence_failures += 1;
            }
        }

        info!(
            window = state.window.len(),
            window_size = config.window_size,
            streak = state.streak,
            sensitivity = %state.sensitivity,
            "Controller state restored"
        );

        Self {
            cooldown: CooldownGate::new(config.intervention_cooldown_ticks),
            config,
            state,
            persisted,
            engine,
            notifier,
            stats,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn persisted(&self) -> &PersistedState<S> {
        &self.persisted
    }

    pub fn engine(&self) -> &EngineClient {
        &self.engine
    }

    /// Handle one inbound message; returns the reply, if the message expects one.
    pub fn handle_message(&mut self, message: Message) -> Option<Response> {
        match message {
            Message::BehaviorUpdate { payload } => {
                debug!(
                    scroll_velocity = payload.scroll_velocity_avg,
                    hovering_top = payload.is_hovering_top,
                    typing_interval = payload.avg_typing_interval,
                    backspaces = payload.backspace_count,
                    "Behavior update received"
                );
                self.state.latest_sample = Some(payload);
                Some(Response::Ack(Ack::new(AckStatus::Received)))
            }
            Message::ModelReady {
                status,
                version,
                error,
            } => {
                match status {
                    ReadyStatus::Success => {
                        info!(version = version.as_deref().unwrap_or("unknown"), "Scoring engine ready");
                        self.state.engine_ready = true;
                        self.state.model_version = version;
                    }
                    ReadyStatus::Error => {
                        error!(error = error.as_deref().unwrap_or("unknown"), "Scoring engine failed to load");
                        self.state.engine_ready = false;
                    }
                }
                None
            }
            Message::DemoTriggerNotification => {
                info!("Demo intervention requested");
                self.dispatch(DEMO_INTERVENTION_SCORE, Utc::now());
                Some(Response::Ack(Ack::new(AckStatus::NotificationTriggered)))
            }
            Message::OffscreenLog { log_type, message } => {
                match log_type {
                    LogLevel::Log => info!(target: "drift::engine", "{message}"),
                    LogLevel::Warn => warn!(target: "drift::engine", "{message}"),
                    LogLevel::Error => error!(target: "drift::engine", "{message}"),
                }
                None
            }
            other => {
                debug!(kind = other.kind(), "Ignoring message not addressed to the controller");
                Some(Response::Ack(Ack::error(format!(
                    "{} is not handled by the controller",
                    other.kind()
                ))))
            }
        }
    }

    pub fn handle_browser_event(&mut self, event: BrowserEvent) {
        match event {
            BrowserEvent::TabActivated { tab_id } => self.on_tab_activated(tab_id),
            BrowserEvent::FocusChanged { focused } => self.set_browser_focused(focused),
        }
    }

    /// Count a switch only when the activated tab differs from the previous one
    pub fn on_tab_activated(&mut self, tab_id: u64) {
        if matches!(self.state.last_active_tab, Some(prev) if prev != tab_id) {
            self.state.tab_switch_count = self.state.tab_switch_count.saturating_add(1);
            debug!(count = self.state.tab_switch_count, "Tab switched");
        }
        self.state.last_active_tab = Some(tab_id);
    }

    /// Credit switches observed elsewhere (replayed samples carry their own count)
    pub fn add_tab_switches(&mut self, count: u32) {
        self.state.tab_switch_count = self.state.tab_switch_count.saturating_add(count);
    }

    pub fn set_browser_focused(&mut self, focused: bool) {
        if self.state.browser_focused != focused {
            info!(focused, "Browser focus changed");
        }
        self.state.browser_focused = focused;
    }

    /// Advance the pipeline by one scheduler tick
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        self.stats.ticks += 1;

        if self.config.skip_when_away && !self.state.browser_focused {
            self.state.tab_switch_count = 0;
            info!("User away, skipping analysis");
            return self.skipped(SkipReason::UserAway);
        }

        let sample = self
            .state
            .latest_sample
            .take()
            .unwrap_or_else(|| BehaviorSample::empty(now));
        let tab_switches = std::mem::take(&mut self.state.tab_switch_count);

        let vector = FeatureNormalizer::normalize(&sample, tab_switches);
        self.state.window.push(vector);
        if let Err(e) = self.persisted.save_feature_window(&self.state.window.to_vec()) {
            self.persistence_failed("feature window", &e);
        }

        debug!(
            tab_switches,
            scroll_velocity = sample.scroll_velocity_avg,
            window = self.state.window.len(),
            engine_ready = self.state.engine_ready,
            "Tick features"
        );

        if !self.state.window.is_full() {
            info!(
                have = self.state.window.len(),
                need = self.state.window.capacity(),
                "Collecting data"
            );
            return self.skipped(SkipReason::CollectingWindow {
                have: self.state.window.len(),
                need: self.state.window.capacity(),
            });
        }
        if !self.state.engine_ready {
            info!("Model not ready yet, skipping prediction");
            return self.skipped(SkipReason::EngineNotReady);
        }

        let flags = ActivityFlags::from_sample(&sample);
        let score = match self.engine.predict_with_flags(self.state.window.to_vec(), flags).await {
            Ok(score) => score,
            Err(DriftError::EngineNotReady) => {
                self.state.engine_ready = false;
                return self.skipped(SkipReason::EngineNotReady);
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(error = %e, "Prediction skipped");
                } else {
                    error!(error = %e, "Prediction failed");
                }
                self.stats.predict_failures += 1;
                return self.skipped(SkipReason::PredictFailed {
                    error: e.to_string(),
                });
            }
        };

        let scored = self.apply_score(ScoreResult::new(score, now), &sample, tab_switches);
        TickOutcome::Scored(scored)
    }

    fn apply_score(
        &mut self,
        result: ScoreResult,
        sample: &BehaviorSample,
        tab_switches: u32,
    ) -> ScoredTick {
        match self.persisted.sensitivity() {
            Ok(sensitivity) => self.state.sensitivity = sensitivity,
            Err(e) => self.persistence_failed("sensitivity", &e),
        }
        let sensitivity = self.state.sensitivity;
        let threshold = sensitivity.threshold();

        let entry = HistoryEntry::from_score(&result, sample, tab_switches);
        if let Err(e) = self.persisted.append_history(entry) {
            self.persistence_failed("history", &e);
        }

        self.cooldown.tick();
        let mut streak_broken = false;
        let mut fired = false;
        let mut suppressed = false;

        if result.score < threshold {
            self.state.streak = self.state.streak.saturating_add(1);
            self.state.focus_state = FocusState::Focused;
            info!(score = result.score, threshold, streak = self.state.streak, "User is focused");
        } else {
            if self.state.streak > 0 {
                info!(previous = self.state.streak, "Focus streak broken");
                streak_broken = true;
            }
            self.state.streak = 0;
            self.state.focus_state = FocusState::Distracted;
            warn!(score = result.score, threshold, "High distraction detected");

            if self.cooldown.admit() {
                fired = self.dispatch(result.score, result.timestamp);
            } else {
                suppressed = true;
                self.stats.suppressed_interventions += 1;
                info!(score = result.score, "Intervention suppressed by cooldown");
            }
        }

        if let Err(e) = self.persisted.save_streak(self.state.streak) {
            self.persistence_failed("streak", &e);
        }

        self.stats.scored += 1;
        ScoredTick {
            timestamp: result.timestamp,
            score: result.score,
            threshold,
            sensitivity,
            state: self.state.focus_state,
            streak: self.state.streak,
            streak_broken,
            intervention_fired: fired,
            intervention_suppressed: suppressed,
        }
    }

    fn dispatch(&mut self, score: f64, now: DateTime<Utc>) -> bool {
        let intervention = Intervention::new(score, now);
        match self.notifier.notify(&intervention) {
            Ok(()) => {
                self.stats.interventions += 1;
                true
            }
            Err(e) => {
                warn!(error = %e, "Intervention could not be delivered");
                false
            }
        }
    }

    fn skipped(&mut self, reason: SkipReason) -> TickOutcome {
        self.stats.skipped += 1;
        TickOutcome::Skipped(reason)
    }

    fn persistence_failed(&mut self, what: &str, e: &DriftError) {
        warn!(error = %e, "Could not persist {what}");
        self.stats.persistence_failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::ScriptedLoader;
    use crate::engine::{ModelLoader, RuleLoader};
    use crate::store::MemoryStore;
    use crate::transport::{spawn_engine, Inbound, MessageSender};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<f64>>>);

    impl Recording {
        fn scores(&self) -> Vec<f64> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Notifier for Recording {
        fn notify(&self, intervention: &Intervention) -> Result<(), DriftError> {
            self.0.lock().unwrap().push(intervention.score);
            Ok(())
        }
    }

    struct Harness {
        controller: InterventionController<Arc<MemoryStore>>,
        notified: Recording,
        store: Arc<MemoryStore>,
        _inbox: mpsc::Receiver<Inbound>,
    }

    async fn harness(
        loader: impl ModelLoader + 'static,
        config: ControllerConfig,
        store: Arc<MemoryStore>,
        load: bool,
    ) -> Harness {
        let (events, mut inbox) = MessageSender::channel(16);
        let link = spawn_engine(
            Arc::new(loader),
            config.window_size,
            Duration::from_secs(2),
            events,
        );
        let notified = Recording::default();
        let mut controller = InterventionController::new(
            config,
            PersistedState::new(Arc::clone(&store), 1000),
            link.client.clone(),
            Box::new(notified.clone()),
        );

        if load {
            link.client.load_model().await.unwrap();
            loop {
                let inbound = inbox.recv().await.unwrap();
                let ready = matches!(inbound.message, Message::ModelReady { .. });
                controller.handle_message(inbound.message);
                if ready {
                    break;
                }
            }
        }

        Harness {
            controller,
            notified,
            store,
            _inbox: inbox,
        }
    }

    fn config(window_size: usize) -> ControllerConfig {
        ControllerConfig {
            window_size,
            ..ControllerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_all_zero_window_at_balanced_is_focused() {
        let mut h = harness(RuleLoader::default(), config(10), Arc::new(MemoryStore::new()), true).await;

        for i in 0..9 {
            let outcome = h.controller.tick(Utc::now()).await;
            assert_eq!(
                outcome,
                TickOutcome::Skipped(SkipReason::CollectingWindow { have: i + 1, need: 10 })
            );
        }

        let outcome = h.controller.tick(Utc::now()).await;
        let scored = outcome.scored().expect("tenth tick scores");
        assert_eq!(scored.score, 0.0);
        assert!(scored.score < 0.6);
        assert_eq!(scored.state, FocusState::Focused);
        assert_eq!(scored.streak, 1);
        assert!(!scored.intervention_fired);
        assert!(h.notified.scores().is_empty());
    }

    #[tokio::test]
    async fn test_sensitivity_change_applies_next_tick() {
        let mut h = harness(ScriptedLoader::constant(0.55), config(1), Arc::new(MemoryStore::new()), true).await;

        let first = h.controller.tick(Utc::now()).await;
        assert_eq!(first.scored().unwrap().state, FocusState::Focused);
        assert_eq!(first.scored().unwrap().threshold, 0.6);

        h.controller.persisted().save_sensitivity(Sensitivity::High).unwrap();

        let second = h.controller.tick(Utc::now()).await;
        let scored = second.scored().unwrap();
        assert_eq!(scored.threshold, 0.4);
        assert_eq!(scored.state, FocusState::Distracted);
        assert!(scored.intervention_fired);
        assert_eq!(h.notified.scores(), vec![0.55]);
    }

    #[tokio::test]
    async fn test_streak_counts_and_resets() {
        let loader = ScriptedLoader::sequence(
            vec![Ok(0.1), Ok(0.2), Ok(0.3), Ok(0.6), Ok(0.1)],
            0.1,
        );
        let mut h = harness(loader, config(1), Arc::new(MemoryStore::new()), true).await;

        let mut streaks = Vec::new();
        let mut broken = Vec::new();
        for _ in 0..5 {
            let outcome = h.controller.tick(Utc::now()).await;
            let scored = outcome.scored().unwrap().clone();
            streaks.push(scored.streak);
            broken.push(scored.streak_broken);
        }

        // 0.6 is exactly the balanced threshold and counts as distracted
        assert_eq!(streaks, vec![1, 2, 3, 0, 1]);
        assert_eq!(broken, vec![false, false, false, true, false]);
        assert_eq!(h.notified.scores(), vec![0.6]);
        assert_eq!(h.controller.persisted().streak().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_engine_not_ready_skips_without_history() {
        let mut h = harness(RuleLoader::default(), config(2), Arc::new(MemoryStore::new()), false).await;

        h.controller.tick(Utc::now()).await;
        let outcome = h.controller.tick(Utc::now()).await;
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::EngineNotReady));
        assert_eq!(h.controller.state().window.len(), 2);
        assert!(h.controller.persisted().history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_predict_failure_is_skipped_and_counted() {
        let loader = ScriptedLoader::sequence(vec![Err("backend crashed".into())], 0.2);
        let mut h = harness(loader, config(1), Arc::new(MemoryStore::new()), true).await;

        let outcome = h.controller.tick(Utc::now()).await;
        assert!(matches!(outcome, TickOutcome::Skipped(SkipReason::PredictFailed { .. })));
        assert!(h.controller.persisted().history().unwrap().is_empty());
        assert_eq!(h.controller.stats().predict_failures, 1);

        // Next tick proceeds independently
        assert!(h.controller.tick(Utc::now()).await.scored().is_some());
    }

    #[tokio::test]
    async fn test_history_entry_records_sample_and_tab_switches() {
        let mut h = harness(ScriptedLoader::constant(0.3), config(1), Arc::new(MemoryStore::new()), true).await;

        let mut sample = BehaviorSample::empty(Utc::now());
        sample.scroll_velocity_avg = 80.0;
        sample.backspace_count = 3;
        h.controller.handle_message(Message::BehaviorUpdate { payload: sample });
        for tab in [1, 1, 2, 3, 3] {
            h.controller.on_tab_activated(tab);
        }
        assert_eq!(h.controller.state().tab_switch_count, 2);

        h.controller.tick(Utc::now()).await;
        assert_eq!(h.controller.state().tab_switch_count, 0);
        assert!(h.controller.state().latest_sample.is_none());

        let history = h.controller.persisted().history().unwrap();
        let entry = history.iter().last().unwrap();
        assert_eq!(entry.tab_switch_count, 2);
        assert_eq!(entry.scroll_velocity, 80.0);
        assert_eq!(entry.backspace_count, 3);
        assert!((entry.distraction_score - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_away_ticks_are_skipped_and_reset_tabs() {
        let mut h = harness(ScriptedLoader::constant(0.3), config(1), Arc::new(MemoryStore::new()), true).await;

        h.controller.on_tab_activated(1);
        h.controller.on_tab_activated(2);
        h.controller.handle_browser_event(BrowserEvent::FocusChanged { focused: false });

        let outcome = h.controller.tick(Utc::now()).await;
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::UserAway));
        assert_eq!(h.controller.state().tab_switch_count, 0);
        assert!(h.controller.state().window.is_empty());

        h.controller.handle_browser_event(BrowserEvent::FocusChanged { focused: true });
        assert!(h.controller.tick(Utc::now()).await.scored().is_some());
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_repeat_interventions() {
        let config = ControllerConfig {
            window_size: 1,
            intervention_cooldown_ticks: 2,
            skip_when_away: true,
        };
        let mut h = harness(ScriptedLoader::constant(0.9), config, Arc::new(MemoryStore::new()), true).await;

        let mut fired = Vec::new();
        for _ in 0..4 {
            let outcome = h.controller.tick(Utc::now()).await;
            let scored = outcome.scored().unwrap();
            assert_eq!(scored.state, FocusState::Distracted);
            fired.push(scored.intervention_fired);
        }

        assert_eq!(fired, vec![true, false, true, false]);
        assert_eq!(h.controller.stats().suppressed_interventions, 2);
        assert_eq!(h.controller.persisted().history().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_window_and_streak_survive_restart() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut h = harness(ScriptedLoader::constant(0.1), config(3), Arc::clone(&store), true).await;
            for _ in 0..4 {
                h.controller.tick(Utc::now()).await;
            }
            assert_eq!(h.controller.state().streak, 2);
        }

        let mut h = harness(ScriptedLoader::constant(0.1), config(3), store, true).await;
        assert!(h.controller.state().window.is_full());
        assert_eq!(h.controller.state().streak, 2);

        // No cold start: the first tick after restart scores
        let outcome = h.controller.tick(Utc::now()).await;
        assert_eq!(outcome.scored().unwrap().streak, 3);
        assert_eq!(h.store.get_raw("focusMinutes").unwrap().unwrap(), b"3");
    }

    #[tokio::test]
    async fn test_demo_trigger_bypasses_history() {
        let mut h = harness(RuleLoader::default(), config(10), Arc::new(MemoryStore::new()), false).await;

        let response = h.controller.handle_message(Message::DemoTriggerNotification);
        assert_eq!(
            response,
            Some(Response::Ack(Ack::new(AckStatus::NotificationTriggered)))
        );
        assert_eq!(h.notified.scores(), vec![DEMO_INTERVENTION_SCORE]);
        assert!(h.controller.persisted().history().unwrap().is_empty());
        assert_eq!(h.controller.state().streak, 0);
    }

    #[tokio::test]
    async fn test_model_ready_error_keeps_engine_unready() {
        let mut h = harness(RuleLoader::default(), config(1), Arc::new(MemoryStore::new()), false).await;

        h.controller.handle_message(Message::model_failed("weights missing"));
        assert!(!h.controller.state().engine_ready);

        h.controller.handle_message(Message::model_ready("rule-v1"));
        assert!(h.controller.state().engine_ready);
        assert_eq!(h.controller.state().model_version.as_deref(), Some("rule-v1"));
    }

    #[tokio::test]
    async fn test_behavior_update_is_acknowledged() {
        let mut h = harness(RuleLoader::default(), config(1), Arc::new(MemoryStore::new()), false).await;
        let response = h.controller.handle_message(Message::BehaviorUpdate {
            payload: BehaviorSample::empty(Utc::now()),
        });
        assert_eq!(response, Some(Response::Ack(Ack::new(AckStatus::Received))));
        assert!(h.controller.handle_message(Message::OffscreenLog {
            log_type: LogLevel::Warn,
            message: "slow backend".into(),
        })
        .is_none());
    }
}
