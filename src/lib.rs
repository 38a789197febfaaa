//! Drift - Passive focus tracking from browser interaction signals
//!
//! Drift turns scroll, pointer, typing and tab-switch activity into a distraction
//! score and prompts a break when focus slips: sensor sampling → normalization →
//! sliding window → scoring engine → intervention controller → history.
//!
//! ## Modules
//!
//! - **Sensing**: per-tab accumulators flushed into [`BehaviorSample`]s
//! - **Scoring**: a load-stateful engine behind a request/response transport
//! - **Control**: the tick-driven controller, its scheduler, and persisted state
//! - **Analytics**: read-only summaries over the scored history

pub mod analytics;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod history;
pub mod intervention;
pub mod logging;
pub mod normalizer;
pub mod protocol;
pub mod scheduler;
pub mod sensor;
pub mod store;
pub mod transport;
pub mod types;
pub mod window;

pub use config::DriftConfig;
pub use controller::{BrowserEvent, ControllerConfig, InterventionController, TickOutcome};
pub use engine::{ModelLoader, Predictor, ScoringEngine};
pub use error::DriftError;
pub use normalizer::FeatureNormalizer;
pub use protocol::{Message, Response};
pub use scheduler::BackgroundService;
pub use sensor::{BehaviorSensor, SensorEvent};
pub use store::{KeyValueStore, MemoryStore, PersistedState, SledStore};
pub use transport::{spawn_engine, EngineClient, MessageSender};
pub use types::{BehaviorSample, FeatureVector, FocusState, HistoryEntry, Sensitivity};
pub use window::FeatureWindow;

/// Crate version, reported by the CLI and in logs
pub const DRIFT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name used in log and report output
pub const PRODUCER_NAME: &str = "drift-focus";
