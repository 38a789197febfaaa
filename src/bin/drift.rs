//! Drift CLI - Command-line interface for the Drift focus pipeline
//!
//! Commands:
//! - replay: Score recorded behavior samples (batch mode)
//! - run: Serve the live pipeline from NDJSON sensor/browser events on stdin
//! - report: Summarize the persisted focus history
//! - sensitivity: Show or change the intervention sensitivity
//! - clear: Delete the persisted focus history
//! - doctor: Diagnose configuration, storage and model health

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::io::{AsyncBufReadExt, BufReader as AsyncBufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use drift_focus::analytics::build_report;
use drift_focus::engine::select_loader;
use drift_focus::intervention::{ChannelNotifier, FanoutNotifier, TracingNotifier};
use drift_focus::logging::init_tracing;
use drift_focus::sensor::run_sensor;
use drift_focus::transport::Inbound;
use drift_focus::{
    spawn_engine, BackgroundService, BehaviorSample, BehaviorSensor, BrowserEvent, DriftConfig,
    DriftError, InterventionController, KeyValueStore, MemoryStore, Message, MessageSender,
    PersistedState, SensorEvent, Sensitivity, SledStore, DRIFT_VERSION, PRODUCER_NAME,
};

const INBOX_CAPACITY: usize = 64;
const MODEL_READY_WAIT: Duration = Duration::from_secs(30);

/// Drift - Passive focus tracking with gentle break prompts
#[derive(Parser)]
#[command(name = "drift")]
#[command(version = DRIFT_VERSION)]
#[command(about = "Infer focus from interaction signals and prompt breaks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score recorded behavior samples, one tick per input line
    Replay {
        /// NDJSON file of behavior samples or BEHAVIOR_UPDATE messages (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Sensitivity used for the replay (low, balanced, high)
        #[arg(long)]
        sensitivity: Option<Sensitivity>,

        /// Feature window length
        #[arg(long)]
        window_size: Option<usize>,

        /// Windowed model weights file; the rule scorer is used when omitted
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Run the live pipeline over NDJSON sensor and browser events from stdin
    Run {
        /// Persistent store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Windowed model weights file
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Summarize the persisted focus history
    Report {
        /// Persistent store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change the intervention sensitivity
    Sensitivity {
        /// New level (low, balanced, high); prints the current one when omitted
        level: Option<Sensitivity>,

        /// Persistent store directory
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Delete the persisted focus history
    Clear {
        /// Persistent store directory
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Diagnose configuration, storage and model health
    Doctor {
        /// Persistent store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Windowed model weights file
        #[arg(long)]
        model: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// One replay input line
#[derive(Debug)]
enum ReplayRecord {
    Message(Message),
    Browser(BrowserEvent),
    Sample(BehaviorSample),
}

/// Classify a replay line by its discriminating key.
///
/// `type` marks a protocol message and `kind` a browser event. A bare sample must carry
/// its `timestamp`, so empty objects and misspelled messages are rejected instead of
/// replaying as idle samples.
fn parse_replay_line(line: &str) -> Result<ReplayRecord, String> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let Some(object) = value.as_object() else {
        return Err("expected a JSON object".to_string());
    };

    if object.contains_key("type") {
        serde_json::from_value(value)
            .map(ReplayRecord::Message)
            .map_err(|e| format!("message: {e}"))
    } else if object.contains_key("kind") {
        serde_json::from_value(value)
            .map(ReplayRecord::Browser)
            .map_err(|e| format!("browser event: {e}"))
    } else if object.contains_key("timestamp") {
        serde_json::from_value(value)
            .map(ReplayRecord::Sample)
            .map_err(|e| format!("sample: {e}"))
    } else {
        Err("expected a message (type), browser event (kind) or sample (timestamp)".to_string())
    }
}

/// One live input line
#[derive(Deserialize)]
#[serde(untagged)]
enum LiveEvent {
    Sensor(SensorEvent),
    Browser(BrowserEvent),
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DriftCliError> {
    let mut config = DriftConfig::from_env();

    match cli.command {
        Commands::Replay {
            input,
            sensitivity,
            window_size,
            model,
        } => {
            if let Some(size) = window_size {
                config.window_size = size;
            }
            if model.is_some() {
                config.model_path = model;
            }
            config.validate()?;
            init_tracing(&config.logging())?;
            runtime()?.block_on(cmd_replay(&input, sensitivity, &config))
        }
        Commands::Run { store, model } => {
            apply_store(&mut config, store);
            if model.is_some() {
                config.model_path = model;
            }
            config.validate()?;
            init_tracing(&config.logging())?;
            runtime()?.block_on(cmd_run(&config))
        }
        Commands::Report { store, json } => {
            apply_store(&mut config, store);
            cmd_report(&config, json)
        }
        Commands::Sensitivity { level, store } => {
            apply_store(&mut config, store);
            cmd_sensitivity(&config, level)
        }
        Commands::Clear { store } => {
            apply_store(&mut config, store);
            cmd_clear(&config)
        }
        Commands::Doctor { store, model, json } => {
            apply_store(&mut config, store);
            if model.is_some() {
                config.model_path = model;
            }
            cmd_doctor(&config, json)
        }
    }
}

fn apply_store(config: &mut DriftConfig, store: Option<PathBuf>) {
    if let Some(path) = store {
        config.store_path = path.to_string_lossy().into_owned();
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, DriftCliError> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

fn open_persisted(config: &DriftConfig) -> Result<PersistedState<SledStore>, DriftCliError> {
    let store = SledStore::open(&config.store_path)?;
    Ok(PersistedState::new(store, config.history_capacity))
}

/// Feed inbox messages to the controller until the engine reports in
async fn await_model_ready<S: KeyValueStore>(
    controller: &mut InterventionController<S>,
    inbox: &mut mpsc::Receiver<Inbound>,
) -> Result<(), DriftCliError> {
    let wait = async {
        while let Some(inbound) = inbox.recv().await {
            let is_ready = matches!(inbound.message, Message::ModelReady { .. });
            controller.handle_message(inbound.message);
            if is_ready {
                return;
            }
        }
    };
    tokio::time::timeout(MODEL_READY_WAIT, wait)
        .await
        .map_err(|_| DriftError::Timeout(format!("no MODEL_READY after {:?}", MODEL_READY_WAIT)))?;

    if controller.state().engine_ready {
        Ok(())
    } else {
        Err(DriftCliError::ModelUnavailable)
    }
}

async fn cmd_replay(
    input: &Path,
    sensitivity: Option<Sensitivity>,
    config: &DriftConfig,
) -> Result<(), DriftCliError> {
    let persisted = PersistedState::new(MemoryStore::new(), config.history_capacity);
    if let Some(level) = sensitivity {
        persisted.save_sensitivity(level)?;
    }

    let (events, mut inbox) = MessageSender::channel(INBOX_CAPACITY);
    let link = spawn_engine(
        select_loader(config.model_path.as_deref()),
        config.window_size,
        config.predict_timeout(),
        events,
    );
    let mut controller = InterventionController::new(
        config.controller(),
        persisted,
        link.client.clone(),
        Box::new(TracingNotifier),
    );

    link.client.load_model().await?;
    await_model_ready(&mut controller, &mut inbox).await?;

    let reader: Box<dyn BufRead> = if input.to_str() == Some("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(input)?))
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut ticks = 0usize;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_replay_line(&line)
            .map_err(|e| DriftCliError::ParseError(format!("Line {}: {}", line_num + 1, e)))?;

        let sample = match record {
            ReplayRecord::Sample(sample) => sample,
            ReplayRecord::Message(Message::BehaviorUpdate { payload }) => payload,
            ReplayRecord::Message(other) => {
                controller.handle_message(other);
                continue;
            }
            ReplayRecord::Browser(event) => {
                controller.handle_browser_event(event);
                continue;
            }
        };

        let at = sample.timestamp;
        controller.add_tab_switches(sample.tab_switch_count);
        controller.handle_message(Message::BehaviorUpdate { payload: sample });
        let outcome = controller.tick(at).await;
        writeln!(out, "{}", serde_json::to_string(&outcome)?)?;
        ticks += 1;
    }
    out.flush()?;

    if ticks == 0 {
        return Err(DriftCliError::NoSamples);
    }
    let stats = controller.stats();
    info!(
        ticks = stats.ticks,
        scored = stats.scored,
        interventions = stats.interventions,
        "Replay finished"
    );
    Ok(())
}

async fn cmd_run(config: &DriftConfig) -> Result<(), DriftCliError> {
    let persisted = open_persisted(config)?;

    let (inbox_tx, inbox) = MessageSender::channel(INBOX_CAPACITY);
    let (browser_tx, browser_rx) = mpsc::channel(INBOX_CAPACITY);
    let (sensor_tx, sensor_rx) = mpsc::channel(INBOX_CAPACITY);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let link = spawn_engine(
        select_loader(config.model_path.as_deref()),
        config.window_size,
        config.predict_timeout(),
        inbox_tx.clone(),
    );

    // UI surface: interventions are written to stdout as TRIGGER_INTERVENTION lines
    let surface = ChannelNotifier::new(16);
    let prompts = surface.subscribe();
    let notifier = FanoutNotifier::new().with(TracingNotifier).with(surface);
    let printer = tokio::spawn(forward_prompts(prompts, io::stdout()));

    let controller =
        InterventionController::new(config.controller(), persisted, link.client.clone(), Box::new(notifier));
    let service = BackgroundService::new(controller, inbox, browser_rx, config.tick_interval());
    let service = tokio::spawn(service.run(shutdown_tx.subscribe()));

    let sensor = tokio::spawn(run_sensor(
        BehaviorSensor::new(),
        sensor_rx,
        inbox_tx,
        config.sensor(),
        shutdown_tx.subscribe(),
    ));

    info!(version = DRIFT_VERSION, store = %config.store_path, "Drift running, reading events from stdin");

    let mut lines = AsyncBufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match serde_json::from_str::<LiveEvent>(&line) {
                    Ok(LiveEvent::Sensor(event)) => {
                        if sensor_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(LiveEvent::Browser(event)) => {
                        if browser_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Ignoring unrecognized input line"),
                },
                None => {
                    info!("Input closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    drop(sensor_tx);
    if sensor.await.is_err() {
        warn!("Sensor task ended abnormally");
    }
    let _ = shutdown_tx.send(());

    let controller = service
        .await
        .map_err(|e| DriftCliError::ParseError(format!("service task: {e}")))?;
    printer.abort();

    let stats = controller.stats();
    info!(
        ticks = stats.ticks,
        scored = stats.scored,
        interventions = stats.interventions,
        "Drift stopped"
    );
    controller.persisted().store().flush()?;
    Ok(())
}

/// Write each prompt as one NDJSON line until the notifier is dropped.
///
/// A slow writer that falls behind skips the overwritten prompts and keeps going.
async fn forward_prompts<W: Write>(mut prompts: broadcast::Receiver<Message>, mut out: W) -> W {
    loop {
        match prompts.recv().await {
            Ok(message) => {
                let written = serde_json::to_string(&message)
                    .map_err(io::Error::from)
                    .and_then(|line| writeln!(out, "{line}").and_then(|_| out.flush()));
                if let Err(e) = written {
                    warn!(error = %e, "Could not write intervention");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Prompt output fell behind, dropped interventions");
            }
            Err(RecvError::Closed) => break,
        }
    }
    out
}

fn cmd_report(config: &DriftConfig, json: bool) -> Result<(), DriftCliError> {
    let persisted = open_persisted(config)?;
    let history = persisted.history()?.into_vec();
    let streak = persisted.streak()?;
    let report = build_report(&history, streak, &Local::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let name = persisted
        .user_profile()?
        .map(|profile| profile.preferred)
        .filter(|name| !name.trim().is_empty());

    println!("Drift Focus Report");
    println!("==================");
    if let Some(name) = name {
        println!("User:          {name}");
    }
    println!("Entries:       {}", report.entries);
    println!("Streak:        {} min", report.streak_minutes);
    println!("Today:         {}% focus", report.daily_average);
    println!(
        "Status:        {} ({:.0}%)",
        report.current.status.label(),
        report.current.average_focus * 100.0
    );
    println!("Sweet spot:    {} min", report.sweet_spot_minutes);
    match &report.peak {
        Some(peak) => println!("Peak:          {}", peak.label),
        None => println!("Peak:          not enough data"),
    }
    println!("\nLast 7 days:");
    for day in &report.last_7_days {
        println!("  {} {} {:>3.0}%", day.date, day.label, day.percent);
    }
    Ok(())
}

fn cmd_sensitivity(config: &DriftConfig, level: Option<Sensitivity>) -> Result<(), DriftCliError> {
    let persisted = open_persisted(config)?;
    let level = match level {
        Some(level) => {
            persisted.save_sensitivity(level)?;
            persisted.store().flush()?;
            level
        }
        None => persisted.sensitivity()?,
    };
    println!("{level} (threshold {:.1})", level.threshold());
    Ok(())
}

fn cmd_clear(config: &DriftConfig) -> Result<(), DriftCliError> {
    let persisted = open_persisted(config)?;
    let removed = persisted.history()?.len();
    persisted.clear_history()?;
    persisted.store().flush()?;
    println!("Cleared {removed} history entries");
    Ok(())
}

fn cmd_doctor(config: &DriftConfig, json: bool) -> Result<(), DriftCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "drift_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Drift version {}", DRIFT_VERSION),
    });

    checks.push(match config.validate() {
        Ok(()) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Alarm every {}s, window of {} ticks, history cap {}",
                config.alarm_interval_secs, config.window_size, config.history_capacity
            ),
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    checks.push(if !Path::new(&config.store_path).exists() {
        DoctorCheck {
            name: "store".to_string(),
            status: CheckStatus::Warning,
            message: format!("Store {} does not exist yet", config.store_path),
        }
    } else {
        match open_persisted(config).and_then(|p| Ok((p.history()?.len(), p.sensitivity()?))) {
            Ok((entries, sensitivity)) => DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} history entries, sensitivity {}", entries, sensitivity),
            },
            Err(e) => DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read store: {}", CliError::from(e).message),
            },
        }
    });

    let loader = select_loader(config.model_path.as_deref());
    checks.push(match loader.load() {
        Ok(predictor) => DoctorCheck {
            name: "model".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} loaded as {}", loader.describe(), predictor.version()),
        },
        Err(e) => DoctorCheck {
            name: "model".to_string(),
            status: CheckStatus::Error,
            message: format!("{} failed: {}", loader.describe(), e),
        },
    });

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (event stream ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: DRIFT_VERSION.to_string(),
        checked_at: Utc::now().to_rfc3339(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Drift Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(DriftCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error handling

#[derive(Debug)]
enum DriftCliError {
    Io(io::Error),
    Drift(DriftError),
    Json(serde_json::Error),
    ParseError(String),
    ModelUnavailable,
    NoSamples,
    DoctorFailed,
}

impl From<io::Error> for DriftCliError {
    fn from(e: io::Error) -> Self {
        DriftCliError::Io(e)
    }
}

impl From<DriftError> for DriftCliError {
    fn from(e: DriftError) -> Self {
        DriftCliError::Drift(e)
    }
}

impl From<serde_json::Error> for DriftCliError {
    fn from(e: serde_json::Error) -> Self {
        DriftCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DriftCliError> for CliError {
    fn from(e: DriftCliError) -> Self {
        match e {
            DriftCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DriftCliError::Drift(DriftError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Check DRIFT_* environment variables".to_string()),
            },
            DriftCliError::Drift(DriftError::Persistence(msg)) => CliError {
                code: "STORE_ERROR".to_string(),
                message: msg,
                hint: Some("Make sure no other drift process holds the store".to_string()),
            },
            DriftCliError::Drift(e) => CliError {
                code: "PIPELINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            DriftCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            DriftCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be a behavior sample or a tagged message".to_string()),
            },
            DriftCliError::ModelUnavailable => CliError {
                code: "MODEL_UNAVAILABLE".to_string(),
                message: "Scoring engine failed to load".to_string(),
                hint: Some("Run 'drift doctor' to check the model file".to_string()),
            },
            DriftCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No behavior samples found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            DriftCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checked_at: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_line_kinds() {
        let sample = parse_replay_line(r#"{"scrollVelocityAvg":120.5,"timestamp":1717000000000}"#).unwrap();
        match sample {
            ReplayRecord::Sample(sample) => assert_eq!(sample.scroll_velocity_avg, 120.5),
            other => panic!("expected sample, got {other:?}"),
        }

        let update = parse_replay_line(r#"{"type":"BEHAVIOR_UPDATE","payload":{"timestamp":1717000000000}}"#).unwrap();
        assert!(matches!(update, ReplayRecord::Message(Message::BehaviorUpdate { .. })));

        let browser = parse_replay_line(r#"{"kind":"focus_changed","focused":false}"#).unwrap();
        assert!(matches!(browser, ReplayRecord::Browser(BrowserEvent::FocusChanged { focused: false })));
    }

    #[test]
    fn test_replay_rejects_untyped_or_misspelled_lines() {
        assert!(parse_replay_line("{}").is_err());
        assert!(parse_replay_line(r#"{"scrollVelocityAvg":50}"#).is_err());
        assert!(parse_replay_line("[1,2]").is_err());

        let err = parse_replay_line(r#"{"type":"BEHAVIOR_UPDAT","payload":{"timestamp":1}}"#).unwrap_err();
        assert!(err.starts_with("message:"), "{err}");

        let err = parse_replay_line(r#"{"kind":"tab_activatd","tabId":3}"#).unwrap_err();
        assert!(err.starts_with("browser event:"), "{err}");
    }

    #[tokio::test]
    async fn test_prompt_forwarding_survives_lag() {
        let (tx, rx) = broadcast::channel(1);
        for score in [0.7, 0.8, 0.9] {
            tx.send(Message::TriggerIntervention { score }).unwrap();
        }
        drop(tx);

        let out = forward_prompts(rx, Vec::new()).await;
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let last: Message = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(last, Message::TriggerIntervention { score: 0.9 });
    }
}
