//! Cross-context message protocol
//!
//! Every message is a JSON object tagged by `type`. Sensors, the controller and the
//! isolated scoring context share no memory; these payloads are all they exchange.
//!
//! ```text
//! BEHAVIOR_UPDATE { payload }        -> { status: "received" }
//! LOAD_MODEL {}                      -> { status: "initiated" | "success" | "error", error? }
//! PREDICT { data: FeatureVector[] }  -> { status: "success", score } | { status: "error", error }
//! CHECK_STATUS {}                    -> { isReady, isLoading }
//! MODEL_READY { status, version?, error? }   (engine -> controller, unsolicited)
//! TRIGGER_INTERVENTION { score }             (controller -> UI, unsolicited)
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{ActivityFlags, BehaviorSample, FeatureVector};

/// A message crossing an execution-context boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    BehaviorUpdate {
        payload: BehaviorSample,
    },
    LoadModel,
    Predict {
        data: Vec<FeatureVector>,
        #[serde(default, skip_serializing_if = "ActivityFlags::is_quiet")]
        flags: ActivityFlags,
    },
    ModelReady {
        status: ReadyStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    TriggerIntervention {
        score: f64,
    },
    CheckStatus,
    /// Fire an intervention immediately, bypassing scoring
    DemoTriggerNotification,
    /// Log line forwarded out of the scoring context
    OffscreenLog {
        #[serde(rename = "logType")]
        log_type: LogLevel,
        message: String,
    },
}

impl Message {
    /// Wire name of the message type, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Message::BehaviorUpdate { .. } => "BEHAVIOR_UPDATE",
            Message::LoadModel => "LOAD_MODEL",
            Message::Predict { .. } => "PREDICT",
            Message::ModelReady { .. } => "MODEL_READY",
            Message::TriggerIntervention { .. } => "TRIGGER_INTERVENTION",
            Message::CheckStatus => "CHECK_STATUS",
            Message::DemoTriggerNotification => "DEMO_TRIGGER_NOTIFICATION",
            Message::OffscreenLog { .. } => "OFFSCREEN_LOG",
        }
    }

    pub fn model_ready(version: impl Into<String>) -> Self {
        Message::ModelReady {
            status: ReadyStatus::Success,
            version: Some(version.into()),
            error: None,
        }
    }

    pub fn model_failed(error: impl Into<String>) -> Self {
        Message::ModelReady {
            status: ReadyStatus::Error,
            version: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Warn,
    Error,
}

/// A request paired with the id its response will carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub request_id: u64,
    #[serde(flatten)]
    pub message: Message,
}

/// A response routed back by request id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub request_id: u64,
    pub response: Response,
}

/// Any response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Status(StatusResponse),
    Predict(PredictResponse),
    Ack(Ack),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Received,
    Initiated,
    Success,
    Error,
    NotificationTriggered,
}

/// Plain acknowledgement (`BEHAVIOR_UPDATE`, `LOAD_MODEL`, demo trigger)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn new(status: AckStatus) -> Self {
        Self { status, error: None }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            error: Some(error.into()),
        }
    }
}

/// `PREDICT` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PredictResponse {
    Success { score: f64 },
    Error { error: String },
}

/// `CHECK_STATUS` result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_ready: bool,
    pub is_loading: bool,
}
