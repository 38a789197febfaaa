//! Cross-context transport
//!
//! Two channels of communication, both message-passing only:
//!
//! - [`MessageSender`]: fire-and-forget (or single reply) delivery into the controller's
//!   inbox. Used by sensors for `BEHAVIOR_UPDATE` and by the engine for unsolicited
//!   `MODEL_READY` / `OFFSCREEN_LOG`.
//! - [`EngineClient`] / [`EngineHost`]: request/response with the isolated scoring
//!   context. Requests carry an id; replies are routed back by id so several calls may
//!   be in flight and replies may arrive in any order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{LoadDecision, ModelLoader, Predictor, ScoringEngine};
use crate::error::DriftError;
use crate::protocol::{
    Ack, AckStatus, Envelope, LogLevel, Message, PredictResponse, Reply, Response, StatusResponse,
};
use crate::types::{ActivityFlags, FeatureVector};

/// Error string the engine returns for predictions before load completes
pub const MODEL_NOT_READY: &str = "Model not ready";

const CHANNEL_CAPACITY: usize = 64;

/// A message delivered to a receiving context, with an optional reply slot
#[derive(Debug)]
pub struct Inbound {
    pub message: Message,
    pub reply: Option<oneshot::Sender<Response>>,
}

/// Cloneable handle for sending messages into one receiving context
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<Inbound>,
}

impl MessageSender {
    pub fn new(tx: mpsc::Sender<Inbound>) -> Self {
        Self { tx }
    }

    /// Create a sender and the receiving end of its inbox
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Inbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Deliver without waiting for a reply.
    ///
    /// Fails with [`DriftError::TransportUnavailable`] when the receiver is gone or its
    /// inbox is full; callers are expected to drop the message, not retry.
    pub fn send(&self, message: Message) -> Result<(), DriftError> {
        let kind = message.kind();
        self.tx
            .try_send(Inbound { message, reply: None })
            .map_err(|e| DriftError::TransportUnavailable(format!("{kind}: {e}")))
    }

    /// Deliver and wait up to `timeout` for the reply
    pub async fn request(&self, message: Message, timeout: Duration) -> Result<Response, DriftError> {
        let kind = message.kind();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Inbound {
                message,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| DriftError::TransportUnavailable(format!("{kind}: receiver closed")))?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(DriftError::TransportUnavailable(format!(
                "{kind}: reply dropped"
            ))),
            Err(_) => Err(DriftError::Timeout(format!("{kind} after {timeout:?}"))),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

fn lock_pending(
    pending: &PendingMap,
) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Response>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Caller side of the scoring context
#[derive(Debug, Clone)]
pub struct EngineClient {
    requests: mpsc::Sender<Envelope>,
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
    timeout: Duration,
}

impl EngineClient {
    fn new(requests: mpsc::Sender<Envelope>, pending: PendingMap, timeout: Duration) -> Self {
        Self {
            requests,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
            timeout,
        }
    }

    /// Send one request and wait for the reply carrying the same id.
    ///
    /// A timed-out request is abandoned: its pending slot is removed and a late reply
    /// is discarded by the dispatcher.
    pub async fn call(&self, message: Message) -> Result<Response, DriftError> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let kind = message.kind();
        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(request_id, tx);

        if self
            .requests
            .send(Envelope { request_id, message })
            .await
            .is_err()
        {
            lock_pending(&self.pending).remove(&request_id);
            return Err(DriftError::TransportUnavailable(format!(
                "{kind}: scoring context is gone"
            )));
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(DriftError::TransportUnavailable(format!(
                "{kind}: reply channel closed"
            ))),
            Err(_) => {
                lock_pending(&self.pending).remove(&request_id);
                Err(DriftError::Timeout(format!(
                    "{kind} request {request_id} after {:?}",
                    self.timeout
                )))
            }
        }
    }

    /// `LOAD_MODEL`; `initiated` means the result arrives later as `MODEL_READY`
    pub async fn load_model(&self) -> Result<Ack, DriftError> {
        match self.call(Message::LoadModel).await? {
            Response::Ack(ack) => Ok(ack),
            Response::Predict(PredictResponse::Error { error }) => Ok(Ack::error(error)),
            other => Err(unexpected("LOAD_MODEL", &other)),
        }
    }

    /// `PREDICT` over a full window
    pub async fn predict(&self, window: Vec<FeatureVector>) -> Result<f64, DriftError> {
        self.predict_with_flags(window, ActivityFlags::default()).await
    }

    /// `PREDICT` with the newest sample's flags attached
    pub async fn predict_with_flags(
        &self,
        window: Vec<FeatureVector>,
        flags: ActivityFlags,
    ) -> Result<f64, DriftError> {
        match self.call(Message::Predict { data: window, flags }).await? {
            Response::Predict(PredictResponse::Success { score }) => Ok(score),
            Response::Predict(PredictResponse::Error { error }) if error == MODEL_NOT_READY => {
                Err(DriftError::EngineNotReady)
            }
            Response::Predict(PredictResponse::Error { error }) => Err(DriftError::Prediction(error)),
            other => Err(unexpected("PREDICT", &other)),
        }
    }

    /// `CHECK_STATUS`
    pub async fn check_status(&self) -> Result<StatusResponse, DriftError> {
        match self.call(Message::CheckStatus).await? {
            Response::Status(status) => Ok(status),
            other => Err(unexpected("CHECK_STATUS", &other)),
        }
    }

    /// Requests still waiting for a reply
    pub fn in_flight(&self) -> usize {
        lock_pending(&self.pending).len()
    }
}

fn unexpected(kind: &str, response: &Response) -> DriftError {
    DriftError::Prediction(format!("unexpected {kind} response: {response:?}"))
}

/// Route replies to whoever is waiting on their request id
async fn dispatch_replies(mut replies: mpsc::Receiver<Reply>, pending: PendingMap) {
    while let Some(reply) = replies.recv().await {
        let waiter = lock_pending(&pending).remove(&reply.request_id);
        match waiter {
            Some(tx) => {
                // The caller may have given up between lookup and send
                let _ = tx.send(reply.response);
            }
            None => debug!(request_id = reply.request_id, "Discarding late reply"),
        }
    }
}

type LoadResult = Result<Box<dyn Predictor>, DriftError>;

/// Scoring-context side: owns the engine and answers requests one at a time
pub struct EngineHost {
    engine: ScoringEngine,
    loader: Arc<dyn ModelLoader>,
    requests: mpsc::Receiver<Envelope>,
    replies: mpsc::Sender<Reply>,
    events: MessageSender,
}

impl EngineHost {
    pub fn new(
        engine: ScoringEngine,
        loader: Arc<dyn ModelLoader>,
        requests: mpsc::Receiver<Envelope>,
        replies: mpsc::Sender<Reply>,
        events: MessageSender,
    ) -> Self {
        Self {
            engine,
            loader,
            requests,
            replies,
            events,
        }
    }

    /// Serve until every client handle is dropped
    pub async fn run(mut self) {
        let (load_tx, mut load_rx) = mpsc::channel::<LoadResult>(1);

        loop {
            tokio::select! {
                envelope = self.requests.recv() => {
                    let Some(Envelope { request_id, message }) = envelope else {
                        break;
                    };
                    let response = self.handle(message, &load_tx);
                    if self.replies.send(Reply { request_id, response }).await.is_err() {
                        break;
                    }
                }
                Some(result) = load_rx.recv() => {
                    self.complete_load(result);
                }
            }
        }

        debug!("Scoring context stopped");
    }

    fn handle(&mut self, message: Message, load_tx: &mpsc::Sender<LoadResult>) -> Response {
        match message {
            Message::LoadModel => Response::Ack(self.start_load(load_tx)),
            Message::Predict { data, flags } => {
                Response::Predict(match self.engine.predict_with_flags(&data, flags) {
                    Ok(score) => PredictResponse::Success { score },
                    Err(DriftError::EngineNotReady) => PredictResponse::Error {
                        error: MODEL_NOT_READY.to_string(),
                    },
                    Err(e) => PredictResponse::Error { error: e.to_string() },
                })
            }
            Message::CheckStatus => Response::Status(self.engine.check_status()),
            other => Response::Ack(Ack::error(format!(
                "{} is not handled by the scoring context",
                other.kind()
            ))),
        }
    }

    fn start_load(&mut self, load_tx: &mpsc::Sender<LoadResult>) -> Ack {
        match self.engine.begin_load() {
            LoadDecision::AlreadyReady => Ack::new(AckStatus::Success),
            LoadDecision::AlreadyLoading => Ack::new(AckStatus::Initiated),
            LoadDecision::Started => {
                info!(backend = %self.loader.describe(), "Loading scoring engine");
                let loader = Arc::clone(&self.loader);
                let load_tx = load_tx.clone();
                tokio::spawn(async move {
                    let result = match tokio::task::spawn_blocking(move || loader.load()).await {
                        Ok(result) => result,
                        Err(e) => Err(DriftError::EngineLoadFailure(format!("loader panicked: {e}"))),
                    };
                    let _ = load_tx.send(result).await;
                });
                Ack::new(AckStatus::Initiated)
            }
        }
    }

    fn complete_load(&mut self, result: LoadResult) {
        let (ready, log) = match self.engine.finish_load(result) {
            Ok(version) => (
                Message::model_ready(version.clone()),
                Message::OffscreenLog {
                    log_type: LogLevel::Log,
                    message: format!("Model loaded: {version}"),
                },
            ),
            Err(error) => (
                Message::model_failed(error.clone()),
                Message::OffscreenLog {
                    log_type: LogLevel::Error,
                    message: format!("Model load failed: {error}"),
                },
            ),
        };

        for message in [log, ready] {
            if let Err(e) = self.events.send(message) {
                warn!(error = %e, "Could not notify controller");
            }
        }
    }
}

/// Handles to a running scoring context
pub struct EngineLink {
    pub client: EngineClient,
    pub host: JoinHandle<()>,
    pub dispatcher: JoinHandle<()>,
}

/// Start the scoring context on the current runtime.
///
/// Unsolicited engine messages (`MODEL_READY`, `OFFSCREEN_LOG`) are delivered through
/// `events`, normally the controller's inbox.
pub fn spawn_engine(
    loader: Arc<dyn ModelLoader>,
    window_size: usize,
    timeout: Duration,
    events: MessageSender,
) -> EngineLink {
    let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (reply_tx, reply_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

    let host = EngineHost::new(
        ScoringEngine::new(window_size),
        loader,
        request_rx,
        reply_tx,
        events,
    );

    EngineLink {
        client: EngineClient::new(request_tx, Arc::clone(&pending), timeout),
        host: tokio::spawn(host.run()),
        dispatcher: tokio::spawn(dispatch_replies(reply_rx, pending)),
    }
}
