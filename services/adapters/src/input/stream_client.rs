//! Resilient market-data stream client
//!
//! ## Purpose
//!
//! Owns one duplex WebSocket connection to the venue and multiplexes topic
//! subscriptions over it. Consumers ask for a topic's messages with
//! [`StreamClient::messages_for`] and never see transport faults: those show
//! up only as [`ConnectionState`] changes.
//!
//! ## Architecture Role
//!
//! ```text
//!                    ┌────────────── supervisor ──────────────┐
//!   connect() ──────▶│ open session ─▶ await end ─▶ sleep(policy) ─┐
//!                    └──────▲─────────────────────────────────────┘
//!                           │ session end                          │
//!   ┌───────────── session task ─────────────┐   ┌── heartbeat ──┐ │
//!   │ ws read ─▶ codec ─▶ TopicRouter ─▶ tx   │◀──│ ping / pong   │ │
//!   │ cmd rx ─▶ ws write                      │   │ deadline      │ │
//!   └─────────────────────────────────────────┘   └───────────────┘ │
//!                           ▲────────────────────────────────────────┘
//! ```
//!
//! The session task is the only writer of the `Disconnected` transition for a
//! live session, and the only publisher into topic channels.

use codec::{parse_frame, ControlFrame, InboundFrame, Op};
use futures_util::stream::{self, SplitSink, SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use types::{ConnectionState, Topic};

use super::connection::{ConnectionConfig, Liveness, LivenessSnapshot};
use super::router::{StreamMessage, TopicRouter};
use crate::{AdapterError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Topics per subscribe frame when restoring after a reconnect
const SUBSCRIBE_BATCH: usize = 10;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    HeartbeatTimeout,
    ClosedByPeer,
    TransportError(String),
    Manual,
}

impl SessionEnd {
    /// Error equivalent for reporting; `None` for a manual close.
    pub fn to_error(&self, config: &ConnectionConfig) -> Option<AdapterError> {
        match self {
            SessionEnd::HeartbeatTimeout => Some(AdapterError::HeartbeatTimeout {
                timeout_ms: config.pong_timeout.as_millis() as u64,
            }),
            SessionEnd::ClosedByPeer => Some(AdapterError::ConnectionFailed {
                url: config.url.clone(),
                reason: "closed by peer".to_string(),
            }),
            SessionEnd::TransportError(reason) => Some(AdapterError::ConnectionFailed {
                url: config.url.clone(),
                reason: reason.clone(),
            }),
            SessionEnd::Manual => None,
        }
    }
}

#[derive(Debug)]
enum Command {
    Send(String),
    Close(SessionEnd),
}

struct Outbound {
    session_id: u64,
    tx: mpsc::UnboundedSender<Command>,
}

struct Supervisor {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct StreamCounters {
    sessions_opened: AtomicU64,
    disconnects: AtomicU64,
    reconnects_scheduled: AtomicU64,
    heartbeat_timeouts: AtomicU64,
    frames_received: AtomicU64,
    malformed_dropped: AtomicU64,
    unrouted: AtomicU64,
}

/// Point-in-time counters for health reporting and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub sessions_opened: u64,
    /// Transitions from `Connected` to `Disconnected`
    pub disconnects: u64,
    pub reconnects_scheduled: u64,
    pub heartbeat_timeouts: u64,
    pub frames_received: u64,
    pub malformed_dropped: u64,
    pub unrouted: u64,
}

struct Shared {
    config: ConnectionConfig,
    state_tx: watch::Sender<ConnectionState>,
    /// Desired subscription set, restored on every new session
    topics: Mutex<BTreeSet<Topic>>,
    pending_acks: Mutex<HashMap<String, Vec<Topic>>>,
    router: RwLock<TopicRouter>,
    outbound: Mutex<Option<Outbound>>,
    supervisor: Mutex<Option<Supervisor>>,
    liveness: Liveness,
    counters: StreamCounters,
    /// Last session or connect failure, for health reporting
    last_error: Mutex<Option<String>>,
    req_seq: AtomicU64,
    session_seq: AtomicU64,
    disposed: AtomicBool,
}

/// Cloneable handle to one stream connection.
#[derive(Clone)]
pub struct StreamClient {
    shared: Arc<Shared>,
}

impl StreamClient {
    pub fn new(config: ConnectionConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let capacity = config.channel_capacity;
        Self {
            shared: Arc::new(Shared {
                config,
                state_tx,
                topics: Mutex::new(BTreeSet::new()),
                pending_acks: Mutex::new(HashMap::new()),
                router: RwLock::new(TopicRouter::new(capacity)),
                outbound: Mutex::new(None),
                supervisor: Mutex::new(None),
                liveness: Liveness::default(),
                counters: StreamCounters::default(),
                last_error: Mutex::new(None),
                req_seq: AtomicU64::new(0),
                session_seq: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Change notifications for the connection state
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn liveness(&self) -> LivenessSnapshot {
        self.shared.liveness.snapshot()
    }

    pub fn stats(&self) -> StreamStats {
        let c = &self.shared.counters;
        StreamStats {
            sessions_opened: c.sessions_opened.load(Ordering::Relaxed),
            disconnects: c.disconnects.load(Ordering::Relaxed),
            reconnects_scheduled: c.reconnects_scheduled.load(Ordering::Relaxed),
            heartbeat_timeouts: c.heartbeat_timeouts.load(Ordering::Relaxed),
            frames_received: c.frames_received.load(Ordering::Relaxed),
            malformed_dropped: c.malformed_dropped.load(Ordering::Relaxed),
            unrouted: c.unrouted.load(Ordering::Relaxed),
        }
    }

    /// Most recent reason the stream dropped or failed to open
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    /// Topics that will be (re)subscribed on every session
    pub fn active_topics(&self) -> Vec<Topic> {
        self.shared.topics.lock().iter().cloned().collect()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Open the stream and start supervising it.
    ///
    /// Returns the outcome of the first attempt. When that attempt fails the
    /// supervisor keeps retrying per the reconnect policy; progress is visible
    /// through [`StreamClient::watch_state`]. Calling this while a supervisor
    /// is already running waits for `Connected` instead of opening a second
    /// connection.
    pub async fn connect(&self) -> Result<()> {
        self.shared.ensure_live()?;

        let first_rx = {
            let mut guard = self.shared.supervisor.lock();
            let running = guard.as_ref().is_some_and(|s| !s.task.is_finished());
            if running {
                None
            } else {
                let (first_tx, first_rx) = oneshot::channel();
                let (stop_tx, stop_rx) = watch::channel(false);
                let task = tokio::spawn(supervise(Arc::clone(&self.shared), stop_rx, first_tx));
                *guard = Some(Supervisor {
                    stop: stop_tx,
                    task,
                });
                Some(first_rx)
            }
        };

        match first_rx {
            Some(rx) => rx.await.unwrap_or(Err(AdapterError::NotConnected)),
            None => {
                self.wait_for_state(ConnectionState::Connected, self.shared.config.connect_timeout)
                    .await
            }
        }
    }

    /// Wait until the connection reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState, within: Duration) -> Result<()> {
        let mut rx = self.shared.state_tx.subscribe();
        let reached = timeout(within, rx.wait_for(|s| *s == target))
            .await
            .map(|r| r.map(|_| ()));
        match reached {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(AdapterError::Disposed),
            Err(_) => Err(AdapterError::ConnectionTimeout {
                url: self.shared.config.url.clone(),
                timeout_ms: within.as_millis() as u64,
            }),
        }
    }

    /// Subscribe to `topic`. Rejected with `NotConnected` unless the stream
    /// is connected; subscribing to an active topic is a no-op.
    pub fn subscribe(&self, topic: impl Into<Topic>) -> Result<()> {
        let topic = topic.into();
        self.shared.ensure_live()?;
        if self.state() != ConnectionState::Connected {
            return Err(AdapterError::NotConnected);
        }
        let tx = self
            .shared
            .current_sender()
            .ok_or(AdapterError::NotConnected)?;

        if !self.shared.topics.lock().insert(topic.clone()) {
            debug!(%topic, "Already subscribed");
            return Ok(());
        }
        if !self
            .shared
            .send_control(&tx, Op::Subscribe, std::slice::from_ref(&topic))
        {
            self.shared.topics.lock().remove(&topic);
            return Err(AdapterError::NotConnected);
        }
        info!(%topic, "Subscribed");
        Ok(())
    }

    /// Drop `topic` from the subscription set and close its channel.
    /// Never fails; while disconnected the topic is simply not restored.
    pub fn unsubscribe(&self, topic: &Topic) {
        let removed = self.shared.topics.lock().remove(topic);
        self.shared.router.write().remove(topic);
        if !removed {
            return;
        }
        if self.state() == ConnectionState::Connected {
            if let Some(tx) = self.shared.current_sender() {
                self.shared
                    .send_control(&tx, Op::Unsubscribe, std::slice::from_ref(topic));
            }
        }
        info!(%topic, "Unsubscribed");
    }

    /// Live messages for `topic` (exact key or prefix). Any number of
    /// receivers may exist per topic; each sees every message.
    pub fn messages_for(&self, topic: impl Into<Topic>) -> TopicReceiver {
        let topic = topic.into();
        let rx = self.shared.router.write().subscribe(&topic);
        TopicReceiver {
            topic,
            rx,
            skipped: 0,
        }
    }

    /// Close the stream without reconnecting. The subscription set is kept so
    /// a later [`connect`](Self::connect) restores it.
    pub async fn disconnect(&self) {
        let supervisor = self.shared.supervisor.lock().take();
        if let Some(tx) = self.shared.current_sender() {
            let _ = tx.send(Command::Close(SessionEnd::Manual));
        }
        if let Some(Supervisor { stop, mut task }) = supervisor {
            let _ = stop.send(true);
            let grace = self.shared.config.connect_timeout + Duration::from_secs(1);
            if timeout(grace, &mut task).await.is_err() {
                warn!("Stream supervisor did not stop in time, aborting");
                task.abort();
            }
        }
        self.shared.set_state(ConnectionState::Disconnected);
        info!(url = %self.shared.config.url, "Stream disconnected");
    }

    /// Unsubscribe everything, close every topic channel and stop all timers.
    /// Safe to call repeatedly; the client cannot be reconnected afterwards.
    pub async fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let topics: Vec<Topic> = std::mem::take(&mut *self.shared.topics.lock())
            .into_iter()
            .collect();
        if !topics.is_empty() && self.state() == ConnectionState::Connected {
            if let Some(tx) = self.shared.current_sender() {
                for chunk in topics.chunks(SUBSCRIBE_BATCH) {
                    self.shared.send_control(&tx, Op::Unsubscribe, chunk);
                }
            }
        }

        self.disconnect().await;
        self.shared.router.write().clear();
        self.shared.pending_acks.lock().clear();
        info!(topics = topics.len(), "Stream client disposed");
    }
}

/// Receiving end of one topic's messages.
pub struct TopicReceiver {
    topic: Topic,
    rx: broadcast::Receiver<StreamMessage>,
    skipped: u64,
}

impl TopicReceiver {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Messages dropped because this receiver fell behind
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Next message, or `None` once the topic's channel is closed.
    /// A lagging receiver skips what it missed rather than failing.
    pub async fn recv(&mut self) -> Option<StreamMessage> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, skipped = n, "Consumer lagging, frames skipped");
                    self.skipped += n;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = StreamMessage> + Send {
        stream::unfold(self, |mut rx| async move { rx.recv().await.map(|m| (m, rx)) })
    }
}

impl Shared {
    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(AdapterError::Disposed)
        } else {
            Ok(())
        }
    }

    fn next_req_id(&self) -> String {
        (self.req_seq.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    fn current_sender(&self) -> Option<mpsc::UnboundedSender<Command>> {
        self.outbound.lock().as_ref().map(|o| o.tx.clone())
    }

    /// Publish `new`; returns whether the state changed.
    fn set_state(&self, new: ConnectionState) -> bool {
        let mut was_connected = false;
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == new {
                return false;
            }
            was_connected = *state == ConnectionState::Connected;
            *state = new;
            true
        });
        if changed && was_connected && new == ConnectionState::Disconnected {
            self.counters.disconnects.fetch_add(1, Ordering::Relaxed);
        }
        changed
    }

    fn send_control(&self, tx: &mpsc::UnboundedSender<Command>, op: Op, topics: &[Topic]) -> bool {
        let req_id = self.next_req_id();
        let frame = match op {
            Op::Subscribe => {
                self.pending_acks
                    .lock()
                    .insert(req_id.clone(), topics.to_vec());
                ControlFrame::subscribe(topics, req_id)
            }
            Op::Unsubscribe => ControlFrame::unsubscribe(topics, req_id),
            Op::Ping => ControlFrame::ping(req_id),
        };
        tx.send(Command::Send(frame.to_json())).is_ok()
    }

    fn restore_subscriptions(&self, tx: &mpsc::UnboundedSender<Command>) {
        let topics: Vec<Topic> = self.topics.lock().iter().cloned().collect();
        if topics.is_empty() {
            return;
        }
        info!(count = topics.len(), "Restoring subscriptions");
        for chunk in topics.chunks(SUBSCRIBE_BATCH) {
            self.send_control(tx, Op::Subscribe, chunk);
        }
    }

    fn handle_text(&self, text: &str) {
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);
        self.liveness.mark_message();

        match parse_frame(text) {
            Ok(InboundFrame::Pong { .. }) => {
                self.liveness.mark_pong_received();
                debug!("Pong received");
            }
            Ok(InboundFrame::Ping { .. }) => debug!("Server ping"),
            Ok(InboundFrame::CommandAck {
                op,
                success,
                ret_msg,
                req_id,
            }) => self.handle_ack(&op, success, ret_msg, req_id),
            Ok(InboundFrame::Data(frame)) => {
                let topic = frame.topic.clone();
                if !self.router.read().dispatch(Arc::new(frame)) {
                    self.counters.unrouted.fetch_add(1, Ordering::Relaxed);
                    debug!(%topic, "No consumer for topic");
                }
            }
            Err(e) => {
                self.counters
                    .malformed_dropped
                    .fetch_add(1, Ordering::Relaxed);
                let preview: String = text.chars().take(120).collect();
                warn!(error = %e, frame = %preview, "Dropping malformed frame");
            }
        }
    }

    fn handle_ack(&self, op: &str, success: bool, ret_msg: Option<String>, req_id: Option<String>) {
        let topics = req_id
            .and_then(|id| self.pending_acks.lock().remove(&id))
            .unwrap_or_default();
        if success {
            debug!(op, ?topics, "Command acknowledged");
            return;
        }
        warn!(op, reason = ?ret_msg, ?topics, "Command rejected by venue");
        if op == "subscribe" {
            let mut active = self.topics.lock();
            for topic in &topics {
                active.remove(topic);
            }
        }
    }

    fn end_session(&self, session_id: u64) {
        {
            let mut outbound = self.outbound.lock();
            if outbound.as_ref().map(|o| o.session_id) == Some(session_id) {
                *outbound = None;
            }
        }
        self.pending_acks.lock().clear();
        self.set_state(ConnectionState::Disconnected);
    }
}

/// Reconnect loop. Exits on stop, on a manual close, or when the policy
/// runs out of attempts.
async fn supervise(
    shared: Arc<Shared>,
    mut stop: watch::Receiver<bool>,
    first: oneshot::Sender<Result<()>>,
) {
    let mut first = Some(first);
    let mut attempt: u32 = 0;

    loop {
        if *stop.borrow() {
            break;
        }

        let opened = tokio::select! {
            res = open_session(&shared) => res,
            _ = stop.wait_for(|s| *s) => break,
        };

        match opened {
            Ok(session) => {
                attempt = 0;
                if let Some(tx) = first.take() {
                    let _ = tx.send(Ok(()));
                }
                let end = session
                    .await
                    .unwrap_or_else(|e| SessionEnd::TransportError(format!("session task: {}", e)));
                if *stop.borrow() || end == SessionEnd::Manual {
                    break;
                }
                if let Some(err) = end.to_error(&shared.config) {
                    warn!(url = %shared.config.url, error = %err, "Stream session ended");
                    *shared.last_error.lock() = Some(err.to_string());
                }
            }
            Err(e) => {
                *shared.last_error.lock() = Some(e.to_string());
                match first.take() {
                    Some(tx) => {
                        let _ = tx.send(Err(e));
                    }
                    None => warn!(error = %e, "Reconnect attempt failed"),
                }
            }
        }

        attempt += 1;
        let Some(delay) = shared.config.reconnect.delay_for(attempt) else {
            error!(attempts = attempt - 1, "Reconnect attempts exhausted, giving up");
            break;
        };
        shared
            .counters
            .reconnects_scheduled
            .fetch_add(1, Ordering::Relaxed);
        info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

        tokio::select! {
            _ = sleep(delay) => {}
            _ = stop.wait_for(|s| *s) => break,
        }
    }

    shared.set_state(ConnectionState::Disconnected);
    if let Some(tx) = first.take() {
        let _ = tx.send(Err(AdapterError::NotConnected));
    }
}

async fn open_session(shared: &Arc<Shared>) -> Result<JoinHandle<SessionEnd>> {
    let cfg = &shared.config;
    shared.set_state(ConnectionState::Connecting);
    info!(url = %cfg.url, "Connecting to market-data stream");

    let ws = match timeout(cfg.connect_timeout, connect_async(cfg.url.as_str())).await {
        Ok(Ok((ws, response))) => {
            info!(url = %cfg.url, status = ?response.status(), "Stream connected");
            ws
        }
        Ok(Err(e)) => {
            error!(url = %cfg.url, error = %e, "Stream connection failed");
            shared.set_state(ConnectionState::Disconnected);
            return Err(AdapterError::ConnectionFailed {
                url: cfg.url.clone(),
                reason: e.to_string(),
            });
        }
        Err(_) => {
            error!(url = %cfg.url, timeout = ?cfg.connect_timeout, "Stream connection timed out");
            shared.set_state(ConnectionState::Disconnected);
            return Err(AdapterError::ConnectionTimeout {
                url: cfg.url.clone(),
                timeout_ms: cfg.connect_timeout.as_millis() as u64,
            });
        }
    };

    let (sink, source) = ws.split();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let session_id = shared.session_seq.fetch_add(1, Ordering::Relaxed) + 1;
    *shared.outbound.lock() = Some(Outbound {
        session_id,
        tx: cmd_tx.clone(),
    });
    shared.liveness.reset();
    shared
        .counters
        .sessions_opened
        .fetch_add(1, Ordering::Relaxed);
    shared.set_state(ConnectionState::Connected);
    shared.restore_subscriptions(&cmd_tx);

    let heartbeat = tokio::spawn(heartbeat_loop(Arc::clone(shared), cmd_tx));
    Ok(tokio::spawn(session_loop(
        Arc::clone(shared),
        session_id,
        sink,
        source,
        cmd_rx,
        heartbeat,
    )))
}

async fn session_loop(
    shared: Arc<Shared>,
    session_id: u64,
    mut sink: SplitSink<WsStream, Message>,
    mut source: SplitStream<WsStream>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    heartbeat: JoinHandle<()>,
) -> SessionEnd {
    let end = loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => shared.handle_text(&text),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Peer closed stream");
                    break SessionEnd::ClosedByPeer;
                }
                // Control frames are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Stream transport error");
                    break SessionEnd::TransportError(e.to_string());
                }
                None => break SessionEnd::ClosedByPeer,
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Send(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        warn!(error = %e, "Stream write failed");
                        break SessionEnd::TransportError(e.to_string());
                    }
                }
                Some(Command::Close(reason)) => break reason,
                None => break SessionEnd::Manual,
            },
        }
    };

    heartbeat.abort();
    if end != SessionEnd::ClosedByPeer {
        let _ = timeout(Duration::from_secs(1), sink.close()).await;
    }
    shared.end_session(session_id);
    debug!(session_id, reason = ?end, "Session closed");
    end
}

async fn heartbeat_loop(shared: Arc<Shared>, cmd_tx: mpsc::UnboundedSender<Command>) {
    let ping_interval = shared.config.ping_interval;
    let pong_timeout = shared.config.pong_timeout;
    let mut ticker = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let deadline = shared.liveness.outstanding_ping().map(|t| t + pong_timeout);
        tokio::select! {
            _ = ticker.tick() => {
                shared.liveness.mark_ping_sent(Instant::now());
                if !shared.send_control(&cmd_tx, Op::Ping, &[]) {
                    break;
                }
                debug!("Ping sent");
            }
            _ = sleep_until_opt(deadline) => {
                let expired = shared
                    .liveness
                    .outstanding_ping()
                    .is_some_and(|sent| Instant::now() >= sent + pong_timeout);
                if expired {
                    shared.counters.heartbeat_timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        timeout_ms = pong_timeout.as_millis() as u64,
                        "No pong before deadline, closing stream"
                    );
                    let _ = cmd_tx.send(Command::Close(SessionEnd::HeartbeatTimeout));
                    break;
                }
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
