//! Mock venue WebSocket server for stream client tests

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum ServerPush {
    Text(String),
    DropAll,
}

struct ServerState {
    respond_to_pings: AtomicBool,
    connections: AtomicUsize,
    /// (connection index, frame)
    received: Mutex<Vec<(usize, Value)>>,
    push_tx: broadcast::Sender<ServerPush>,
}

pub struct MockVenueServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    accept_task: JoinHandle<()>,
}

impl MockVenueServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (push_tx, _) = broadcast::channel(256);
        let state = Arc::new(ServerState {
            respond_to_pings: AtomicBool::new(true),
            connections: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
            push_tx,
        });

        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                debug!("Mock venue accepted {}", peer);
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        warn!("Mock connection error: {}", e);
                    }
                });
            }
        });

        Self {
            addr,
            state,
            accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn set_respond_to_pings(&self, on: bool) {
        self.state.respond_to_pings.store(on, Ordering::SeqCst);
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Send a text frame to every open connection
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.state.push_tx.send(ServerPush::Text(text.into()));
    }

    /// Drop every open connection without a close handshake
    pub fn drop_all(&self) {
        let _ = self.state.push_tx.send(ServerPush::DropAll);
    }

    pub fn frames_on(&self, conn: usize, op: &str) -> Vec<Value> {
        self.state
            .received
            .lock()
            .iter()
            .filter(|(c, v)| *c == conn && v["op"] == op)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn count_op(&self, op: &str) -> usize {
        self.state
            .received
            .lock()
            .iter()
            .filter(|(_, v)| v["op"] == op)
            .count()
    }

    /// Net subscribed topics on one connection
    pub fn subscribed_on(&self, conn: usize) -> BTreeSet<String> {
        let mut topics = BTreeSet::new();
        for (c, frame) in self.state.received.lock().iter() {
            if *c != conn {
                continue;
            }
            let args = frame["args"].as_array().cloned().unwrap_or_default();
            for arg in args.iter().filter_map(Value::as_str) {
                match frame["op"].as_str() {
                    Some("subscribe") => {
                        topics.insert(arg.to_string());
                    }
                    Some("unsubscribe") => {
                        topics.remove(arg);
                    }
                    _ => {}
                }
            }
        }
        topics
    }
}

impl Drop for MockVenueServer {
    fn drop(&mut self) {
        self.accept_task.abort();
        self.drop_all();
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) -> anyhow::Result<()> {
    let mut push_rx = state.push_tx.subscribe();
    let ws = accept_async(stream).await?;
    let conn = state.connections.fetch_add(1, Ordering::SeqCst);
    let (mut tx, mut rx) = ws.split();

    loop {
        tokio::select! {
            msg = rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    state.received.lock().push((conn, frame.clone()));
                    let req_id = frame["req_id"].clone();
                    match frame["op"].as_str() {
                        Some("ping") if state.respond_to_pings.load(Ordering::SeqCst) => {
                            let pong = json!({
                                "success": true, "ret_msg": "pong", "conn_id": "mock",
                                "req_id": req_id, "op": "ping"
                            });
                            tx.send(Message::Text(pong.to_string())).await?;
                        }
                        Some(op @ ("subscribe" | "unsubscribe")) => {
                            let ack = json!({
                                "success": true, "ret_msg": "", "conn_id": "mock",
                                "req_id": req_id, "op": op
                            });
                            tx.send(Message::Text(ack.to_string())).await?;
                        }
                        _ => {}
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
            push = push_rx.recv() => match push {
                Ok(ServerPush::Text(text)) => tx.send(Message::Text(text)).await?,
                Ok(ServerPush::DropAll) | Err(_) => break,
            },
        }
    }
    Ok(())
}

/// Poll `cond` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn kline_frame(topic: &str, start: i64, close: f64, confirm: bool) -> String {
    json!({
        "topic": topic,
        "type": "snapshot",
        "ts": start + 1_000,
        "data": [{
            "start": start,
            "end": start + 299_999,
            "interval": "5",
            "open": format!("{}", close - 1.0),
            "close": format!("{}", close),
            "high": format!("{}", close + 2.0),
            "low": format!("{}", close - 2.0),
            "volume": "12.5",
            "turnover": "1000",
            "confirm": confirm,
            "timestamp": start + 1_000
        }]
    })
    .to_string()
}
