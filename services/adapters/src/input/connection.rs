//! Connection configuration, reconnect policy and liveness tracking

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use config::service::stream;

/// When and how often to retry after the transport drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Constant delay; `max_attempts == None` retries forever
    Fixed {
        delay: Duration,
        max_attempts: Option<u32>,
    },
    /// `base * 2^(attempt-1)`, capped at `max`
    ExponentialBackoff {
        base: Duration,
        max: Duration,
        max_attempts: Option<u32>,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed {
            delay: Duration::from_millis(stream::RECONNECT_DELAY_MS),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based), or `None`
    /// once the attempt budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        let (max_attempts, delay) = match *self {
            ReconnectPolicy::Fixed {
                delay,
                max_attempts,
            } => (max_attempts, delay),
            ReconnectPolicy::ExponentialBackoff {
                base,
                max,
                max_attempts,
            } => {
                let shift = attempt.saturating_sub(1).min(16);
                let scaled = base.saturating_mul(1u32 << shift);
                (max_attempts, scaled.min(max))
            }
        };
        match max_attempts {
            Some(limit) if attempt > limit => None,
            _ => Some(delay),
        }
    }
}

/// Configuration for connection management
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Heartbeat ping cadence
    pub ping_interval: Duration,
    /// Deadline for a pong after a ping
    pub pong_timeout: Duration,
    /// Per-topic broadcast buffer
    pub channel_capacity: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: stream::DEFAULT_URL.to_string(),
            connect_timeout: Duration::from_millis(stream::CONNECT_TIMEOUT_MS),
            ping_interval: Duration::from_millis(stream::PING_INTERVAL_MS),
            pong_timeout: Duration::from_millis(stream::PONG_TIMEOUT_MS),
            channel_capacity: stream::TOPIC_CHANNEL_CAPACITY,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Wall-clock view of heartbeat activity, for display and health checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LivenessSnapshot {
    pub last_ping_sent_ms: Option<i64>,
    pub last_pong_received_ms: Option<i64>,
    pub last_message_ms: Option<i64>,
}

#[derive(Debug, Default)]
struct LivenessInner {
    /// Oldest ping not yet answered by a pong
    pending_since: Option<Instant>,
    snapshot: LivenessSnapshot,
}

/// Ping/pong bookkeeping shared by the read loop and the heartbeat task.
///
/// The timeout is anchored on the oldest unanswered ping so that a steady
/// stream of pings cannot keep pushing the deadline forward. Epoch
/// milliseconds are kept alongside for observers.
#[derive(Debug, Default)]
pub struct Liveness {
    inner: Mutex<LivenessInner>,
}

impl Liveness {
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.pending_since = None;
    }

    pub fn mark_ping_sent(&self, at: Instant) {
        let mut inner = self.inner.lock();
        inner.pending_since.get_or_insert(at);
        inner.snapshot.last_ping_sent_ms = Some(types::current_timestamp_ms());
    }

    pub fn mark_pong_received(&self) {
        let mut inner = self.inner.lock();
        inner.pending_since = None;
        inner.snapshot.last_pong_received_ms = Some(types::current_timestamp_ms());
    }

    pub fn mark_message(&self) {
        self.inner.lock().snapshot.last_message_ms = Some(types::current_timestamp_ms());
    }

    /// Oldest ping still waiting for a pong
    pub fn outstanding_ping(&self) -> Option<Instant> {
        self.inner.lock().pending_since
    }

    pub fn snapshot(&self) -> LivenessSnapshot {
        self.inner.lock().snapshot
    }
}
