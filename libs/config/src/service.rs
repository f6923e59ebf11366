//! Service defaults
//!
//! Default values shared by the stream adapter and the strategy service so
//! both sides agree without importing each other.

/// Market-data stream defaults
pub mod stream {
    /// Public linear-perpetuals stream
    pub const DEFAULT_URL: &str = "wss://stream.bybit.com/v5/public/linear";

    /// Connection timeout (milliseconds)
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// Heartbeat ping interval (milliseconds)
    pub const PING_INTERVAL_MS: u64 = 20_000;

    /// Pong deadline after a ping (milliseconds)
    pub const PONG_TIMEOUT_MS: u64 = 30_000;

    /// Fixed reconnect delay (milliseconds)
    pub const RECONNECT_DELAY_MS: u64 = 5_000;

    /// Per-topic fan-out buffer
    pub const TOPIC_CHANNEL_CAPACITY: usize = 1024;
}

/// REST defaults
pub mod rest {
    pub const DEFAULT_BASE_URL: &str = "https://api.bybit.com";

    /// Request timeout (milliseconds)
    pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

    /// Candles requested when seeding a buffer
    pub const SEED_LIMIT: usize = 200;
}

/// Strategy service defaults
pub mod strategies {
    /// Minimum spacing between signal evaluations (milliseconds)
    pub const SIGNAL_THROTTLE_MS: u64 = 1_000;

    /// Regime re-classification cadence (seconds)
    pub const REGIME_REFRESH_SECS: u64 = 300;

    /// Account/position polling cadence (seconds)
    pub const ACCOUNT_POLL_SECS: u64 = 10;

    /// Candle buffer capacity
    pub const CANDLE_BUFFER_CAPACITY: usize = 200;
}
