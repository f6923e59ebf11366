//! # Market-Data Adapters
//!
//! ## Purpose
//!
//! Boundary between the venue and the strategy layer. Maintains the live
//! market-data stream (subscriptions, heartbeat, reconnection, topic fan-out)
//! and provides the REST, trading and journal collaborators the strategy
//! service calls into.
//!
//! ## Integration Points
//!
//! - **Input**: one WebSocket per [`StreamClient`], decoded by `codec`
//! - **Output**: per-topic [`TopicReceiver`]s handed to strategy consumers
//! - **Collaborators**: [`MarketDataClient`], [`TradingClient`], [`TradeJournal`]
//! - **Configuration**: [`StreamSettings`] and [`RestSettings`], loaded by `config`
//!
//! ## Architecture Role
//!
//! ```text
//! venue ──ws──▶ StreamClient ──▶ TopicRouter ──▶ strategy consumers
//! venue ◀─rest─ BybitPublicClient ◀── candle seeding
//!               PaperTradingClient ◀── order placement
//!               TradeJournal ◀── log / order records
//! ```
//!
//! Transport faults never surface to consumers as errors. They are recovered
//! inside the client and observed only as [`types::ConnectionState`] changes.

pub mod error;
pub mod exchange;
pub mod input;
pub mod journal;
pub mod settings;

pub use error::{AdapterError, Result};
pub use exchange::{BybitPublicClient, MarketDataClient, PaperTradingClient, TradingClient};
pub use input::{
    ConnectionConfig, LivenessSnapshot, ReconnectPolicy, SessionEnd, StreamClient,
    StreamMessage, StreamStats, TopicReceiver,
};
pub use journal::{JsonLinesJournal, MemoryJournal, TradeJournal};
pub use settings::{ReconnectSettings, RestSettings, StreamSettings};
