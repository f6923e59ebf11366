//! # Market Types Library
//!
//! Shared domain model for the adaptive trading pipeline: candles, timeframes,
//! subscription topics, regime conditions, strategy configs and the signals and
//! predictions derived from them.
//!
//! ## Design Philosophy
//!
//! - **Floating-point analytics**: indicator and prediction values are `f64`
//! - **Exact money**: prices and percentages that reach an order are `Decimal`
//! - **Plain data**: every type here is `Serialize`/`Deserialize` and carries no I/O
//!
//! ## Integration Points
//!
//! - **codec**: decodes wire frames into [`Candle`], [`Ticker`] and [`Position`]
//! - **adapter-service**: keys subscriptions by [`Topic`], reports [`ConnectionState`]
//! - **adaptive-strategy**: produces [`MarketCondition`], [`TradingSignal`] and
//!   [`PredictionSignal`] values

pub mod account;
pub mod candle;
pub mod indicator;
pub mod market;
pub mod prediction;
pub mod signal;
pub mod timeframe;
pub mod topic;

pub use account::{LogEntry, LogLevel, OrderRecord, OrderRequest, Position, Side, Ticker};
pub use candle::Candle;
pub use indicator::{BollingerBands, IndicatorSnapshot, Macd};
pub use market::{ConnectionState, MarketCondition, RegimeAssessment};
pub use prediction::{MarketState, PredictionSignal};
pub use signal::{SignalType, StrategyConfig, TradingSignal};
pub use timeframe::{ParseTimeframeError, Timeframe};
pub use topic::Topic;

/// Milliseconds since the Unix epoch, UTC.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
