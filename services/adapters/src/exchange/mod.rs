//! Exchange collaborators
//!
//! Traits the strategy layer calls to seed candle buffers and to place and
//! verify orders, with a public REST implementation for market data and an
//! in-memory paper implementation for trading.

pub mod bybit;
pub mod paper;

use async_trait::async_trait;
use types::{Candle, OrderRecord, OrderRequest, Position, Ticker, Timeframe};

use crate::Result;

pub use bybit::BybitPublicClient;
pub use paper::PaperTradingClient;

/// Read-only market data
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Most recent `limit` candles, oldest first
    async fn get_klines(&self, symbol: &str, timeframe: Timeframe, limit: usize)
        -> Result<Vec<Candle>>;

    async fn get_tickers(&self, symbol: &str) -> Result<Vec<Ticker>>;
}

/// Account and order operations
#[async_trait]
pub trait TradingClient: Send + Sync {
    /// Current position; a flat position when none is open
    async fn get_position(&self, symbol: &str) -> Result<Position>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()>;

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderRecord>;
}
