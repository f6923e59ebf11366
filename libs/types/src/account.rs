//! Account-side records exchanged with trading and journal collaborators

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signal::SignalType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_signal(signal: SignalType) -> Option<Self> {
        match signal {
            SignalType::Long => Some(Side::Buy),
            SignalType::Short => Some(Side::Sell),
            SignalType::Hold => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        })
    }
}

/// 24h ticker summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last_price: Decimal,
    pub mark_price: Option<Decimal>,
    /// Fractional 24h change (0.012 = +1.2%)
    pub price_24h_pcnt: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
}

/// Open position on one symbol. `side == None` means flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Option<Side>,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub leverage: u32,
    pub unrealised_pnl: Decimal,
}

impl Position {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            side: None,
            size: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            leverage: 1,
            unrealised_pnl: Decimal::ZERO,
        }
    }

    pub fn is_open(&self) -> bool {
        self.side.is_some() && !self.size.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    /// Limit or reference price; `None` for a market order
    pub price: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub leverage: u32,
}

/// Accepted order as recorded in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub entry_price: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub leverage: u32,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_ms: i64,
    pub symbol: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn info(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::at(LogLevel::Info, symbol, message)
    }

    pub fn warn(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::at(LogLevel::Warn, symbol, message)
    }

    pub fn error(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::at(LogLevel::Error, symbol, message)
    }

    fn at(level: LogLevel, symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp_ms: crate::current_timestamp_ms(),
            symbol: symbol.into(),
            level,
            message: message.into(),
        }
    }
}
