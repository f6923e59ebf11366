//! Error types for the adaptive strategy

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Insufficient data for {indicator}: need {required} candles, have {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    #[error("Calculation error: {message}")]
    Calculation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Market data error: {message}")]
    MarketData { message: String },

    #[error("Order execution error: {message}")]
    Execution { message: String },

    #[error("Stream error: {0}")]
    Adapter(#[from] adapter_service::AdapterError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] codec::ProtocolError),
}

impl StrategyError {
    pub fn insufficient(indicator: &'static str, required: usize, available: usize) -> Self {
        StrategyError::InsufficientData {
            indicator,
            required,
            available,
        }
    }

    /// Faults that clear up with more data or another attempt
    pub fn is_recoverable(&self) -> bool {
        match self {
            StrategyError::InsufficientData { .. }
            | StrategyError::MarketData { .. }
            | StrategyError::Protocol(_) => true,
            StrategyError::Adapter(e) => e.is_recoverable(),
            StrategyError::Execution { .. } => true,
            StrategyError::Calculation { .. } | StrategyError::Configuration { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StrategyError>;
