//! Price-range predictions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse state the predictor conditions its multipliers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketState {
    /// Bollinger squeeze on the base timeframe
    SqueezeOnBase,
    /// Bollinger squeeze on the reference timeframe
    SqueezeOnReference,
    StrongUp,
    WeakUp,
    StrongDown,
    WeakDown,
    Neutral,
}

impl MarketState {
    /// +1 for up states, -1 for down states, 0 otherwise
    pub fn trend_direction(self) -> i8 {
        match self {
            MarketState::StrongUp | MarketState::WeakUp => 1,
            MarketState::StrongDown | MarketState::WeakDown => -1,
            _ => 0,
        }
    }

    pub fn is_squeeze(self) -> bool {
        matches!(
            self,
            MarketState::SqueezeOnBase | MarketState::SqueezeOnReference
        )
    }
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketState::SqueezeOnBase => "squeeze (base)",
            MarketState::SqueezeOnReference => "squeeze (reference)",
            MarketState::StrongUp => "strong up",
            MarketState::WeakUp => "weak up",
            MarketState::StrongDown => "strong down",
            MarketState::WeakDown => "weak down",
            MarketState::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

/// Predicted range of the next candle on the requested interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSignal {
    pub market_state: MarketState,
    pub current_price: f64,
    pub predicted_high: f64,
    pub predicted_low: f64,
    pub predicted_close: f64,
    pub predicted_range: f64,
    pub average_move: f64,
    /// In `[0, 1]`
    pub confidence: f64,
    pub interval_minutes: u32,
    /// Start of the predicted candle, milliseconds since epoch
    pub prediction_start_ms: i64,
}

impl PredictionSignal {
    /// Predicted close relative to the current price, in percent
    pub fn expected_change_percent(&self) -> f64 {
        if self.current_price == 0.0 {
            0.0
        } else {
            (self.predicted_close - self.current_price) / self.current_price * 100.0
        }
    }
}
