//! Strategy configs and trading signals

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::market::MarketCondition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Long,
    Short,
    Hold,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalType::Long => "LONG",
            SignalType::Short => "SHORT",
            SignalType::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

/// Risk parameters attached to one market condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub take_profit_percent: Decimal,
    pub stop_loss_percent: Decimal,
    pub recommended_leverage: u32,
    pub use_trailing_stop: bool,
    /// Profit percent at which the trailing stop arms; only meaningful with `use_trailing_stop`
    pub trailing_stop_trigger_percent: Option<Decimal>,
    pub description: String,
}

impl StrategyConfig {
    /// Take-profit price for an entry at `entry` in direction `side`.
    /// `Hold` yields `None`.
    pub fn take_profit_price(&self, side: SignalType, entry: Decimal) -> Option<Decimal> {
        let pct = self.take_profit_percent / dec!(100);
        match side {
            SignalType::Long => Some(entry * (Decimal::ONE + pct)),
            SignalType::Short => Some(entry * (Decimal::ONE - pct)),
            SignalType::Hold => None,
        }
    }

    pub fn stop_loss_price(&self, side: SignalType, entry: Decimal) -> Option<Decimal> {
        let pct = self.stop_loss_percent / dec!(100);
        match side {
            SignalType::Long => Some(entry * (Decimal::ONE - pct)),
            SignalType::Short => Some(entry * (Decimal::ONE + pct)),
            SignalType::Hold => None,
        }
    }

    /// Reward over risk
    pub fn reward_risk_ratio(&self) -> Option<Decimal> {
        if self.stop_loss_percent.is_zero() {
            None
        } else {
            Some(self.take_profit_percent / self.stop_loss_percent)
        }
    }
}

/// Decision emitted by the strategy selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub signal_type: SignalType,
    /// In `[0, 1]`
    pub confidence: f64,
    pub reasoning: String,
    pub condition: MarketCondition,
    pub entry_price: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
    pub stop_loss_price: Option<Decimal>,
    pub strategy_config: StrategyConfig,
}

impl TradingSignal {
    pub fn hold(
        condition: MarketCondition,
        config: StrategyConfig,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            signal_type: SignalType::Hold,
            confidence: 0.0,
            reasoning: reasoning.into(),
            condition,
            entry_price: None,
            take_profit_price: None,
            stop_loss_price: None,
            strategy_config: config,
        }
    }

    /// Entry signal with TP/SL derived from `config`. Passing `Hold` builds a hold.
    pub fn entry(
        side: SignalType,
        condition: MarketCondition,
        config: StrategyConfig,
        entry_price: Decimal,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        if side == SignalType::Hold {
            return Self::hold(condition, config, reasoning);
        }
        let entry_price = entry_price.normalize();
        Self {
            signal_type: side,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            condition,
            entry_price: Some(entry_price),
            take_profit_price: config
                .take_profit_price(side, entry_price)
                .map(|p| p.round_dp(8).normalize()),
            stop_loss_price: config
                .stop_loss_price(side, entry_price)
                .map(|p| p.round_dp(8).normalize()),
            strategy_config: config,
        }
    }

    pub fn has_signal(&self) -> bool {
        self.signal_type != SignalType::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StrategyConfig {
        StrategyConfig {
            take_profit_percent: dec!(2.0),
            stop_loss_percent: dec!(1.0),
            recommended_leverage: 5,
            use_trailing_stop: false,
            trailing_stop_trigger_percent: None,
            description: "test".into(),
        }
    }

    #[test]
    fn test_long_levels() {
        let s = TradingSignal::entry(
            SignalType::Long,
            MarketCondition::StrongBullish,
            config(),
            dec!(100),
            0.8,
            "pullback",
        );
        assert!(s.has_signal());
        assert_eq!(s.take_profit_price, Some(dec!(102)));
        assert_eq!(s.stop_loss_price, Some(dec!(99)));
    }

    #[test]
    fn test_short_levels() {
        let s = TradingSignal::entry(
            SignalType::Short,
            MarketCondition::StrongBearish,
            config(),
            dec!(200),
            1.5,
            "bounce",
        );
        assert_eq!(s.take_profit_price, Some(dec!(196)));
        assert_eq!(s.stop_loss_price, Some(dec!(202)));
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn test_hold_has_no_levels() {
        let s = TradingSignal::hold(MarketCondition::Ranging, config(), "nothing");
        assert!(!s.has_signal());
        assert!(s.entry_price.is_none());
        assert_eq!(config().reward_risk_ratio(), Some(dec!(2)));
    }
}
