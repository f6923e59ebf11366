//! Signal bookkeeping

use serde::Serialize;
use types::{SignalType, TradingSignal};

/// Signal generation statistics
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SignalStats {
    pub total_signals: u64,
    pub long_signals: u64,
    pub short_signals: u64,
    pub hold_signals: u64,
    /// Rolling mean over entry signals only
    pub avg_confidence: f64,
    pub last_signal_ms: Option<i64>,
}

impl SignalStats {
    /// Update stats with a new signal
    pub fn record_signal(&mut self, signal: &TradingSignal, at_ms: i64) {
        self.total_signals += 1;

        match signal.signal_type {
            SignalType::Long => self.long_signals += 1,
            SignalType::Short => self.short_signals += 1,
            SignalType::Hold => {
                self.hold_signals += 1;
                return;
            }
        }

        let entries = self.long_signals + self.short_signals;
        let total_confidence = self.avg_confidence * (entries - 1) as f64 + signal.confidence;
        self.avg_confidence = total_confidence / entries as f64;
        self.last_signal_ms = Some(at_ms);
    }

    pub fn entries(&self) -> u64 {
        self.long_signals + self.short_signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::config_for;
    use rust_decimal_macros::dec;
    use types::MarketCondition;

    #[test]
    fn test_signal_stats() {
        let mut stats = SignalStats::default();
        let c = MarketCondition::Ranging;
        let long = TradingSignal::entry(SignalType::Long, c, config_for(c), dec!(100), 0.8, "a");
        let short = TradingSignal::entry(SignalType::Short, c, config_for(c), dec!(100), 0.6, "b");
        let hold = TradingSignal::hold(c, config_for(c), "c");

        stats.record_signal(&long, 1);
        stats.record_signal(&hold, 2);
        stats.record_signal(&short, 3);

        assert_eq!(stats.total_signals, 3);
        assert_eq!(stats.entries(), 2);
        assert_eq!(stats.hold_signals, 1);
        assert!((stats.avg_confidence - 0.7).abs() < 1e-12);
        assert_eq!(stats.last_signal_ms, Some(3));
    }
}
