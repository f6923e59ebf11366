//! Regime-to-strategy selection and entry signals
//!
//! Each [`MarketCondition`] maps to one fixed [`StrategyConfig`]: tighter
//! targets with more leverage near ranging, wider targets with less leverage
//! and a trailing stop at the extremes.
//!
//! Signal evaluation order:
//! 1. breakout / breakdown past the recent close range (extreme conditions only)
//! 2. the condition's RSI rule
//! 3. hold

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{Candle, IndicatorSnapshot, MarketCondition, SignalType, StrategyConfig, TradingSignal};

use crate::indicators::IndicatorEngine;

/// Risk parameters for `condition`.
pub fn config_for(condition: MarketCondition) -> StrategyConfig {
    let (tp, sl, leverage, trailing, description) = match condition {
        MarketCondition::ExtremeBullish => (
            dec!(3.0),
            dec!(1.5),
            3,
            true,
            "Extreme uptrend: wide targets, low leverage, trailing stop",
        ),
        MarketCondition::StrongBullish => {
            (dec!(2.0), dec!(1.0), 5, false, "Strong uptrend: buy pullbacks")
        }
        MarketCondition::WeakBullish => {
            (dec!(1.2), dec!(0.8), 7, false, "Weak uptrend: cautious pullback longs")
        }
        MarketCondition::Ranging => (
            dec!(0.8),
            dec!(0.5),
            10,
            false,
            "Range: fade the bands with tight targets",
        ),
        MarketCondition::WeakBearish => {
            (dec!(1.2), dec!(0.8), 7, false, "Weak downtrend: cautious bounce shorts")
        }
        MarketCondition::StrongBearish => {
            (dec!(2.0), dec!(1.0), 5, false, "Strong downtrend: sell bounces")
        }
        MarketCondition::ExtremeBearish => (
            dec!(3.0),
            dec!(1.5),
            3,
            true,
            "Extreme downtrend: wide targets, low leverage, trailing stop",
        ),
    };
    StrategyConfig {
        take_profit_percent: tp,
        stop_loss_percent: sl,
        recommended_leverage: leverage,
        use_trailing_stop: trailing,
        trailing_stop_trigger_percent: trailing.then_some(dec!(1.5)),
        description: description.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Closes before the current candle that define support and resistance
    pub breakout_lookback: usize,
    /// Fractional margins beyond the level
    pub trend_long_margin: f64,
    pub contrarian_short_margin: f64,
    pub trend_short_margin: f64,
    pub contrarian_long_margin: f64,
    /// Above this RSI an extreme-bullish market only takes contrarian shorts
    pub bullish_exhaustion_rsi: f64,
    pub bearish_trend_rsi: f64,
    pub bearish_exhaustion_rsi: f64,
    pub breakout_base_confidence: f64,
    pub breakout_max_bonus: f64,
    pub lower_band_position: f64,
    pub upper_band_position: f64,
    pub volume_spike_ratio: f64,
    pub pullback_rsi_low: f64,
    pub pullback_rsi_high: f64,
    /// RSI values scanned for a prior extreme visit
    pub extreme_rsi_lookback: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            breakout_lookback: 20,
            trend_long_margin: 0.001,
            contrarian_short_margin: 0.005,
            trend_short_margin: 0.002,
            contrarian_long_margin: 0.005,
            bullish_exhaustion_rsi: 75.0,
            bearish_trend_rsi: 50.0,
            bearish_exhaustion_rsi: 30.0,
            breakout_base_confidence: 0.7,
            breakout_max_bonus: 0.2,
            lower_band_position: 0.15,
            upper_band_position: 0.85,
            volume_spike_ratio: 1.1,
            pullback_rsi_low: 45.0,
            pullback_rsi_high: 55.0,
            extreme_rsi_lookback: 6,
        }
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.breakout_lookback >= 2, "breakout_lookback must be at least 2");
        anyhow::ensure!(
            self.lower_band_position < self.upper_band_position,
            "band positions must be ordered"
        );
        anyhow::ensure!(
            self.pullback_rsi_low < self.pullback_rsi_high,
            "pullback RSI band must be ordered"
        );
        for m in [
            self.trend_long_margin,
            self.contrarian_short_margin,
            self.trend_short_margin,
            self.contrarian_long_margin,
        ] {
            anyhow::ensure!((0.0..0.1).contains(&m), "breakout margin {} out of range", m);
        }
        Ok(())
    }
}

/// Everything a rule looks at, computed once per evaluation.
#[derive(Debug, Clone)]
pub struct MarketView {
    pub snapshot: IndicatorSnapshot,
    /// Recent RSI values, oldest first, ending at the current candle
    pub rsi_history: Vec<f64>,
    /// Highest and lowest close of the lookback, excluding the current candle
    pub resistance: f64,
    pub support: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    config: SelectorConfig,
    engine: IndicatorEngine,
}

impl StrategySelector {
    pub fn new(config: SelectorConfig, engine: IndicatorEngine) -> Self {
        Self { config, engine }
    }

    pub fn config_for(&self, condition: MarketCondition) -> StrategyConfig {
        config_for(condition)
    }

    /// Build the view for `candles` at `price`; `None` without enough history.
    pub fn view(&self, candles: &[Candle], price: f64) -> Option<MarketView> {
        let snapshot = self.engine.snapshot(candles).ok()?;
        let rsi_series = self.engine.rsi_series(candles).ok()?;
        let lookback = self.config.breakout_lookback;
        if candles.len() < lookback + 1 {
            return None;
        }
        let prior = &candles[candles.len() - 1 - lookback..candles.len() - 1];
        let resistance = prior.iter().map(|c| c.close).fold(f64::MIN, f64::max);
        let support = prior.iter().map(|c| c.close).fold(f64::MAX, f64::min);
        let keep = self.config.extreme_rsi_lookback.max(1);
        let rsi_history = rsi_series[rsi_series.len().saturating_sub(keep)..].to_vec();
        Some(MarketView {
            snapshot,
            rsi_history,
            resistance,
            support,
            price,
        })
    }

    /// Decide an entry for `condition` at `current_price`.
    pub fn signal(
        &self,
        condition: MarketCondition,
        candles: &[Candle],
        current_price: Decimal,
    ) -> TradingSignal {
        let config = config_for(condition);
        let Some(price) = current_price.to_f64().filter(|p| p.is_finite() && *p > 0.0) else {
            return TradingSignal::hold(condition, config, "Current price is not usable");
        };
        let Some(view) = self.view(candles, price) else {
            return TradingSignal::hold(
                condition,
                config,
                format!("Insufficient history ({} candles)", candles.len()),
            );
        };
        self.evaluate(condition, &view, current_price)
    }

    pub fn evaluate(
        &self,
        condition: MarketCondition,
        view: &MarketView,
        current_price: Decimal,
    ) -> TradingSignal {
        let config = config_for(condition);
        let decision = self
            .breakout(condition, view)
            .or_else(|| self.condition_rule(condition, view));

        match decision {
            Some((side, confidence, reasoning)) => {
                debug!(%condition, %side, confidence, %reasoning, "Entry signal");
                TradingSignal::entry(side, condition, config, current_price, confidence, reasoning)
            }
            None => TradingSignal::hold(condition, config, self.hold_reason(condition, view)),
        }
    }

    fn breakout(&self, condition: MarketCondition, v: &MarketView) -> Option<(SignalType, f64, String)> {
        let c = &self.config;
        let rsi = v.snapshot.rsi;
        match condition {
            MarketCondition::ExtremeBullish if rsi <= c.bullish_exhaustion_rsi => {
                let level = v.resistance * (1.0 + c.trend_long_margin);
                (v.price > level).then(|| {
                    (
                        SignalType::Long,
                        self.breakout_confidence(v.price / level - 1.0),
                        format!(
                            "Breakout above resistance {:.4} (RSI {:.1})",
                            v.resistance, rsi
                        ),
                    )
                })
            }
            MarketCondition::ExtremeBullish => {
                let level = v.support * (1.0 - c.contrarian_short_margin);
                (v.price < level).then(|| {
                    (
                        SignalType::Short,
                        self.breakout_confidence(1.0 - v.price / level),
                        format!(
                            "Exhausted rally broke support {:.4} (RSI {:.1})",
                            v.support, rsi
                        ),
                    )
                })
            }
            MarketCondition::ExtremeBearish if rsi >= c.bearish_trend_rsi => {
                let level = v.support * (1.0 - c.trend_short_margin);
                (v.price < level).then(|| {
                    (
                        SignalType::Short,
                        self.breakout_confidence(1.0 - v.price / level),
                        format!("Breakdown below support {:.4} (RSI {:.1})", v.support, rsi),
                    )
                })
            }
            MarketCondition::ExtremeBearish if rsi < c.bearish_exhaustion_rsi => {
                let level = v.resistance * (1.0 + c.contrarian_long_margin);
                (v.price > level).then(|| {
                    (
                        SignalType::Long,
                        self.breakout_confidence(v.price / level - 1.0),
                        format!(
                            "Capitulation reversed above resistance {:.4} (RSI {:.1})",
                            v.resistance, rsi
                        ),
                    )
                })
            }
            _ => None,
        }
    }

    /// Base confidence plus up to `breakout_max_bonus` for how far past the
    /// level price already is (1% beyond earns the full bonus).
    fn breakout_confidence(&self, excess: f64) -> f64 {
        let bonus = (excess * 20.0).clamp(0.0, 1.0) * self.config.breakout_max_bonus;
        (self.config.breakout_base_confidence + bonus).min(1.0)
    }

    fn condition_rule(&self, condition: MarketCondition, v: &MarketView) -> Option<(SignalType, f64, String)> {
        let c = &self.config;
        let s = &v.snapshot;
        let rsi = s.rsi;
        let in_pullback = rsi >= c.pullback_rsi_low && rsi <= c.pullback_rsi_high;

        match condition {
            MarketCondition::Ranging => {
                let position = s.bollinger.position(v.price);
                let spike = s.volume_ratio >= c.volume_spike_ratio;
                let bonus = if spike { 0.1 } else { 0.0 };
                let volume_note = if spike {
                    format!(", volume {:.2}x", s.volume_ratio)
                } else {
                    String::new()
                };
                if position <= c.lower_band_position && rsi < 35.0 {
                    Some((
                        SignalType::Long,
                        0.6 + bonus,
                        format!(
                            "Range low: band position {:.2}, RSI {:.1}{}",
                            position, rsi, volume_note
                        ),
                    ))
                } else if position >= c.upper_band_position && rsi > 65.0 {
                    Some((
                        SignalType::Short,
                        0.6 + bonus,
                        format!(
                            "Range high: band position {:.2}, RSI {:.1}{}",
                            position, rsi, volume_note
                        ),
                    ))
                } else {
                    None
                }
            }
            MarketCondition::WeakBullish | MarketCondition::StrongBullish => {
                let strong = condition == MarketCondition::StrongBullish;
                let trend_ok = v.price > s.ema21 && (!strong || s.ema9 > s.ema21);
                (in_pullback && trend_ok).then(|| {
                    (
                        SignalType::Long,
                        if strong { 0.7 } else { 0.6 },
                        format!("Pullback to RSI {:.1} above EMA21 {:.4}", rsi, s.ema21),
                    )
                })
            }
            MarketCondition::WeakBearish | MarketCondition::StrongBearish => {
                let strong = condition == MarketCondition::StrongBearish;
                let trend_ok = v.price < s.ema21 && (!strong || s.ema9 < s.ema21);
                (in_pullback && trend_ok).then(|| {
                    (
                        SignalType::Short,
                        if strong { 0.7 } else { 0.6 },
                        format!("Bounce to RSI {:.1} below EMA21 {:.4}", rsi, s.ema21),
                    )
                })
            }
            MarketCondition::ExtremeBullish => {
                let peak = v.rsi_history.iter().copied().fold(f64::MIN, f64::max);
                (peak >= 70.0 && (50.0..=65.0).contains(&rsi)).then(|| {
                    (
                        SignalType::Long,
                        0.65,
                        format!("RSI cooled from {:.1} to {:.1}", peak, rsi),
                    )
                })
            }
            MarketCondition::ExtremeBearish => {
                let trough = v.rsi_history.iter().copied().fold(f64::MAX, f64::min);
                (trough <= 30.0 && (35.0..=50.0).contains(&rsi)).then(|| {
                    (
                        SignalType::Short,
                        0.65,
                        format!("RSI recovered from {:.1} to {:.1}", trough, rsi),
                    )
                })
            }
        }
    }

    fn hold_reason(&self, condition: MarketCondition, v: &MarketView) -> String {
        format!(
            "No {} setup: RSI {:.1}, band position {:.2}, range {:.4}-{:.4}",
            condition,
            v.snapshot.rsi,
            v.snapshot.bollinger.position(v.price),
            v.support,
            v.resistance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{BollingerBands, Macd};

    fn view(rsi: f64, price: f64) -> MarketView {
        MarketView {
            snapshot: IndicatorSnapshot {
                rsi,
                ema9: 100.0,
                ema21: 99.0,
                ema50: 98.0,
                bollinger: BollingerBands {
                    upper: 105.0,
                    middle: 100.0,
                    lower: 95.0,
                },
                macd: Macd {
                    value: 0.0,
                    signal: 0.0,
                    histogram: 0.0,
                },
                atr: 1.0,
                average_recent_move: 1.0,
                volume_ratio: 1.0,
                last_close: price,
            },
            rsi_history: vec![rsi; 6],
            resistance: 102.0,
            support: 97.0,
            price,
        }
    }

    #[test]
    fn test_config_table_shape() {
        let ranging = config_for(MarketCondition::Ranging);
        let extreme = config_for(MarketCondition::ExtremeBullish);
        assert!(ranging.recommended_leverage > extreme.recommended_leverage);
        assert!(ranging.take_profit_percent < extreme.take_profit_percent);
        assert!(extreme.use_trailing_stop);
        assert!(!config_for(MarketCondition::StrongBearish).use_trailing_stop);
        for c in MarketCondition::ALL {
            assert!(config_for(c).take_profit_percent > config_for(c).stop_loss_percent);
        }
    }

    #[test]
    fn test_contrarian_short_needs_stricter_margin() {
        let s = StrategySelector::default();
        // 0.3% under support: inside the 0.5% contrarian margin
        let sig = s.evaluate(MarketCondition::ExtremeBullish, &view(80.0, 96.71), dec!(96.71));
        assert!(!sig.has_signal());
        let sig = s.evaluate(MarketCondition::ExtremeBullish, &view(80.0, 96.4), dec!(96.4));
        assert_eq!(sig.signal_type, SignalType::Short);
    }

    #[test]
    fn test_ranging_band_fade_with_volume_bonus() {
        let s = StrategySelector::default();
        let mut v = view(30.0, 95.5);
        let quiet = s.evaluate(MarketCondition::Ranging, &v, dec!(95.5));
        assert_eq!(quiet.signal_type, SignalType::Long);
        v.snapshot.volume_ratio = 1.5;
        let loud = s.evaluate(MarketCondition::Ranging, &v, dec!(95.5));
        assert!(loud.confidence > quiet.confidence);
        assert_eq!(loud.take_profit_price, Some(dec!(96.264)));
    }

    #[test]
    fn test_strong_bull_pullback_requires_trend() {
        let s = StrategySelector::default();
        let sig = s.evaluate(MarketCondition::StrongBullish, &view(50.0, 100.0), dec!(100));
        assert_eq!(sig.signal_type, SignalType::Long);
        let sig = s.evaluate(MarketCondition::StrongBullish, &view(50.0, 98.5), dec!(98.5));
        assert!(!sig.has_signal());
    }

    #[test]
    fn test_extreme_without_breakout_needs_prior_visit() {
        let s = StrategySelector::default();
        let mut v = view(60.0, 101.0);
        assert!(!s.evaluate(MarketCondition::ExtremeBullish, &v, dec!(101)).has_signal());
        v.rsi_history = vec![72.0, 68.0, 64.0, 62.0, 61.0, 60.0];
        let sig = s.evaluate(MarketCondition::ExtremeBullish, &v, dec!(101));
        assert_eq!(sig.signal_type, SignalType::Long);
    }

    #[test]
    fn test_insufficient_history_holds() {
        let s = StrategySelector::default();
        let sig = s.signal(MarketCondition::Ranging, &[], dec!(100));
        assert!(!sig.has_signal());
        assert!(sig.reasoning.contains("Insufficient"));
    }
}
