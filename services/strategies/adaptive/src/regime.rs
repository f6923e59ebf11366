//! Multi-factor market regime classification
//!
//! Four factors feed a bull score and a bear score:
//!
//! | factor | bull | bear |
//! |---|---|---|
//! | price change over `change_lookback` candles | +3 / +2 / +1 | mirrored |
//! | mean of the last `rsi_window` RSI values | +2 at ≥70, +1 at ≥55 | +2 at ≤30, +1 at ≤45 |
//! | EMA 9/21/50 stacking | +2 | +2 |
//! | Bollinger width | squeeze with flat price halves both; expansion gives the leader +1 | |
//!
//! The net score and the averaged RSI then pick one of seven conditions.
//! Every comparison is inclusive, so a value sitting exactly on a threshold
//! lands in the stronger band.

use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{Candle, MarketCondition, RegimeAssessment};

use crate::error::{Result, StrategyError};
use crate::indicators::{self, IndicatorParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    pub min_candles: usize,
    pub change_lookback: usize,
    pub rsi_window: usize,
    /// Percent moves scoring 3, 2 and 1 points
    pub change_major: f64,
    pub change_moderate: f64,
    pub change_minor: f64,
    /// RSI scoring 2 and 1 bull points; bear levels are `100 - x`
    pub rsi_strong: f64,
    pub rsi_mild: f64,
    pub squeeze_width: f64,
    pub squeeze_max_change: f64,
    pub expansion_width: f64,
    pub extreme_net: f64,
    pub extreme_rsi: f64,
    pub strong_net: f64,
    pub strong_rsi: f64,
    pub weak_net: f64,
    pub weak_rsi: f64,
    /// Highest reachable single-side score
    pub max_score: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            min_candles: 30,
            change_lookback: 20,
            rsi_window: 10,
            change_major: 2.0,
            change_moderate: 1.0,
            change_minor: 0.3,
            rsi_strong: 70.0,
            rsi_mild: 55.0,
            squeeze_width: 0.01,
            squeeze_max_change: 0.3,
            expansion_width: 0.05,
            extreme_net: 5.0,
            extreme_rsi: 70.0,
            strong_net: 4.0,
            strong_rsi: 65.0,
            weak_net: 2.0,
            weak_rsi: 55.0,
            max_score: 8.0,
        }
    }
}

impl RegimeThresholds {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.change_major >= self.change_moderate && self.change_moderate >= self.change_minor,
            "regime change bands must be descending"
        );
        anyhow::ensure!(
            self.extreme_net >= self.strong_net && self.strong_net >= self.weak_net,
            "regime net thresholds must be descending"
        );
        anyhow::ensure!(self.max_score > 0.0, "regime max_score must be positive");
        anyhow::ensure!(
            self.min_candles > self.change_lookback,
            "regime min_candles must exceed change_lookback"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmaAlignment {
    Bullish,
    Bearish,
    /// Mixed, or not enough history for the slow EMA
    Neutral,
}

/// Raw inputs to the scoring, exposed so thresholds can be exercised
/// without synthesising candle series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeFactors {
    pub price_change_percent: f64,
    pub rsi_average: f64,
    pub bollinger_width: f64,
    pub ema_alignment: EmaAlignment,
}

#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    thresholds: RegimeThresholds,
    params: IndicatorParams,
}

impl RegimeClassifier {
    pub fn new(thresholds: RegimeThresholds, params: IndicatorParams) -> Self {
        Self { thresholds, params }
    }

    pub fn thresholds(&self) -> &RegimeThresholds {
        &self.thresholds
    }

    pub fn classify(&self, candles: &[Candle]) -> Result<RegimeAssessment> {
        let factors = self.factors(candles)?;
        let assessment = self.classify_factors(factors);
        debug!(
            condition = %assessment.condition,
            confidence = assessment.confidence,
            ?factors,
            "Regime classified"
        );
        Ok(assessment)
    }

    pub fn factors(&self, candles: &[Candle]) -> Result<RegimeFactors> {
        let t = &self.thresholds;
        let p = &self.params;
        if candles.len() < t.min_candles {
            return Err(StrategyError::insufficient(
                "regime",
                t.min_candles,
                candles.len(),
            ));
        }
        let closes = indicators::closes(candles);
        let last = closes[closes.len() - 1];
        let past = closes[closes.len() - 1 - t.change_lookback];
        if past <= 0.0 {
            return Err(StrategyError::Calculation {
                message: format!("non-positive reference close {}", past),
            });
        }
        let price_change_percent = (last - past) / past * 100.0;

        let rsi_series = indicators::rsi_series(&closes, p.rsi_period)?;
        let window = &rsi_series[rsi_series.len().saturating_sub(t.rsi_window)..];
        let rsi_average = window.iter().sum::<f64>() / window.len() as f64;

        let bollinger_width =
            indicators::bollinger(&closes, p.bollinger_period, p.bollinger_k)?.width();

        let ema_alignment = if closes.len() >= p.ema_slow {
            let fast = indicators::ema(&closes, p.ema_fast)?;
            let mid = indicators::ema(&closes, p.ema_mid)?;
            let slow = indicators::ema(&closes, p.ema_slow)?;
            if fast > mid && mid > slow {
                EmaAlignment::Bullish
            } else if fast < mid && mid < slow {
                EmaAlignment::Bearish
            } else {
                EmaAlignment::Neutral
            }
        } else {
            EmaAlignment::Neutral
        };

        Ok(RegimeFactors {
            price_change_percent,
            rsi_average,
            bollinger_width,
            ema_alignment,
        })
    }

    pub fn classify_factors(&self, f: RegimeFactors) -> RegimeAssessment {
        let t = &self.thresholds;
        let mut bull = 0.0_f64;
        let mut bear = 0.0_f64;
        let mut rationale = Vec::new();

        let change = f.price_change_percent;
        let change_points = if change >= t.change_major || change <= -t.change_major {
            3.0
        } else if change >= t.change_moderate || change <= -t.change_moderate {
            2.0
        } else if change >= t.change_minor || change <= -t.change_minor {
            1.0
        } else {
            0.0
        };
        if change > 0.0 {
            bull += change_points;
        } else {
            bear += change_points;
        }
        rationale.push(format!(
            "Price {:+.2}% over {} candles ({} pts)",
            change, t.change_lookback, change_points
        ));

        let rsi = f.rsi_average;
        if rsi >= t.rsi_strong {
            bull += 2.0;
            rationale.push(format!("RSI {:.1} overbought (+2 bull)", rsi));
        } else if rsi >= t.rsi_mild {
            bull += 1.0;
            rationale.push(format!("RSI {:.1} firm (+1 bull)", rsi));
        } else if rsi <= 100.0 - t.rsi_strong {
            bear += 2.0;
            rationale.push(format!("RSI {:.1} oversold (+2 bear)", rsi));
        } else if rsi <= 100.0 - t.rsi_mild {
            bear += 1.0;
            rationale.push(format!("RSI {:.1} soft (+1 bear)", rsi));
        } else {
            rationale.push(format!("RSI {:.1} neutral", rsi));
        }

        match f.ema_alignment {
            EmaAlignment::Bullish => {
                bull += 2.0;
                rationale.push("EMA 9 > 21 > 50 (+2 bull)".to_string());
            }
            EmaAlignment::Bearish => {
                bear += 2.0;
                rationale.push("EMA 9 < 21 < 50 (+2 bear)".to_string());
            }
            EmaAlignment::Neutral => rationale.push("EMAs not stacked".to_string()),
        }

        let width = f.bollinger_width;
        if width < t.squeeze_width && change.abs() < t.squeeze_max_change {
            bull /= 2.0;
            bear /= 2.0;
            rationale.push(format!("Band squeeze {:.4} with flat price (scores halved)", width));
        } else if width > t.expansion_width {
            if bull > bear {
                bull += 1.0;
                rationale.push(format!("Band expansion {:.4} (+1 bull)", width));
            } else if bear > bull {
                bear += 1.0;
                rationale.push(format!("Band expansion {:.4} (+1 bear)", width));
            }
        }

        let net = bull - bear;
        let condition = if net >= t.extreme_net && rsi >= t.extreme_rsi {
            MarketCondition::ExtremeBullish
        } else if net >= t.strong_net && rsi >= t.strong_rsi {
            MarketCondition::StrongBullish
        } else if net >= t.weak_net && rsi >= t.weak_rsi {
            MarketCondition::WeakBullish
        } else if -net >= t.extreme_net && rsi <= 100.0 - t.extreme_rsi {
            MarketCondition::ExtremeBearish
        } else if -net >= t.strong_net && rsi <= 100.0 - t.strong_rsi {
            MarketCondition::StrongBearish
        } else if -net >= t.weak_net && rsi <= 100.0 - t.weak_rsi {
            MarketCondition::WeakBearish
        } else {
            MarketCondition::Ranging
        };
        rationale.push(format!("Score bull {:.1} / bear {:.1}", bull, bear));

        RegimeAssessment {
            condition,
            confidence: ((bull + bear) / t.max_score).clamp(0.0, 1.0),
            rationale,
        }
    }
}
