//! Chart structure: support/resistance levels and RSI divergence
//!
//! Both are read-only annotations over a candle window. They feed the
//! session snapshot for display and never gate an entry on their own.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use types::Candle;

use crate::error::{Result, StrategyError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Candles scanned for levels and swings
    pub lookback: usize,
    /// Level bucket width as a fraction of the latest close
    pub bucket_fraction: f64,
    /// Most-touched levels reported
    pub max_levels: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            bucket_fraction: 0.001,
            max_levels: 3,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.lookback >= 3, "analysis lookback must be at least 3");
        anyhow::ensure!(
            self.bucket_fraction > 0.0 && self.bucket_fraction < 0.1,
            "bucket_fraction {} out of range",
            self.bucket_fraction
        );
        anyhow::ensure!(self.max_levels >= 1, "max_levels must be at least 1");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceLevel {
    pub price: f64,
    /// Highs and lows of the window that fell into this bucket
    pub touches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportResistance {
    /// Lowest low of the window
    pub support: f64,
    /// Highest high of the window
    pub resistance: f64,
    /// Most-touched price buckets, most touches first
    pub levels: Vec<PriceLevel>,
    /// Percent from the latest close down to `support`
    pub distance_to_support_percent: f64,
    /// Percent from the latest close up to `resistance`
    pub distance_to_resistance_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RsiDivergence {
    /// Lower price low with a higher RSI low
    pub bullish: bool,
    /// Higher price high with a lower RSI high
    pub bearish: bool,
    pub swing_lows: usize,
    pub swing_highs: usize,
}

/// Rolling extremes plus clustered touch levels over the last `lookback`
/// candles.
pub fn support_resistance(candles: &[Candle], config: &AnalysisConfig) -> Result<SupportResistance> {
    let lookback = config.lookback.max(1);
    if candles.len() < lookback {
        return Err(StrategyError::insufficient(
            "support_resistance",
            lookback,
            candles.len(),
        ));
    }
    let window = &candles[candles.len() - lookback..];
    let close = window[window.len() - 1].close;
    let width = close * config.bucket_fraction;
    if !(width.is_finite() && width > 0.0) {
        return Err(StrategyError::Calculation {
            message: format!("unusable close {} for level buckets", close),
        });
    }

    let support = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let resistance = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);

    let mut buckets: HashMap<i64, usize> = HashMap::new();
    for price in window.iter().flat_map(|c| [c.high, c.low]) {
        *buckets.entry((price / width).round() as i64).or_default() += 1;
    }
    let mut levels: Vec<PriceLevel> = buckets
        .into_iter()
        .map(|(bucket, touches)| PriceLevel {
            price: bucket as f64 * width,
            touches,
        })
        .collect();
    // Ties resolve to the lower price so the order is deterministic
    levels.sort_by(|a, b| b.touches.cmp(&a.touches).then(a.price.total_cmp(&b.price)));
    levels.truncate(config.max_levels);

    Ok(SupportResistance {
        support,
        resistance,
        levels,
        distance_to_support_percent: (close - support) / close * 100.0,
        distance_to_resistance_percent: (resistance - close) / close * 100.0,
    })
}

/// Compare the last two swing lows and swing highs of the closes against
/// the RSI at the same candles.
///
/// `rsi` must be aligned to the end of `candles` (the newest RSI belongs to
/// the newest candle) and cover at least `lookback` values.
pub fn rsi_divergence(candles: &[Candle], rsi: &[f64], lookback: usize) -> Result<RsiDivergence> {
    let lookback = lookback.max(3);
    let available = candles.len().min(rsi.len());
    if available < lookback {
        return Err(StrategyError::insufficient("rsi_divergence", lookback, available));
    }
    let closes: Vec<f64> = candles[candles.len() - lookback..]
        .iter()
        .map(|c| c.close)
        .collect();
    let rsi = &rsi[rsi.len() - lookback..];

    let mut lows: Vec<usize> = Vec::new();
    let mut highs: Vec<usize> = Vec::new();
    for i in 1..lookback - 1 {
        let (prev, cur, next) = (closes[i - 1], closes[i], closes[i + 1]);
        if prev < cur && cur > next {
            highs.push(i);
        }
        if prev > cur && cur < next {
            lows.push(i);
        }
    }

    let bullish = match lows.as_slice() {
        &[.., a, b] => closes[b] < closes[a] && rsi[b] > rsi[a],
        _ => false,
    };
    let bearish = match highs.as_slice() {
        &[.., a, b] => closes[b] > closes[a] && rsi[b] < rsi[a],
        _ => false,
    };

    Ok(RsiDivergence {
        bullish,
        bearish,
        swing_lows: lows.len(),
        swing_highs: highs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(i: i64, close: f64) -> Candle {
        Candle::new(i * 60_000, close, close + 0.5, close - 0.5, close, 1.0, true)
    }

    #[test]
    fn test_levels_cluster_repeated_touches() {
        // Highs keep tagging 101, lows alternate
        let candles: Vec<Candle> = (0..20)
            .map(|i| {
                let low = if i % 2 == 0 { 98.0 } else { 99.0 };
                Candle::new(i * 60_000, 100.0, 101.0, low, 100.0, 1.0, true)
            })
            .collect();
        let sr = support_resistance(&candles, &AnalysisConfig::default()).unwrap();

        assert_eq!(sr.support, 98.0);
        assert_eq!(sr.resistance, 101.0);
        assert_eq!(sr.levels[0].touches, 20);
        assert!((sr.levels[0].price - 101.0).abs() < 1e-9);
        assert_eq!(sr.levels[1].touches, 10);
        assert!((sr.levels[1].price - 98.0).abs() < 1e-9);
        assert!((sr.distance_to_support_percent - 2.0).abs() < 1e-9);
        assert!((sr.distance_to_resistance_percent - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_levels_need_lookback() {
        let candles: Vec<Candle> = (0..5).map(|i| candle(i, 100.0)).collect();
        assert!(matches!(
            support_resistance(&candles, &AnalysisConfig::default()),
            Err(StrategyError::InsufficientData { required: 20, available: 5, .. })
        ));
    }

    #[test]
    fn test_bullish_divergence_on_lower_low_higher_rsi() {
        let closes = [100.0, 98.0, 99.0, 97.0, 98.0];
        let candles: Vec<Candle> = closes.iter().enumerate().map(|(i, c)| candle(i as i64, *c)).collect();
        // RSI at the second low (index 3) is above the first (index 1)
        let rsi = [50.0, 30.0, 40.0, 35.0, 45.0];
        let d = rsi_divergence(&candles, &rsi, 5).unwrap();
        assert!(d.bullish);
        assert!(!d.bearish);
        assert_eq!(d.swing_lows, 2);
        assert_eq!(d.swing_highs, 1);
    }

    #[test]
    fn test_bearish_divergence_on_higher_high_lower_rsi() {
        let closes = [100.0, 102.0, 101.0, 103.0, 102.0];
        let candles: Vec<Candle> = closes.iter().enumerate().map(|(i, c)| candle(i as i64, *c)).collect();
        let rsi = [50.0, 70.0, 60.0, 65.0, 55.0];
        let d = rsi_divergence(&candles, &rsi, 5).unwrap();
        assert!(d.bearish);
        assert!(!d.bullish);

        // Confirming RSI makes no divergence
        let rsi = [50.0, 70.0, 60.0, 75.0, 55.0];
        assert!(!rsi_divergence(&candles, &rsi, 5).unwrap().bearish);
    }

    #[test]
    fn test_divergence_uses_tail_alignment() {
        // Longer candle history than RSI values; only the tail is compared
        let mut closes = vec![90.0; 10];
        closes.extend([100.0, 98.0, 99.0, 97.0, 98.0]);
        let candles: Vec<Candle> = closes.iter().enumerate().map(|(i, c)| candle(i as i64, *c)).collect();
        let rsi = [10.0, 50.0, 30.0, 40.0, 35.0, 45.0];
        assert!(rsi_divergence(&candles, &rsi, 5).unwrap().bullish);
        assert!(rsi_divergence(&candles, &rsi[..4], 5).is_err());
    }
}
