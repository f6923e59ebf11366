//! Technical indicators over candle windows
//!
//! Every function recomputes from the full input, so identical input always
//! yields identical output. Functions that need more history than they were
//! given fail with [`StrategyError::InsufficientData`].

use serde::{Deserialize, Serialize};
use types::{BollingerBands, Candle, IndicatorSnapshot, Macd};

use crate::error::{Result, StrategyError};

/// Lookback periods used by [`IndicatorEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub ema_fast: usize,
    pub ema_mid: usize,
    pub ema_slow: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub recent_move_window: usize,
    pub volume_window: usize,
    /// Candles required before a full snapshot is attempted
    pub min_history: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            ema_fast: 9,
            ema_mid: 21,
            ema_slow: 50,
            bollinger_period: 20,
            bollinger_k: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            recent_move_window: 5,
            volume_window: 5,
            min_history: 50,
        }
    }
}

/// Computes [`IndicatorSnapshot`]s with a fixed parameter set.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// All indicators at the newest candle.
    pub fn snapshot(&self, candles: &[Candle]) -> Result<IndicatorSnapshot> {
        let p = &self.params;
        if candles.len() < p.min_history {
            return Err(StrategyError::insufficient(
                "snapshot",
                p.min_history,
                candles.len(),
            ));
        }
        let closes = closes(candles);
        let last_close = closes[closes.len() - 1];

        Ok(IndicatorSnapshot {
            rsi: rsi(&closes, p.rsi_period)?,
            ema9: ema(&closes, p.ema_fast)?,
            ema21: ema(&closes, p.ema_mid)?,
            ema50: ema(&closes, p.ema_slow)?,
            bollinger: bollinger(&closes, p.bollinger_period, p.bollinger_k)?,
            macd: macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal)?,
            atr: atr(candles, p.atr_period)?,
            average_recent_move: average_recent_move(candles, p.recent_move_window)?,
            volume_ratio: volume_ratio(candles, p.volume_window)?,
            last_close,
        })
    }

    /// RSI value at every candle from `rsi_period` on
    pub fn rsi_series(&self, candles: &[Candle]) -> Result<Vec<f64>> {
        rsi_series(&closes(candles), self.params.rsi_period)
    }
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

fn require(indicator: &'static str, required: usize, available: usize) -> Result<()> {
    if available < required {
        Err(StrategyError::insufficient(indicator, required, available))
    } else {
        Ok(())
    }
}

pub fn sma(values: &[f64], period: usize) -> Result<f64> {
    require("sma", period.max(1), values.len())?;
    let window = &values[values.len() - period.max(1)..];
    Ok(window.iter().sum::<f64>() / window.len() as f64)
}

/// EMA series seeded with the SMA of the first `period` values. The first
/// element corresponds to `values[period - 1]`.
pub fn ema_series(values: &[f64], period: usize) -> Result<Vec<f64>> {
    let period = period.max(1);
    require("ema", period, values.len())?;
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for v in &values[period..] {
        prev = (v - prev) * k + prev;
        out.push(prev);
    }
    Ok(out)
}

pub fn ema(values: &[f64], period: usize) -> Result<f64> {
    let series = ema_series(values, period)?;
    Ok(series[series.len() - 1])
}

/// Wilder-smoothed RSI. The first element corresponds to `closes[period]`.
pub fn rsi_series(closes: &[f64], period: usize) -> Result<Vec<f64>> {
    let period = period.max(1);
    require("rsi", period + 1, closes.len())?;

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(changes.len() - period + 1);
    out.push(rsi_from(avg_gain, avg_loss));
    let n = period as f64;
    for change in &changes[period..] {
        avg_gain = (avg_gain * (n - 1.0) + change.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-change).max(0.0)) / n;
        out.push(rsi_from(avg_gain, avg_loss));
    }
    Ok(out)
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

pub fn rsi(closes: &[f64], period: usize) -> Result<f64> {
    let series = rsi_series(closes, period)?;
    Ok(series[series.len() - 1])
}

/// Bands over the last `period` closes, population standard deviation.
pub fn bollinger(closes: &[f64], period: usize, k: f64) -> Result<BollingerBands> {
    let period = period.max(1);
    require("bollinger", period, closes.len())?;
    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period as f64;
    let sd = variance.sqrt();
    Ok(BollingerBands {
        upper: mean + k * sd,
        middle: mean,
        lower: mean - k * sd,
    })
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Result<Macd> {
    if fast == 0 || fast >= slow {
        return Err(StrategyError::Calculation {
            message: format!("MACD fast period {} must be below slow period {}", fast, slow),
        });
    }
    let signal = signal.max(1);
    require("macd", slow + signal - 1, closes.len())?;

    let fast_series = ema_series(closes, fast)?;
    let slow_series = ema_series(closes, slow)?;
    // fast_series is longer by (slow - fast); align on the newest values
    let offset = slow - fast;
    let line: Vec<f64> = slow_series
        .iter()
        .enumerate()
        .map(|(i, s)| fast_series[i + offset] - s)
        .collect();

    let value = line[line.len() - 1];
    let signal_value = ema(&line, signal)?;
    Ok(Macd {
        value,
        signal: signal_value,
        histogram: value - signal_value,
    })
}

/// Wilder ATR over true ranges
pub fn atr(candles: &[Candle], period: usize) -> Result<f64> {
    let period = period.max(1);
    require("atr", period + 1, candles.len())?;
    let true_ranges: Vec<f64> = candles
        .windows(2)
        .map(|w| {
            let (prev, cur) = (w[0], w[1]);
            (cur.high - cur.low)
                .max((cur.high - prev.close).abs())
                .max((cur.low - prev.close).abs())
        })
        .collect();

    let n = period as f64;
    let mut value = true_ranges[..period].iter().sum::<f64>() / n;
    for tr in &true_ranges[period..] {
        value = (value * (n - 1.0) + tr) / n;
    }
    Ok(value)
}

/// Mean high-low range of the last `window` candles
pub fn average_recent_move(candles: &[Candle], window: usize) -> Result<f64> {
    let window = window.max(1);
    require("average_recent_move", window, candles.len())?;
    let recent = &candles[candles.len() - window..];
    Ok(recent.iter().map(Candle::range).sum::<f64>() / window as f64)
}

/// Latest volume over the average volume of the last `window` candles.
/// A zero average reads as neutral (1.0).
pub fn volume_ratio(candles: &[Candle], window: usize) -> Result<f64> {
    let window = window.max(1);
    require("volume_ratio", window, candles.len())?;
    let recent = &candles[candles.len() - window..];
    let avg = recent.iter().map(|c| c.volume).sum::<f64>() / window as f64;
    let last = recent[recent.len() - 1].volume;
    Ok(if avg > 0.0 { last / avg } else { 1.0 })
}

/// Fraction of up candles among the last `window`
pub fn up_fraction(candles: &[Candle], window: usize) -> Option<f64> {
    if candles.is_empty() || window == 0 {
        return None;
    }
    let recent = &candles[candles.len().saturating_sub(window)..];
    let ups = recent.iter().filter(|c| c.is_up()).count();
    Some(ups as f64 / recent.len() as f64)
}
