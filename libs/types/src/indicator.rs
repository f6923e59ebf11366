//! Indicator snapshot types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    /// `(upper - lower) / middle`, zero when the middle band is zero
    pub fn width(&self) -> f64 {
        if self.middle == 0.0 {
            0.0
        } else {
            (self.upper - self.lower) / self.middle
        }
    }

    /// Where `price` sits between the bands: 0 at the lower band, 1 at the upper.
    /// Collapsed bands report 0.5.
    pub fn position(&self, price: f64) -> f64 {
        let span = self.upper - self.lower;
        if span <= 0.0 {
            0.5
        } else {
            (price - self.lower) / span
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub value: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// All indicators evaluated at the newest candle of a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub ema9: f64,
    pub ema21: f64,
    pub ema50: f64,
    pub bollinger: BollingerBands,
    pub macd: Macd,
    pub atr: f64,
    pub average_recent_move: f64,
    /// Latest volume over its 5-period average
    pub volume_ratio: f64,
    pub last_close: f64,
}

impl IndicatorSnapshot {
    pub fn ema_bullish_aligned(&self) -> bool {
        self.ema9 > self.ema21 && self.ema21 > self.ema50
    }

    pub fn ema_bearish_aligned(&self) -> bool {
        self.ema9 < self.ema21 && self.ema21 < self.ema50
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_position() {
        let bb = BollingerBands {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        };
        assert_eq!(bb.position(90.0), 0.0);
        assert_eq!(bb.position(110.0), 1.0);
        assert_eq!(bb.position(100.0), 0.5);
        assert!((bb.width() - 0.2).abs() < 1e-12);
    }
}
