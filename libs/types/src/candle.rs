//! OHLCV candle

use serde::{Deserialize, Serialize};

/// One OHLCV bar for a fixed time bucket.
///
/// `confirmed == false` marks the in-progress bar; it may be replaced by later
/// ticks carrying the same `timestamp_ms`. Confirmed bars never change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start, milliseconds since epoch
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub confirmed: bool,
}

impl Candle {
    pub fn new(
        timestamp_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        confirmed: bool,
    ) -> Self {
        Self {
            timestamp_ms,
            open,
            high,
            low,
            close,
            volume,
            confirmed,
        }
    }

    /// A tick with a zero price or zero volume carries no usable information.
    pub fn is_partial(&self) -> bool {
        self.volume <= 0.0
            || self.open <= 0.0
            || self.high <= 0.0
            || self.low <= 0.0
            || self.close <= 0.0
            || !self.close.is_finite()
    }

    /// High minus low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_up(&self) -> bool {
        self.close > self.open
    }

    pub fn is_down(&self) -> bool {
        self.close < self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_detection() {
        let good = Candle::new(0, 100.0, 101.0, 99.0, 100.5, 12.0, true);
        assert!(!good.is_partial());

        let no_volume = Candle { volume: 0.0, ..good };
        assert!(no_volume.is_partial());

        let no_price = Candle { close: 0.0, ..good };
        assert!(no_price.is_partial());
    }

    #[test]
    fn test_direction_and_range() {
        let c = Candle::new(0, 100.0, 105.0, 98.0, 104.0, 1.0, true);
        assert!(c.is_up());
        assert!(!c.is_down());
        assert_eq!(c.range(), 7.0);
    }
}
