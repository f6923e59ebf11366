//! Subscription topic keys

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::timeframe::Timeframe;

/// Opaque subscription key such as `kline.5.BTCUSDT`, `tickers.BTCUSDT` or `position`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn kline(timeframe: Timeframe, symbol: &str) -> Self {
        Self(format!("kline.{}.{}", timeframe.interval(), symbol))
    }

    pub fn tickers(symbol: &str) -> Self {
        Self(format!("tickers.{}", symbol))
    }

    pub fn position() -> Self {
        Self("position".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when this key is equal to, or a prefix of, `incoming`
    pub fn covers(&self, incoming: &str) -> bool {
        incoming.starts_with(self.0.as_str())
    }

    /// Trailing segment of a dotted topic (`BTCUSDT` for `kline.5.BTCUSDT`)
    pub fn symbol(&self) -> Option<&str> {
        let mut parts = self.0.split('.');
        parts.next()?;
        parts.last().filter(|s| !s.is_empty())
    }

    /// Timeframe of a kline topic
    pub fn timeframe(&self) -> Option<Timeframe> {
        let mut parts = self.0.split('.');
        match (parts.next(), parts.next()) {
            (Some("kline"), Some(interval)) => interval.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let t = Topic::kline(Timeframe::M5, "BTCUSDT");
        assert_eq!(t.as_str(), "kline.5.BTCUSDT");
        assert_eq!(t.symbol(), Some("BTCUSDT"));
        assert_eq!(t.timeframe(), Some(Timeframe::M5));

        assert_eq!(Topic::tickers("ETHUSDT").symbol(), Some("ETHUSDT"));
        assert_eq!(Topic::position().symbol(), None);
        assert_eq!(Topic::position().timeframe(), None);
    }

    #[test]
    fn test_prefix_cover() {
        let t = Topic::from("kline.5");
        assert!(t.covers("kline.5.BTCUSDT"));
        assert!(!t.covers("kline.1.BTCUSDT"));
    }
}
