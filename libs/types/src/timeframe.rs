//! Candle timeframes and their wire intervals

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown timeframe: {0}")]
pub struct ParseTimeframeError(pub String);

/// Supported candle intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H12,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 11] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H12,
        Timeframe::D1,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H2 => 120,
            Timeframe::H4 => 240,
            Timeframe::H6 => 360,
            Timeframe::H12 => 720,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration_ms(self) -> i64 {
        i64::from(self.minutes()) * 60_000
    }

    /// Interval token used in kline topics and REST queries (`"5"`, `"240"`, `"D"`).
    pub fn interval(self) -> &'static str {
        match self {
            Timeframe::M1 => "1",
            Timeframe::M3 => "3",
            Timeframe::M5 => "5",
            Timeframe::M15 => "15",
            Timeframe::M30 => "30",
            Timeframe::H1 => "60",
            Timeframe::H2 => "120",
            Timeframe::H4 => "240",
            Timeframe::H6 => "360",
            Timeframe::H12 => "720",
            Timeframe::D1 => "D",
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|tf| tf.minutes() == minutes)
    }

    /// Start of the bucket containing `timestamp_ms`.
    pub fn bucket_start(self, timestamp_ms: i64) -> i64 {
        let d = self.duration_ms();
        timestamp_ms.div_euclid(d) * d
    }

    /// Start of the bucket after the one containing `timestamp_ms`.
    pub fn next_boundary(self, timestamp_ms: i64) -> i64 {
        self.bucket_start(timestamp_ms) + self.duration_ms()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.minutes();
        if m >= 1440 {
            write!(f, "{}d", m / 1440)
        } else if m >= 60 {
            write!(f, "{}h", m / 60)
        } else {
            write!(f, "{}m", m)
        }
    }
}

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    /// Accepts wire intervals (`"5"`, `"240"`, `"D"`) and labels (`"5m"`, `"4h"`, `"1d"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let lower = raw.to_ascii_lowercase();
        let err = || ParseTimeframeError(raw.to_string());

        if lower == "d" {
            return Ok(Timeframe::D1);
        }

        let (digits, unit) = match lower.find(|c: char| !c.is_ascii_digit()) {
            Some(idx) => lower.split_at(idx),
            None => (lower.as_str(), ""),
        };
        let n: u32 = digits.parse().map_err(|_| err())?;
        let minutes = match unit {
            "" | "m" | "min" => n,
            "h" => n * 60,
            "d" => n * 1440,
            _ => return Err(err()),
        };
        Self::from_minutes(minutes).ok_or_else(err)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = ParseTimeframeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels_and_intervals() {
        assert_eq!("5".parse::<Timeframe>().unwrap(), Timeframe::M5);
        assert_eq!("5m".parse::<Timeframe>().unwrap(), Timeframe::M5);
        assert_eq!("240".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert_eq!("D".parse::<Timeframe>().unwrap(), Timeframe::D1);
        assert_eq!("1d".parse::<Timeframe>().unwrap(), Timeframe::D1);
        assert!("7m".parse::<Timeframe>().is_err());
        assert!("abc".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
            assert_eq!(tf.interval().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn test_boundaries() {
        let tf = Timeframe::H4;
        let ts = 4 * 3_600_000 + 125_000;
        assert_eq!(tf.bucket_start(ts), 4 * 3_600_000);
        assert_eq!(tf.next_boundary(ts), 8 * 3_600_000);
        assert_eq!(tf.next_boundary(4 * 3_600_000), 8 * 3_600_000);
    }
}
