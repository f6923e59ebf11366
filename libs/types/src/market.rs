//! Regime and connection state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seven ordered market regimes, bearish to bullish.
///
/// The derived `Ord` follows declaration order so that
/// `ExtremeBearish < ... < Ranging < ... < ExtremeBullish`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MarketCondition {
    ExtremeBearish,
    StrongBearish,
    WeakBearish,
    #[default]
    Ranging,
    WeakBullish,
    StrongBullish,
    ExtremeBullish,
}

impl MarketCondition {
    pub const ALL: [MarketCondition; 7] = [
        MarketCondition::ExtremeBearish,
        MarketCondition::StrongBearish,
        MarketCondition::WeakBearish,
        MarketCondition::Ranging,
        MarketCondition::WeakBullish,
        MarketCondition::StrongBullish,
        MarketCondition::ExtremeBullish,
    ];

    pub fn is_bullish(self) -> bool {
        self > MarketCondition::Ranging
    }

    pub fn is_bearish(self) -> bool {
        self < MarketCondition::Ranging
    }

    pub fn is_extreme(self) -> bool {
        matches!(
            self,
            MarketCondition::ExtremeBearish | MarketCondition::ExtremeBullish
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            MarketCondition::ExtremeBearish => "extreme bearish",
            MarketCondition::StrongBearish => "strong bearish",
            MarketCondition::WeakBearish => "weak bearish",
            MarketCondition::Ranging => "ranging",
            MarketCondition::WeakBullish => "weak bullish",
            MarketCondition::StrongBullish => "strong bullish",
            MarketCondition::ExtremeBullish => "extreme bullish",
        }
    }
}

impl fmt::Display for MarketCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of regime classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeAssessment {
    pub condition: MarketCondition,
    /// In `[0, 1]`
    pub confidence: f64,
    /// Contributing factors, in evaluation order
    pub rationale: Vec<String>,
}

impl RegimeAssessment {
    pub fn summary(&self) -> String {
        format!(
            "{} ({:.0}%): {}",
            self.condition,
            self.confidence * 100.0,
            self.rationale.join("; ")
        )
    }
}

/// Stream connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_ordering() {
        assert!(MarketCondition::ExtremeBearish < MarketCondition::StrongBearish);
        assert!(MarketCondition::WeakBullish > MarketCondition::Ranging);
        assert!(MarketCondition::StrongBullish.is_bullish());
        assert!(MarketCondition::WeakBearish.is_bearish());
        assert!(!MarketCondition::Ranging.is_bullish());
        assert!(!MarketCondition::Ranging.is_bearish());
        assert!(MarketCondition::ExtremeBullish.is_extreme());
        assert!(!MarketCondition::StrongBullish.is_extreme());
    }

    #[test]
    fn test_condition_serde() {
        let json = serde_json::to_string(&MarketCondition::StrongBearish).unwrap();
        assert_eq!(json, "\"strong_bearish\"");
    }
}
