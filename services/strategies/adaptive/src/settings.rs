//! Service settings
//!
//! One [`BotConfig`] per process, loaded in layers by
//! [`config::load_config_file`]: compiled defaults, then the TOML file, then
//! `ADAPTIVE_<SECTION>__<KEY>` environment overrides.

use adapter_service::{RestSettings, StreamSettings};
use anyhow::{Context, Result};
use config::service::{rest, strategies};
use config::LoggingConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strategy_shared::ConfigSection;
use types::Timeframe;

use crate::analysis::AnalysisConfig;
use crate::backtest::BacktestConfig;
use crate::indicators::IndicatorParams;
use crate::predictor::PredictorConfig;
use crate::regime::RegimeThresholds;
use crate::selector::SelectorConfig;

pub const ENV_PREFIX: &str = "ADAPTIVE";
pub const CONFIG_PATH_ENV: &str = "ADAPTIVE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "configs/adaptive.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub stream: StreamSettings,
    pub market: MarketSettings,
    pub orchestrator: OrchestratorSettings,
    pub indicators: IndicatorParams,
    pub regime: RegimeThresholds,
    pub selector: SelectorConfig,
    pub predictor: PredictorConfig,
    pub analysis: AnalysisConfig,
    pub backtest: BacktestConfig,
    pub logging: LoggingConfig,
    pub journal: JournalSettings,
}

/// What to trade and which series to watch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub symbol: String,
    /// Timeframe whose candles drive signal evaluation
    pub signal_timeframe: Timeframe,
    /// Coarser timeframe used for regime classification and prediction context
    pub reference_timeframe: Timeframe,
    pub prediction_interval_minutes: u32,
    pub rest: RestSettings,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            signal_timeframe: Timeframe::M5,
            reference_timeframe: Timeframe::H4,
            prediction_interval_minutes: 240,
            rest: RestSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Minimum spacing between signal evaluations
    pub signal_throttle_ms: u64,
    pub regime_refresh_secs: u64,
    pub account_poll_secs: u64,
    pub candle_buffer_capacity: usize,
    /// Candles fetched per series when seeding
    pub seed_limit: usize,
    /// Place orders for entry signals while running
    pub auto_trade: bool,
    pub order_qty: Decimal,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            signal_throttle_ms: strategies::SIGNAL_THROTTLE_MS,
            regime_refresh_secs: strategies::REGIME_REFRESH_SECS,
            account_poll_secs: strategies::ACCOUNT_POLL_SECS,
            candle_buffer_capacity: strategies::CANDLE_BUFFER_CAPACITY,
            seed_limit: rest::SEED_LIMIT,
            auto_trade: true,
            order_qty: dec!(0.001),
        }
    }
}

impl OrchestratorSettings {
    pub fn signal_throttle(&self) -> Duration {
        Duration::from_millis(self.signal_throttle_ms)
    }

    pub fn regime_refresh(&self) -> Duration {
        Duration::from_secs(self.regime_refresh_secs)
    }

    pub fn account_poll(&self) -> Duration {
        Duration::from_secs(self.account_poll_secs)
    }
}

/// Where log and order records go; in memory when `dir` is unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalSettings {
    pub dir: Option<String>,
}

impl ConfigSection for MarketSettings {
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.symbol.trim().is_empty(), "market.symbol must not be empty");
        anyhow::ensure!(
            self.reference_timeframe.minutes() >= self.signal_timeframe.minutes(),
            "reference timeframe {} is finer than signal timeframe {}",
            self.reference_timeframe,
            self.signal_timeframe
        );
        let base = self.signal_timeframe.minutes();
        anyhow::ensure!(
            self.prediction_interval_minutes >= base && self.prediction_interval_minutes % base == 0,
            "prediction interval {}m is not a multiple of {}",
            self.prediction_interval_minutes,
            self.signal_timeframe
        );
        self.rest.validate()?;
        Ok(())
    }
}

impl ConfigSection for OrchestratorSettings {
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.signal_throttle_ms >= strategies::SIGNAL_THROTTLE_MS,
            "signal_throttle_ms must be at least {}",
            strategies::SIGNAL_THROTTLE_MS
        );
        anyhow::ensure!(
            self.regime_refresh_secs > 0 && self.account_poll_secs > 0,
            "periodic task intervals must be non-zero"
        );
        anyhow::ensure!(
            self.candle_buffer_capacity >= 50,
            "candle_buffer_capacity must hold at least 50 candles"
        );
        anyhow::ensure!(self.order_qty > Decimal::ZERO, "order_qty must be positive");
        Ok(())
    }
}

impl ConfigSection for BotConfig {
    fn validate(&self) -> Result<()> {
        self.stream.validate().context("invalid [stream] section")?;
        self.market.validate().context("invalid [market] section")?;
        self.orchestrator
            .validate()
            .context("invalid [orchestrator] section")?;
        self.regime.validate().context("invalid [regime] section")?;
        self.selector.validate().context("invalid [selector] section")?;
        self.predictor
            .validate()
            .context("invalid [predictor] section")?;
        self.analysis.validate().context("invalid [analysis] section")?;
        self.backtest.validate().context("invalid [backtest] section")?;
        anyhow::ensure!(
            self.orchestrator.candle_buffer_capacity >= self.indicators.min_history,
            "candle buffers are smaller than the indicator history"
        );
        Ok(())
    }
}

impl BotConfig {
    /// Layered load from `path`, with `${VAR}` expansion in URLs, validated.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg: BotConfig = config::load_config_file(path, ENV_PREFIX, &BotConfig::default())?;
        cfg.stream.url = config::expand_env(&cfg.stream.url)?;
        cfg.market.rest.base_url = config::expand_env(&cfg.market.rest.base_url)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_validate() {
        BotConfig::default().validate().unwrap();
    }

    #[test]
    fn test_toml_sections_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adaptive.toml");
        fs::write(
            &path,
            r#"
[market]
symbol = "ETHUSDT"
signal_timeframe = "15"
reference_timeframe = "1h"
prediction_interval_minutes = 60

[orchestrator]
signal_throttle_ms = 2500
order_qty = "0.05"

[stream.reconnect]
kind = "exponential"
base_ms = 500
max_ms = 8000
"#,
        )
        .unwrap();

        let cfg = BotConfig::load(&path).unwrap();
        assert_eq!(cfg.market.symbol, "ETHUSDT");
        assert_eq!(cfg.market.signal_timeframe, Timeframe::M15);
        assert_eq!(cfg.market.reference_timeframe, Timeframe::H1);
        assert_eq!(cfg.orchestrator.signal_throttle(), Duration::from_millis(2500));
        assert_eq!(cfg.orchestrator.order_qty, dec!(0.05));
        assert_eq!(cfg.regime, RegimeThresholds::default());
    }

    #[test]
    fn test_backtest_fee_bounds() {
        let mut cfg = BotConfig::default();
        cfg.backtest.fee_rate = 0.05;
        assert!(cfg.validate().is_err());
        cfg.backtest.fee_rate = 0.001;
        cfg.validate().unwrap();
    }

    #[test]
    fn test_throttle_floor_enforced() {
        let mut cfg = BotConfig::default();
        cfg.orchestrator.signal_throttle_ms = 200;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_misaligned_prediction_interval_rejected() {
        let mut cfg = BotConfig::default();
        cfg.market.signal_timeframe = Timeframe::M15;
        cfg.market.prediction_interval_minutes = 40;
        assert!(cfg.validate().is_err());
    }
}
