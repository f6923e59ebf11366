//! # Adaptive Strategy - Regime-Aware Signal Generation
//!
//! ## Purpose
//!
//! Turns a live kline stream into trading decisions. Candles are buffered per
//! series, the market regime is classified on a coarse reference timeframe,
//! and each fresh candle on the signal timeframe is evaluated by the rule set
//! matching that regime. A recursive predictor projects the range of the next
//! higher-timeframe candle alongside.
//!
//! ## Integration Points
//!
//! - **Input**: kline topics from [`adapter_service::StreamClient`], REST history
//!   through [`adapter_service::MarketDataClient`]
//! - **Output**: [`types::TradingSignal`]s, orders through
//!   [`adapter_service::TradingClient`], journal records, [`BotSnapshot`]s
//! - **Configuration**: [`BotConfig`], layered TOML plus `ADAPTIVE_*` env overrides
//!
//! ## Architecture Role
//!
//! ```text
//! klines ─▶ CandleBuffer ─▶ IndicatorEngine ─▶ RegimeClassifier ─▶ MarketCondition
//!                                    │                                  │
//!                                    ▼                                  ▼
//!                             PricePredictor                    StrategySelector
//!                                    │                                  │
//!                                    └──────────▶ BotOrchestrator ◀─────┘
//! ```
//!
//! [`Backtester`] replays a candle history through the same classifier and
//! selector offline.
//!
//! Indicator math is `f64`; prices that reach an order are `Decimal`.

pub mod analysis;
pub mod backtest;
pub mod candle_buffer;
pub mod error;
pub mod indicators;
pub mod orchestrator;
pub mod predictor;
pub mod regime;
pub mod selector;
pub mod settings;
pub mod signals;

pub use analysis::{
    rsi_divergence, support_resistance, AnalysisConfig, PriceLevel, RsiDivergence,
    SupportResistance,
};
pub use backtest::{
    AdaptiveRule, BacktestConfig, BacktestReport, Backtester, Entry, EntryRule, ExitReason,
    RsiBandRule, Trade,
};
pub use candle_buffer::{CandleBuffer, IgnoreReason, TickOutcome};
pub use error::{Result, StrategyError};
pub use indicators::{IndicatorEngine, IndicatorParams};
pub use orchestrator::{BotOrchestrator, BotSnapshot, Collaborators, SeriesKey, SignalThrottle};
pub use predictor::{PredictorConfig, PricePredictor, StateProfile, StateProfiles, StepPlan};
pub use regime::{EmaAlignment, RegimeClassifier, RegimeFactors, RegimeThresholds};
pub use selector::{config_for, MarketView, SelectorConfig, StrategySelector};
pub use settings::BotConfig;
pub use signals::SignalStats;
