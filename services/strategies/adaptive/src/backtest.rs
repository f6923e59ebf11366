//! Historical replay of entry rules with take-profit and stop-loss exits
//!
//! ## Replay model
//!
//! - One position at a time; entries fill at the close of the candle that
//!   produced them.
//! - Exits are checked from the next candle on against its high and low.
//!   When one candle spans both levels the stop is assumed to fill first.
//! - A position still open after the last candle is closed at its close.
//! - Every round trip pays `fee_rate` on entry and on exit.
//!
//! PnL is tracked in percent of the entry price, unlevered.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};
use types::{Candle, SignalType};

use crate::indicators::rsi_series;
use crate::regime::RegimeClassifier;
use crate::selector::StrategySelector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Fraction charged per fill (0.0002 = 0.02%)
    pub fee_rate: f64,
    /// Candles skipped before the first entry check
    pub warmup: usize,
    /// Trailing candles handed to the entry rule
    pub window: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.0002,
            warmup: 50,
            window: 200,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (0.0..0.01).contains(&self.fee_rate),
            "fee_rate {} out of range",
            self.fee_rate
        );
        anyhow::ensure!(self.window >= 2, "backtest window must be at least 2");
        Ok(())
    }
}

/// Entry decided by a rule at one candle
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub side: SignalType,
    pub take_profit_percent: f64,
    pub stop_loss_percent: f64,
    pub reason: String,
}

/// Decides entries from a trailing candle window (oldest first, ending at
/// the candle being replayed).
pub trait EntryRule {
    fn name(&self) -> &str;

    fn entry(&self, window: &[Candle]) -> Option<Entry>;
}

/// The live pipeline: regime from the window, then the selector's signal
/// with the regime's TP/SL percentages.
pub struct AdaptiveRule {
    classifier: RegimeClassifier,
    selector: StrategySelector,
}

impl AdaptiveRule {
    pub fn new(classifier: RegimeClassifier, selector: StrategySelector) -> Self {
        Self {
            classifier,
            selector,
        }
    }
}

impl EntryRule for AdaptiveRule {
    fn name(&self) -> &str {
        "adaptive"
    }

    fn entry(&self, window: &[Candle]) -> Option<Entry> {
        let regime = self.classifier.classify(window).ok()?;
        let price = Decimal::try_from(window.last()?.close).ok()?.round_dp(8);
        let signal = self.selector.signal(regime.condition, window, price);
        if !signal.has_signal() {
            return None;
        }
        let config = &signal.strategy_config;
        Some(Entry {
            side: signal.signal_type,
            take_profit_percent: config.take_profit_percent.to_f64()?,
            stop_loss_percent: config.stop_loss_percent.to_f64()?,
            reason: format!("{}: {}", signal.condition, signal.reasoning),
        })
    }
}

/// Long whenever RSI sits inside `[rsi_min, rsi_max]`, fixed TP/SL.
#[derive(Debug, Clone, PartialEq)]
pub struct RsiBandRule {
    pub rsi_period: usize,
    pub rsi_min: f64,
    pub rsi_max: f64,
    pub take_profit_percent: f64,
    pub stop_loss_percent: f64,
}

impl EntryRule for RsiBandRule {
    fn name(&self) -> &str {
        "rsi_band"
    }

    fn entry(&self, window: &[Candle]) -> Option<Entry> {
        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
        let rsi = *rsi_series(&closes, self.rsi_period).ok()?.last()?;
        (rsi >= self.rsi_min && rsi <= self.rsi_max).then(|| Entry {
            side: SignalType::Long,
            take_profit_percent: self.take_profit_percent,
            stop_loss_percent: self.stop_loss_percent,
            reason: format!("RSI {:.1} in [{}, {}]", rsi, self.rsi_min, self.rsi_max),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    /// Still open when the data ran out
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::TakeProfit => "TP",
            ExitReason::StopLoss => "SL",
            ExitReason::EndOfData => "END",
        };
        f.write_str(s)
    }
}

/// One closed round trip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub side: SignalType,
    pub entry_ms: i64,
    pub exit_ms: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Net of both fees
    pub pnl_percent: f64,
    pub exit_reason: ExitReason,
    pub bars_held: usize,
    pub reason: String,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl_percent > 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestReport {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent of trades with positive net PnL
    pub win_rate: f64,
    /// Sum of per-trade net PnL percentages
    pub total_pnl_percent: f64,
    /// Return of reinvesting the full balance into every trade
    pub compounded_return_percent: f64,
    pub avg_win_percent: f64,
    pub avg_loss_percent: f64,
    /// Gross wins over gross losses; `None` without a losing trade
    pub profit_factor: Option<f64>,
    /// Largest peak-to-trough fall of the compounded equity curve
    pub max_drawdown_percent: f64,
    pub avg_bars_held: f64,
    pub trades: Vec<Trade>,
}

impl BacktestReport {
    pub fn from_trades(trades: Vec<Trade>) -> Self {
        if trades.is_empty() {
            return Self::default();
        }
        let total = trades.len();
        let wins: Vec<f64> = trades.iter().filter(|t| t.is_win()).map(|t| t.pnl_percent).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| !t.is_win()).map(|t| t.pnl_percent).collect();
        let mean = |v: &[f64]| {
            if v.is_empty() {
                0.0
            } else {
                v.iter().sum::<f64>() / v.len() as f64
            }
        };

        let gross_win: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum::<f64>().abs();
        let profit_factor = (gross_loss > 0.0).then(|| gross_win / gross_loss);

        let mut equity = 1.0_f64;
        let mut peak = 1.0_f64;
        let mut max_drawdown = 0.0_f64;
        for trade in &trades {
            equity *= 1.0 + trade.pnl_percent / 100.0;
            peak = peak.max(equity);
            max_drawdown = max_drawdown.max((peak - equity) / peak * 100.0);
        }

        Self {
            total_trades: total,
            wins: wins.len(),
            losses: losses.len(),
            win_rate: wins.len() as f64 / total as f64 * 100.0,
            total_pnl_percent: trades.iter().map(|t| t.pnl_percent).sum(),
            compounded_return_percent: (equity - 1.0) * 100.0,
            avg_win_percent: mean(&wins),
            avg_loss_percent: mean(&losses),
            profit_factor,
            max_drawdown_percent: max_drawdown,
            avg_bars_held: trades.iter().map(|t| t.bars_held as f64).sum::<f64>() / total as f64,
            trades,
        }
    }
}

struct OpenTrade {
    entry: Entry,
    index: usize,
    entry_ms: i64,
    price: f64,
}

impl OpenTrade {
    fn levels(&self) -> (f64, f64) {
        let tp = self.entry.take_profit_percent / 100.0;
        let sl = self.entry.stop_loss_percent / 100.0;
        match self.entry.side {
            SignalType::Short => (self.price * (1.0 - tp), self.price * (1.0 + sl)),
            _ => (self.price * (1.0 + tp), self.price * (1.0 - sl)),
        }
    }

    /// Exit price and reason if `candle` reaches a level
    fn exit_on(&self, candle: &Candle) -> Option<(f64, ExitReason)> {
        let (tp, sl) = self.levels();
        match self.entry.side {
            SignalType::Short if candle.high >= sl => Some((sl, ExitReason::StopLoss)),
            SignalType::Short if candle.low <= tp => Some((tp, ExitReason::TakeProfit)),
            SignalType::Short => None,
            _ if candle.low <= sl => Some((sl, ExitReason::StopLoss)),
            _ if candle.high >= tp => Some((tp, ExitReason::TakeProfit)),
            _ => None,
        }
    }

    fn close(
        self,
        exit_ms: i64,
        exit_index: usize,
        exit_price: f64,
        reason: ExitReason,
        fee_rate: f64,
    ) -> Trade {
        let direction = if self.entry.side == SignalType::Short { -1.0 } else { 1.0 };
        let gross = direction * (exit_price - self.price) / self.price * 100.0;
        Trade {
            side: self.entry.side,
            entry_ms: self.entry_ms,
            exit_ms,
            entry_price: self.price,
            exit_price,
            pnl_percent: gross - 2.0 * fee_rate * 100.0,
            exit_reason: reason,
            bars_held: exit_index - self.index,
            reason: self.entry.reason,
        }
    }
}

/// Replays a candle history through an [`EntryRule`].
#[derive(Debug, Clone, Default)]
pub struct Backtester {
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run(&self, candles: &[Candle], rule: &dyn EntryRule) -> BacktestReport {
        let fee_rate = self.config.fee_rate;
        let window = self.config.window.max(1);
        let mut trades = Vec::new();
        let mut open: Option<OpenTrade> = None;

        for (i, candle) in candles.iter().enumerate().skip(self.config.warmup) {
            if let Some(position) = open.take() {
                match position.exit_on(candle) {
                    Some((price, reason)) => {
                        let trade = position.close(candle.timestamp_ms, i, price, reason, fee_rate);
                        debug!(
                            side = %trade.side,
                            exit = %trade.exit_reason,
                            pnl = trade.pnl_percent,
                            bars = trade.bars_held,
                            "Backtest trade closed"
                        );
                        trades.push(trade);
                    }
                    None => open = Some(position),
                }
                continue;
            }

            let start = (i + 1).saturating_sub(window);
            if let Some(entry) = rule.entry(&candles[start..=i]) {
                if entry.side == SignalType::Hold {
                    continue;
                }
                open = Some(OpenTrade {
                    entry,
                    index: i,
                    entry_ms: candle.timestamp_ms,
                    price: candle.close,
                });
            }
        }

        if let (Some(position), Some(last)) = (open, candles.last()) {
            let last_index = candles.len() - 1;
            trades.push(position.close(
                last.timestamp_ms,
                last_index,
                last.close,
                ExitReason::EndOfData,
                fee_rate,
            ));
        }

        let report = BacktestReport::from_trades(trades);
        info!(
            rule = rule.name(),
            candles = candles.len(),
            trades = report.total_trades,
            win_rate = report.win_rate,
            pnl = report.total_pnl_percent,
            max_drawdown = report.max_drawdown_percent,
            "Backtest finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEE: f64 = 0.0002;

    /// Enters once, on the candle with `at_ms`
    struct EnterAt {
        at_ms: i64,
        side: SignalType,
    }

    impl EntryRule for EnterAt {
        fn name(&self) -> &str {
            "enter_at"
        }

        fn entry(&self, window: &[Candle]) -> Option<Entry> {
            (window.last()?.timestamp_ms == self.at_ms).then(|| Entry {
                side: self.side,
                take_profit_percent: 2.0,
                stop_loss_percent: 1.0,
                reason: "test".into(),
            })
        }
    }

    fn flat(n: usize) -> Vec<Candle> {
        (0..n as i64)
            .map(|i| Candle::new(i * 60_000, 100.0, 100.2, 99.8, 100.0, 1.0, true))
            .collect()
    }

    fn backtester() -> Backtester {
        Backtester::new(BacktestConfig {
            fee_rate: FEE,
            warmup: 2,
            window: 10,
        })
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_long_take_profit_is_a_win_net_of_fees() {
        let mut candles = flat(6);
        candles[4].high = 102.5;
        let rule = EnterAt { at_ms: 3 * 60_000, side: SignalType::Long };

        let report = backtester().run(&candles, &rule);
        assert_eq!(report.total_trades, 1);
        let trade = &report.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert_close(trade.exit_price, 102.0);
        assert_close(trade.pnl_percent, 2.0 - 0.04);
        assert_eq!(trade.bars_held, 1);
        assert_eq!(report.wins, 1);
        assert_close(report.win_rate, 100.0);
        assert_eq!(report.profit_factor, None);
    }

    #[test]
    fn test_stop_fills_first_when_candle_spans_both_levels() {
        let mut candles = flat(6);
        candles[4].high = 103.0;
        candles[4].low = 98.0;
        let rule = EnterAt { at_ms: 3 * 60_000, side: SignalType::Long };

        let report = backtester().run(&candles, &rule);
        let trade = &report.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_close(trade.exit_price, 99.0);
        assert_close(trade.pnl_percent, -1.0 - 0.04);
        assert_eq!(report.losses, 1);
        assert_close(report.win_rate, 0.0);
    }

    #[test]
    fn test_short_take_profit() {
        let mut candles = flat(6);
        candles[5].low = 97.5;
        let rule = EnterAt { at_ms: 3 * 60_000, side: SignalType::Short };

        let report = backtester().run(&candles, &rule);
        let trade = &report.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert_close(trade.exit_price, 98.0);
        assert_close(trade.pnl_percent, 1.96);
        assert_eq!(trade.bars_held, 2);
    }

    #[test]
    fn test_open_position_closed_at_end_of_data() {
        let candles = flat(6);
        let rule = EnterAt { at_ms: 4 * 60_000, side: SignalType::Long };

        let report = backtester().run(&candles, &rule);
        let trade = &report.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert_eq!(trade.exit_ms, 5 * 60_000);
        assert_close(trade.pnl_percent, -0.04);
        assert!(!trade.is_win());
    }

    #[test]
    fn test_warmup_candles_never_enter() {
        let candles = flat(6);
        let rule = EnterAt { at_ms: 60_000, side: SignalType::Long };
        assert_eq!(backtester().run(&candles, &rule), BacktestReport::default());
    }

    #[test]
    fn test_report_aggregates() {
        let trade = |pnl: f64| Trade {
            side: SignalType::Long,
            entry_ms: 0,
            exit_ms: 0,
            entry_price: 100.0,
            exit_price: 100.0,
            pnl_percent: pnl,
            exit_reason: ExitReason::TakeProfit,
            bars_held: 2,
            reason: String::new(),
        };
        let report = BacktestReport::from_trades(vec![trade(1.96), trade(-1.04)]);

        assert_eq!(report.total_trades, 2);
        assert_close(report.win_rate, 50.0);
        assert_close(report.total_pnl_percent, 0.92);
        assert_close(report.profit_factor.unwrap(), 1.96 / 1.04);
        assert_close(report.max_drawdown_percent, 1.04);
        assert_close(report.compounded_return_percent, (1.0196 * 0.9896 - 1.0) * 100.0);
        assert_close(report.avg_bars_held, 2.0);
    }

    #[test]
    fn test_empty_report() {
        let report = BacktestReport::from_trades(Vec::new());
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.win_rate, 0.0);
        assert!(report.trades.is_empty());
    }
}
