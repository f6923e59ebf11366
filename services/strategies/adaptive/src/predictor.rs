//! Next-candle range prediction
//!
//! ## Single step
//!
//! A coarse [`MarketState`] is read from the base series' Bollinger width and
//! the reference series' width, MACD histogram and RSI. The state selects a
//! multiplier profile that scales the average recent move into a high, a low
//! and a directional close.
//!
//! When the target interval equals the base timeframe the prediction is this
//! one step from the current price, undamped and without trend bias, whether
//! the tail candle is confirmed or still in progress.
//!
//! ## Coarser targets
//!
//! A target interval larger than the base timeframe is reached by simulating
//! base candles one at a time and feeding each prediction back into the
//! working series:
//!
//! ```text
//! [finish in-progress] + [steps to next target boundary] + [interval / base]
//!                                                          └── aggregated ──┘
//! ```
//!
//! Later steps are damped linearly and nudged toward the recent up/down mix
//! of both series. The aggregated segment reports its max high, min low and
//! final close; confidence is scaled by the mean damping.

use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{Candle, IndicatorSnapshot, MarketState, PredictionSignal, Timeframe};

use crate::indicators::{up_fraction, IndicatorEngine};

/// Multipliers applied to the average move for one state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateProfile {
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub confidence: f64,
}

impl StateProfile {
    const fn new(high: f64, low: f64, close: f64, confidence: f64) -> Self {
        Self {
            high,
            low,
            close,
            confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateProfiles {
    pub squeeze_on_base: StateProfile,
    pub squeeze_on_reference: StateProfile,
    pub strong_up: StateProfile,
    pub weak_up: StateProfile,
    pub strong_down: StateProfile,
    pub weak_down: StateProfile,
    pub neutral: StateProfile,
}

impl Default for StateProfiles {
    fn default() -> Self {
        Self {
            squeeze_on_base: StateProfile::new(0.6, 0.6, 0.1, 0.55),
            squeeze_on_reference: StateProfile::new(0.8, 0.8, 0.15, 0.55),
            strong_up: StateProfile::new(1.3, 0.7, 0.6, 0.75),
            weak_up: StateProfile::new(1.1, 0.9, 0.3, 0.6),
            strong_down: StateProfile::new(0.7, 1.3, 0.6, 0.75),
            weak_down: StateProfile::new(0.9, 1.1, 0.3, 0.6),
            neutral: StateProfile::new(1.0, 1.0, 0.1, 0.5),
        }
    }
}

impl StateProfiles {
    pub fn get(&self, state: MarketState) -> &StateProfile {
        match state {
            MarketState::SqueezeOnBase => &self.squeeze_on_base,
            MarketState::SqueezeOnReference => &self.squeeze_on_reference,
            MarketState::StrongUp => &self.strong_up,
            MarketState::WeakUp => &self.weak_up,
            MarketState::StrongDown => &self.strong_down,
            MarketState::WeakDown => &self.weak_down,
            MarketState::Neutral => &self.neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub min_candles: usize,
    pub base_squeeze_width: f64,
    pub reference_squeeze_width: f64,
    pub strong_rsi_up: f64,
    pub strong_rsi_down: f64,
    pub profiles: StateProfiles,
    pub damping_start: f64,
    pub damping_end: f64,
    /// Share of the close drift taken from the up/down candle mix
    pub bias_weight: f64,
    pub bias_window: usize,
    pub base_bias_weight: f64,
    pub reference_bias_weight: f64,
    /// Base candles kept in the simulated series
    pub working_window: usize,
    pub max_steps: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_candles: 50,
            base_squeeze_width: 0.005,
            reference_squeeze_width: 0.02,
            strong_rsi_up: 60.0,
            strong_rsi_down: 40.0,
            profiles: StateProfiles::default(),
            damping_start: 1.0,
            damping_end: 0.4,
            bias_weight: 0.3,
            bias_window: 10,
            base_bias_weight: 1.0,
            reference_bias_weight: 2.0,
            working_window: 120,
            max_steps: 1_500,
        }
    }
}

impl PredictorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.damping_start > 0.0 && self.damping_end > 0.0,
            "damping must be positive"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.bias_weight),
            "bias_weight must be within [0, 1]"
        );
        anyhow::ensure!(
            self.base_bias_weight + self.reference_bias_weight > 0.0,
            "bias weights must not both be zero"
        );
        anyhow::ensure!(
            self.working_window >= self.min_candles,
            "working_window must hold at least min_candles"
        );
        anyhow::ensure!(self.max_steps > 0, "max_steps must be positive");
        Ok(())
    }

    /// Damping for step `i` of `total`
    pub fn damping_at(&self, i: usize, total: usize) -> f64 {
        if total <= 1 {
            return self.damping_start;
        }
        let t = i as f64 / (total - 1) as f64;
        self.damping_start + (self.damping_end - self.damping_start) * t
    }
}

#[derive(Debug, Clone, Copy)]
struct Step {
    state: MarketState,
    high: f64,
    low: f64,
    close: f64,
    average_move: f64,
    confidence: f64,
}

/// Step plan for reaching the candle after the next target boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub complete_in_progress: bool,
    pub to_boundary: usize,
    pub fill: usize,
    pub target_start_ms: i64,
}

impl StepPlan {
    pub fn total(&self) -> usize {
        self.complete_in_progress as usize + self.to_boundary + self.fill
    }

    /// Build the plan; `None` when the interval is not a whole multiple of
    /// the base timeframe.
    pub fn new(last_base: &Candle, base: Timeframe, interval_minutes: u32) -> Option<Self> {
        let base_ms = base.duration_ms();
        let target_ms = i64::from(interval_minutes) * 60_000;
        if target_ms < base_ms || target_ms % base_ms != 0 {
            return None;
        }
        let next_start = last_base.timestamp_ms + base_ms;
        let target_start = if next_start.rem_euclid(target_ms) == 0 {
            next_start
        } else {
            (next_start.div_euclid(target_ms) + 1) * target_ms
        };
        Some(Self {
            complete_in_progress: !last_base.confirmed,
            to_boundary: ((target_start - next_start) / base_ms) as usize,
            fill: (target_ms / base_ms) as usize,
            target_start_ms: target_start,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PricePredictor {
    config: PredictorConfig,
    engine: IndicatorEngine,
}

impl PricePredictor {
    pub fn new(config: PredictorConfig, engine: IndicatorEngine) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Predict the candle of `interval_minutes` that starts at the next
    /// boundary, or the current base candle when the interval is the base
    /// timeframe and it is still open. `reference` is the coarser context
    /// series, `base` the series stepped through. Absent when either series is too short, the
    /// interval does not divide into base candles, or any step fails.
    pub fn predict(
        &self,
        reference: &[Candle],
        base: &[Candle],
        base_timeframe: Timeframe,
        interval_minutes: u32,
    ) -> Option<PredictionSignal> {
        let cfg = &self.config;
        if reference.len() < cfg.min_candles || base.len() < cfg.min_candles {
            debug!(
                reference = reference.len(),
                base = base.len(),
                "Not enough candles to predict"
            );
            return None;
        }
        let last = base.last()?;
        let reference_snapshot = self.engine.snapshot(reference).ok()?;
        let window = cfg.working_window.max(cfg.min_candles);
        let mut working: Vec<Candle> = base[base.len().saturating_sub(window)..].to_vec();
        let base_ms = base_timeframe.duration_ms();

        if i64::from(interval_minutes) * 60_000 == base_ms {
            let step = self.step(&working, &reference_snapshot, None, 1.0)?;
            let start_ms = if last.confirmed {
                last.timestamp_ms + base_ms
            } else {
                last.timestamp_ms
            };
            return Some(self.finish(
                last.close,
                step,
                (step.high, step.low, step.close),
                step.confidence,
                interval_minutes,
                start_ms,
            ));
        }

        let plan = StepPlan::new(last, base_timeframe, interval_minutes)?;
        let total = plan.total();
        if total == 0 || total > cfg.max_steps {
            debug!(total, "Prediction step count out of range");
            return None;
        }

        let reference_up = up_fraction(reference, cfg.bias_window)?;

        let mut steps = Vec::with_capacity(total);
        let mut damping_sum = 0.0;
        for i in 0..total {
            let damping = cfg.damping_at(i, total);
            damping_sum += damping;
            let step = self.step(&working, &reference_snapshot, Some(reference_up), damping)?;
            let tail = *working.last()?;

            if i == 0 && plan.complete_in_progress {
                let finished = Candle::new(
                    tail.timestamp_ms,
                    tail.open,
                    tail.high.max(step.high),
                    tail.low.min(step.low),
                    step.close,
                    tail.volume,
                    true,
                );
                if let Some(slot) = working.last_mut() {
                    *slot = finished;
                }
            } else {
                working.push(Candle::new(
                    tail.timestamp_ms + base_ms,
                    tail.close,
                    step.high.max(tail.close),
                    step.low.min(tail.close),
                    step.close,
                    tail.volume,
                    true,
                ));
                if working.len() > window {
                    working.remove(0);
                }
            }
            steps.push(step);
        }

        let first = steps[0];
        let segment = &steps[steps.len() - plan.fill..];
        let predicted_high = segment.iter().map(|s| s.high).fold(f64::MIN, f64::max);
        let predicted_low = segment.iter().map(|s| s.low).fold(f64::MAX, f64::min);
        let predicted_close = segment[segment.len() - 1].close;
        let mean_damping = damping_sum / total as f64;

        Some(self.finish(
            last.close,
            first,
            (predicted_high, predicted_low, predicted_close),
            first.confidence * mean_damping,
            interval_minutes,
            plan.target_start_ms,
        ))
    }

    fn finish(
        &self,
        current_price: f64,
        first: Step,
        (predicted_high, predicted_low, predicted_close): (f64, f64, f64),
        confidence: f64,
        interval_minutes: u32,
        prediction_start_ms: i64,
    ) -> PredictionSignal {
        let signal = PredictionSignal {
            market_state: first.state,
            current_price,
            predicted_high,
            predicted_low,
            predicted_close,
            predicted_range: predicted_high - predicted_low,
            average_move: first.average_move,
            confidence: confidence.clamp(0.0, 1.0),
            interval_minutes,
            prediction_start_ms,
        };
        debug!(
            state = %signal.market_state,
            high = signal.predicted_high,
            low = signal.predicted_low,
            close = signal.predicted_close,
            "Prediction complete"
        );
        signal
    }

    pub fn classify_state(&self, base: &IndicatorSnapshot, reference: &IndicatorSnapshot) -> MarketState {
        let cfg = &self.config;
        if base.bollinger.width() < cfg.base_squeeze_width {
            MarketState::SqueezeOnBase
        } else if reference.bollinger.width() < cfg.reference_squeeze_width {
            MarketState::SqueezeOnReference
        } else if reference.macd.histogram > 0.0 {
            if reference.rsi >= cfg.strong_rsi_up && reference.last_close > reference.ema21 {
                MarketState::StrongUp
            } else {
                MarketState::WeakUp
            }
        } else if reference.macd.histogram < 0.0 {
            if reference.rsi <= cfg.strong_rsi_down && reference.last_close < reference.ema21 {
                MarketState::StrongDown
            } else {
                MarketState::WeakDown
            }
        } else {
            MarketState::Neutral
        }
    }

    /// One base step from the tail of `working`. `reference_up` enables the
    /// trend-bias blend used by recursive steps.
    fn step(
        &self,
        working: &[Candle],
        reference: &IndicatorSnapshot,
        reference_up: Option<f64>,
        damping: f64,
    ) -> Option<Step> {
        let cfg = &self.config;
        let snapshot = self.engine.snapshot(working).ok()?;
        let state = self.classify_state(&snapshot, reference);
        let profile = cfg.profiles.get(state);

        let direction = match state.trend_direction() {
            0 if snapshot.macd.histogram > 0.0 => 1.0,
            0 if snapshot.macd.histogram < 0.0 => -1.0,
            0 => 0.0,
            d => f64::from(d),
        };
        let drift = match reference_up {
            Some(reference_up) => {
                let base_up = up_fraction(working, cfg.bias_window)?;
                let up = (base_up * cfg.base_bias_weight
                    + reference_up * cfg.reference_bias_weight)
                    / (cfg.base_bias_weight + cfg.reference_bias_weight);
                let bias = 2.0 * up - 1.0;
                (1.0 - cfg.bias_weight) * direction + cfg.bias_weight * bias
            }
            None => direction,
        };

        let price = snapshot.last_close;
        let m = snapshot.average_recent_move;
        let high = price + m * profile.high * damping;
        let low = price - m * profile.low * damping;
        let close = (price + drift * m * profile.close * damping).clamp(low, high);

        if !(high.is_finite() && low.is_finite() && close.is_finite()) || low <= 0.0 {
            debug!(high, low, close, "Prediction step out of range");
            return None;
        }
        Some(Step {
            state,
            high,
            low,
            close,
            average_move: m,
            confidence: profile.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize, tf: Timeframe, start: i64, drift: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + drift * i as f64 + if i % 2 == 0 { 0.8 } else { -0.8 };
                let open = close - drift;
                Candle::new(
                    start + i as i64 * tf.duration_ms(),
                    open,
                    close.max(open) + 1.0,
                    close.min(open) - 1.0,
                    close,
                    10.0,
                    true,
                )
            })
            .collect()
    }

    #[test]
    fn test_plan_for_aligned_and_in_progress() {
        // Last 5m candle starts at 03:55 and is confirmed: next boundary 04:00
        let last = Candle::new(14_100_000, 1.0, 1.0, 1.0, 1.0, 1.0, true);
        let plan = StepPlan::new(&last, Timeframe::M5, 240).unwrap();
        assert_eq!(plan.to_boundary, 0);
        assert_eq!(plan.fill, 48);
        assert_eq!(plan.target_start_ms, 14_400_000);

        let mut open = last;
        open.timestamp_ms = 13_800_000;
        open.confirmed = false;
        let plan = StepPlan::new(&open, Timeframe::M5, 240).unwrap();
        assert!(plan.complete_in_progress);
        assert_eq!(plan.to_boundary, 1);
        assert_eq!(plan.total(), 50);

        assert!(StepPlan::new(&last, Timeframe::M15, 5).is_none());
        assert!(StepPlan::new(&last, Timeframe::M15, 40).is_none());
    }

    #[test]
    fn test_damping_is_linear() {
        let cfg = PredictorConfig::default();
        assert_eq!(cfg.damping_at(0, 1), 1.0);
        assert!((cfg.damping_at(0, 4) - 1.0).abs() < 1e-12);
        assert!((cfg.damping_at(3, 4) - 0.4).abs() < 1e-12);
        assert!((cfg.damping_at(1, 4) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_single_step_brackets_price() {
        let p = PricePredictor::default();
        let base = series(80, Timeframe::M5, 0, 0.05);
        let reference = series(80, Timeframe::H1, 0, 0.5);
        let sig = p.predict(&reference, &base, Timeframe::M5, 5).unwrap();
        assert!(sig.predicted_low < sig.current_price);
        assert!(sig.predicted_high > sig.current_price);
        assert!(sig.predicted_close >= sig.predicted_low && sig.predicted_close <= sig.predicted_high);
        assert!((sig.predicted_range - (sig.predicted_high - sig.predicted_low)).abs() < 1e-9);
    }

    #[test]
    fn test_same_timeframe_is_one_plain_step_for_either_tail() {
        let p = PricePredictor::default();
        let reference = series(80, Timeframe::H1, 0, 0.5);
        let confirmed = series(80, Timeframe::M5, 0, 0.05);
        let mut in_progress = confirmed.clone();
        if let Some(tail) = in_progress.last_mut() {
            tail.confirmed = false;
        }

        let done = p.predict(&reference, &confirmed, Timeframe::M5, 5).unwrap();
        let open = p.predict(&reference, &in_progress, Timeframe::M5, 5).unwrap();

        // price 103.15, average move 2.05, weak-down profile (0.9, 1.1)
        let profile = p.config().profiles.get(done.market_state);
        let price = done.current_price;
        let m = done.average_move;
        assert!((price - 103.15).abs() < 1e-9);
        assert!((done.predicted_high - 104.995).abs() < 1e-6);
        assert!((done.predicted_low - 100.895).abs() < 1e-6);
        assert!((done.predicted_high - (price + m * profile.high)).abs() < 1e-9);
        assert!((done.predicted_low - (price - m * profile.low)).abs() < 1e-9);

        // No trend bias: close moves by exactly the close multiplier
        let direction = f64::from(done.market_state.trend_direction());
        let expected_close =
            (price + m * profile.close * direction).clamp(done.predicted_low, done.predicted_high);
        assert!((done.predicted_close - expected_close).abs() < 1e-9);
        assert!((done.confidence - profile.confidence).abs() < 1e-12);

        assert_eq!(open.predicted_high, done.predicted_high);
        assert_eq!(open.predicted_low, done.predicted_low);
        assert_eq!(open.predicted_close, done.predicted_close);

        let last_start = confirmed[79].timestamp_ms;
        assert_eq!(done.prediction_start_ms, last_start + Timeframe::M5.duration_ms());
        assert_eq!(open.prediction_start_ms, last_start);
    }

    #[test]
    fn test_short_series_absent() {
        let p = PricePredictor::default();
        let base = series(49, Timeframe::M5, 0, 0.0);
        let reference = series(80, Timeframe::H1, 0, 0.0);
        assert!(p.predict(&reference, &base, Timeframe::M5, 60).is_none());
    }
}
