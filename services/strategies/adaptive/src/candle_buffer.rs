//! Rolling candle window per (symbol, timeframe)
//!
//! Accepts live kline ticks and REST history. The in-progress candle at the
//! tail is replaced in place until the venue confirms it; confirmed candles
//! never change. Timestamps strictly increase from front to back and the
//! window never exceeds its capacity.

use std::collections::VecDeque;
use tracing::{debug, trace};
use types::{Candle, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Appended,
    Replaced,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Zero or negative price/volume
    Partial,
    /// Older than the tail
    Stale,
    /// Same bucket as a confirmed tail
    Sealed,
}

impl TickOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, TickOutcome::Ignored(_))
    }
}

#[derive(Debug, Clone)]
pub struct CandleBuffer {
    symbol: String,
    timeframe: Timeframe,
    capacity: usize,
    candles: VecDeque<Candle>,
    last_update_ms: Option<i64>,
}

impl CandleBuffer {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol: symbol.into(),
            timeframe,
            capacity,
            candles: VecDeque::with_capacity(capacity),
            last_update_ms: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Wall-clock time of the last accepted tick
    pub fn last_update_ms(&self) -> Option<i64> {
        self.last_update_ms
    }

    /// Apply one tick.
    pub fn on_tick(&mut self, candle: Candle) -> TickOutcome {
        let outcome = self.apply(candle);
        match outcome {
            TickOutcome::Ignored(reason) => {
                trace!(symbol = %self.symbol, tf = %self.timeframe, ?reason, ts = candle.timestamp_ms, "Tick ignored");
            }
            _ => self.last_update_ms = Some(types::current_timestamp_ms()),
        }
        outcome
    }

    fn apply(&mut self, candle: Candle) -> TickOutcome {
        if candle.is_partial() {
            return TickOutcome::Ignored(IgnoreReason::Partial);
        }
        let Some(tail) = self.candles.back_mut() else {
            self.candles.push_back(candle);
            return TickOutcome::Appended;
        };

        if candle.timestamp_ms < tail.timestamp_ms {
            return TickOutcome::Ignored(IgnoreReason::Stale);
        }
        if candle.timestamp_ms == tail.timestamp_ms {
            if tail.confirmed {
                return TickOutcome::Ignored(IgnoreReason::Sealed);
            }
            *tail = candle;
            return TickOutcome::Replaced;
        }

        self.candles.push_back(candle);
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
        TickOutcome::Appended
    }

    /// Replace the history with `candles` (any order), then re-apply whatever
    /// live ticks the buffer already held so nothing newer is lost.
    pub fn seed(&mut self, mut candles: Vec<Candle>) -> usize {
        candles.sort_by_key(|c| c.timestamp_ms);
        let live = std::mem::take(&mut self.candles);

        for candle in candles {
            self.apply(candle);
        }
        for candle in live {
            self.apply(candle);
        }
        self.last_update_ms = Some(types::current_timestamp_ms());
        debug!(symbol = %self.symbol, tf = %self.timeframe, len = self.candles.len(), "Buffer seeded");
        self.candles.len()
    }

    /// Oldest to newest
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    /// Close prices, oldest to newest
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn clear(&mut self) {
        self.candles.clear();
        self.last_update_ms = None;
    }
}
