//! Bot session orchestration
//!
//! Owns one live session for one symbol: the candle buffers fed by the
//! stream, the cached regime and strategy config, the latest prediction and
//! the order path. Everything UI-like observes it through [`BotSnapshot`]s
//! published on a watch channel.
//!
//! ```text
//! StreamClient ──kline topics──▶ consumers ──▶ CandleBuffer (per series)
//!                                                   │ changed tick on signal tf
//!                                                   ▼
//!                        SignalThrottle ──▶ StrategySelector ──▶ order path
//! periodic: refresh_regime (classifier + predictor + levels),
//!           refresh_account (position + ticker)
//! ```
//!
//! Background tasks hold a `Weak` reference to the session so dropping the
//! last [`BotOrchestrator`] handle ends them.

use adapter_service::{
    AdapterError, MarketDataClient, StreamClient, TopicReceiver, TradeJournal, TradingClient,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use strategy_shared::{MetricsCollector, Strategy, StrategyMetrics};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use types::{
    Candle, ConnectionState, LogEntry, OrderRecord, OrderRequest, Position, PredictionSignal,
    RegimeAssessment, Side, StrategyConfig, Ticker, Timeframe, Topic, TradingSignal,
};

use crate::analysis::{rsi_divergence, support_resistance, RsiDivergence, SupportResistance};

use crate::candle_buffer::CandleBuffer;
use crate::error::{Result, StrategyError};
use crate::indicators::{self, IndicatorEngine};
use crate::predictor::PricePredictor;
use crate::regime::RegimeClassifier;
use crate::selector::{config_for, StrategySelector};
use crate::settings::BotConfig;
use crate::signals::SignalStats;

/// Minimum spacing between signal evaluations.
#[derive(Debug)]
pub struct SignalThrottle {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl SignalThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Claim an evaluation slot at `now`. Returns false while the previous
    /// accepted evaluation is less than `min_interval` old.
    pub fn try_acquire(&self, now: Instant) -> bool {
        let mut last = self.last.lock();
        match *last {
            Some(prev) if now.saturating_duration_since(prev) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// Identifies one candle series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }

    pub fn topic(&self) -> Topic {
        Topic::kline(self.timeframe, &self.symbol)
    }
}

/// External services the session calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub market_data: Arc<dyn MarketDataClient>,
    pub trading: Arc<dyn TradingClient>,
    pub journal: Arc<dyn TradeJournal>,
}

/// Observable state of the session
#[derive(Debug, Clone, Default, Serialize)]
pub struct BotSnapshot {
    pub symbol: String,
    pub running: bool,
    pub connection: ConnectionState,
    pub last_price: Option<f64>,
    pub regime: Option<RegimeAssessment>,
    pub strategy: Option<StrategyConfig>,
    pub last_signal: Option<TradingSignal>,
    pub prediction: Option<PredictionSignal>,
    /// Levels and divergence on the signal timeframe
    pub levels: Option<SupportResistance>,
    pub divergence: Option<RsiDivergence>,
    pub position: Option<Position>,
    pub ticker: Option<Ticker>,
    pub stats: SignalStats,
    pub updated_ms: i64,
}

#[derive(Debug, Default)]
struct SessionState {
    regime: Option<RegimeAssessment>,
    strategy: Option<StrategyConfig>,
    last_signal: Option<TradingSignal>,
    prediction: Option<PredictionSignal>,
    levels: Option<SupportResistance>,
    divergence: Option<RsiDivergence>,
    position: Option<Position>,
    ticker: Option<Ticker>,
    stats: SignalStats,
}

type SharedBuffer = Arc<RwLock<CandleBuffer>>;

struct Inner {
    config: BotConfig,
    stream: StreamClient,
    collaborators: Collaborators,
    classifier: RegimeClassifier,
    selector: StrategySelector,
    predictor: PricePredictor,
    symbol: RwLock<String>,
    buffers: RwLock<HashMap<SeriesKey, SharedBuffer>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
    periodic: Mutex<Vec<JoinHandle<()>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
    order_in_flight: AtomicBool,
    throttle: SignalThrottle,
    state: RwLock<SessionState>,
    snapshot_tx: watch::Sender<BotSnapshot>,
    metrics: MetricsCollector,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for handle in self.consumers.get_mut().drain(..) {
            handle.abort();
        }
        for handle in self.periodic.get_mut().drain(..) {
            handle.abort();
        }
        if let Some(handle) = self.watcher.get_mut().take() {
            handle.abort();
        }
    }
}

/// Cloneable handle to one bot session
#[derive(Clone)]
pub struct BotOrchestrator {
    inner: Arc<Inner>,
}

impl BotOrchestrator {
    pub fn new(config: BotConfig, stream: StreamClient, collaborators: Collaborators) -> Self {
        let engine = IndicatorEngine::new(config.indicators.clone());
        let symbol = config.market.symbol.clone();
        let (snapshot_tx, _) = watch::channel(BotSnapshot {
            symbol: symbol.clone(),
            ..Default::default()
        });

        Self {
            inner: Arc::new(Inner {
                classifier: RegimeClassifier::new(
                    config.regime.clone(),
                    config.indicators.clone(),
                ),
                selector: StrategySelector::new(config.selector.clone(), engine.clone()),
                predictor: PricePredictor::new(config.predictor.clone(), engine),
                throttle: SignalThrottle::new(config.orchestrator.signal_throttle()),
                symbol: RwLock::new(symbol),
                buffers: RwLock::new(HashMap::new()),
                consumers: Mutex::new(Vec::new()),
                periodic: Mutex::new(Vec::new()),
                watcher: Mutex::new(None),
                running: AtomicBool::new(false),
                order_in_flight: AtomicBool::new(false),
                state: RwLock::new(SessionState::default()),
                metrics: MetricsCollector::new(),
                snapshot_tx,
                stream,
                collaborators,
                config,
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn config(&self) -> &BotConfig {
        &self.inner.config
    }

    pub fn symbol(&self) -> String {
        self.inner.symbol.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn regime(&self) -> Option<RegimeAssessment> {
        self.inner.state.read().regime.clone()
    }

    pub fn strategy_config(&self) -> Option<StrategyConfig> {
        self.inner.state.read().strategy.clone()
    }

    pub fn last_signal(&self) -> Option<TradingSignal> {
        self.inner.state.read().last_signal.clone()
    }

    pub fn prediction(&self) -> Option<PredictionSignal> {
        self.inner.state.read().prediction.clone()
    }

    pub fn position(&self) -> Option<Position> {
        self.inner.state.read().position.clone()
    }

    pub fn levels(&self) -> Option<SupportResistance> {
        self.inner.state.read().levels.clone()
    }

    pub fn divergence(&self) -> Option<RsiDivergence> {
        self.inner.state.read().divergence
    }

    pub fn ticker(&self) -> Option<Ticker> {
        self.inner.state.read().ticker.clone()
    }

    pub fn signal_stats(&self) -> SignalStats {
        self.inner.state.read().stats.clone()
    }

    pub fn metrics(&self) -> StrategyMetrics {
        self.inner.metrics.get_metrics()
    }

    /// Latest published snapshot plus every future one.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<BotSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> BotSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Signal timeframe first, reference second when they differ.
    fn timeframes(&self) -> Vec<Timeframe> {
        let market = &self.inner.config.market;
        let mut tfs = vec![market.signal_timeframe];
        if market.reference_timeframe != market.signal_timeframe {
            tfs.push(market.reference_timeframe);
        }
        tfs
    }

    fn buffer(&self, key: &SeriesKey) -> SharedBuffer {
        if let Some(buffer) = self.inner.buffers.read().get(key) {
            return buffer.clone();
        }
        let capacity = self.inner.config.orchestrator.candle_buffer_capacity;
        self.inner
            .buffers
            .write()
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(RwLock::new(CandleBuffer::new(
                    key.symbol.clone(),
                    key.timeframe,
                    capacity,
                )))
            })
            .clone()
    }

    fn existing_buffer(&self, key: &SeriesKey) -> Option<SharedBuffer> {
        self.inner.buffers.read().get(key).cloned()
    }

    /// Candles held for the current symbol on `timeframe`, oldest first.
    pub fn candles(&self, timeframe: Timeframe) -> Vec<Candle> {
        let key = SeriesKey::new(self.symbol(), timeframe);
        self.existing_buffer(&key)
            .map(|b| b.read().snapshot())
            .unwrap_or_default()
    }

    /// Load recent history for every watched series through the REST client.
    pub async fn seed(&self) -> Result<usize> {
        let symbol = self.symbol();
        let limit = self.inner.config.orchestrator.seed_limit;
        let mut total = 0;

        for tf in self.timeframes() {
            let history = self
                .inner
                .collaborators
                .market_data
                .get_klines(&symbol, tf, limit)
                .await?;
            let fetched = history.len();
            let len = self.buffer(&SeriesKey::new(&symbol, tf)).write().seed(history);
            info!(%symbol, timeframe = %tf, fetched, len, "Seeded candle buffer");
            total += len;
        }

        self.publish();
        Ok(total)
    }

    /// Attach consumers for the current symbol's kline topics and subscribe.
    ///
    /// Works while disconnected: the subscription is deferred until the
    /// stream reports `Connected`.
    pub fn watch_symbol(&self) -> Result<()> {
        let symbol = self.symbol();
        {
            let mut consumers = self.inner.consumers.lock();
            if !consumers.is_empty() {
                debug!(%symbol, "Symbol already watched");
                return Ok(());
            }

            for tf in self.timeframes() {
                let key = SeriesKey::new(&symbol, tf);
                self.buffer(&key);
                let topic = key.topic();
                let rx = self.inner.stream.messages_for(topic.clone());
                consumers.push(tokio::spawn(consume_candles(
                    Arc::downgrade(&self.inner),
                    key,
                    rx,
                )));

                match self.inner.stream.subscribe(topic.clone()) {
                    Ok(()) => {}
                    Err(AdapterError::NotConnected) => {
                        debug!(%topic, "Stream not connected, subscription deferred")
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        self.ensure_watcher();
        info!(%symbol, "Watching kline topics");
        Ok(())
    }

    fn subscribe_desired(&self) {
        let symbol = self.symbol();
        for tf in self.timeframes() {
            let topic = Topic::kline(tf, &symbol);
            if let Err(e) = self.inner.stream.subscribe(topic.clone()) {
                warn!(%topic, error = %e, "Deferred subscribe failed");
            }
        }
    }

    fn ensure_watcher(&self) {
        let mut guard = self.inner.watcher.lock();
        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let mut rx = self.inner.stream.watch_state();
        *guard = Some(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                let Some(bot) = BotOrchestrator::from_weak(&weak) else {
                    break;
                };
                info!(%state, "Stream state changed");
                if state == ConnectionState::Connected {
                    bot.subscribe_desired();
                }
                bot.publish();
            }
        }));
    }

    /// Switch the session to `symbol`: drop the old series, seed and watch
    /// the new ones. Cached regime, signal and position are cleared.
    pub async fn switch_symbol(&self, symbol: &str) -> Result<()> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(StrategyError::Configuration {
                message: "symbol must not be empty".to_string(),
            });
        }
        let old = self.symbol();
        if symbol == old {
            return Ok(());
        }
        info!(from = %old, to = %symbol, "Switching symbol");

        for handle in self.inner.consumers.lock().drain(..) {
            handle.abort();
        }
        for tf in self.timeframes() {
            self.inner.stream.unsubscribe(&Topic::kline(tf, &old));
        }
        self.inner.buffers.write().retain(|key, _| key.symbol != old);
        let stats = self.signal_stats();
        *self.inner.state.write() = SessionState {
            stats,
            ..Default::default()
        };
        *self.inner.symbol.write() = symbol.clone();

        if let Err(e) = self.seed().await {
            warn!(%symbol, error = %e, "Seeding failed, continuing with live candles only");
        }
        self.watch_symbol()?;
        self.journal_log(LogEntry::info(&symbol, format!("Switched from {}", old)))
            .await;
        self.publish();
        Ok(())
    }

    /// Apply one streamed candle. Returns the signal when the tick triggered
    /// an evaluation.
    pub async fn on_candle(&self, key: &SeriesKey, candle: Candle) -> Option<TradingSignal> {
        self.inner.metrics.increment_messages();

        let Some(buffer) = self.existing_buffer(key) else {
            debug!(symbol = %key.symbol, timeframe = %key.timeframe, "No buffer for series");
            return None;
        };
        let outcome = buffer.write().on_tick(candle);
        if !outcome.changed() {
            debug!(?outcome, timeframe = %key.timeframe, "Tick ignored");
            return None;
        }

        if key.timeframe != self.inner.config.market.signal_timeframe || key.symbol != self.symbol()
        {
            self.publish();
            return None;
        }

        if !self.inner.throttle.try_acquire(Instant::now()) {
            self.inner.metrics.increment_throttled();
            self.publish();
            return None;
        }

        self.evaluate_signal().await
    }

    /// Run the selector against the latest signal-timeframe candles.
    pub async fn evaluate_signal(&self) -> Option<TradingSignal> {
        let symbol = self.symbol();
        let candles = self.candles(self.inner.config.market.signal_timeframe);
        let close = candles.last()?.close;
        let price = match Decimal::try_from(close) {
            Ok(p) => p.round_dp(8),
            Err(e) => {
                warn!(%symbol, close, error = %e, "Close price not representable");
                return None;
            }
        };

        let condition = match self.regime() {
            Some(regime) => regime.condition,
            None => match self.refresh_regime().await {
                Ok(regime) => regime.condition,
                Err(e) => {
                    debug!(%symbol, error = %e, "No regime yet, skipping evaluation");
                    return None;
                }
            },
        };

        let signal = self.inner.selector.signal(condition, &candles, price);
        {
            let mut state = self.inner.state.write();
            state
                .stats
                .record_signal(&signal, types::current_timestamp_ms());
            state.last_signal = Some(signal.clone());
        }

        if signal.has_signal() {
            self.inner.metrics.increment_signals();
            info!(
                %symbol,
                side = %signal.signal_type,
                condition = %signal.condition,
                confidence = signal.confidence,
                entry = %fmt_price(signal.entry_price),
                reasoning = %signal.reasoning,
                "Signal generated"
            );
            if self.is_running() && self.inner.config.orchestrator.auto_trade {
                // Failures are logged and journaled inside execute
                let _ = self.execute(&signal).await;
            }
        } else {
            debug!(%symbol, reasoning = %signal.reasoning, "Hold");
        }

        self.publish();
        Some(signal)
    }

    /// Place an order for an entry signal unless a position is already open
    /// or another order is in flight.
    pub async fn execute(&self, signal: &TradingSignal) -> Result<Option<OrderRecord>> {
        if self.inner.order_in_flight.swap(true, Ordering::SeqCst) {
            debug!("Order already in flight, skipping signal");
            return Ok(None);
        }
        let result = self.place_order(signal).await;
        self.inner.order_in_flight.store(false, Ordering::SeqCst);

        if let Err(e) = &result {
            self.inner.metrics.increment_errors();
            error!(error = %e, side = %signal.signal_type, "Order placement failed");
            self.journal_log(LogEntry::error(
                self.symbol(),
                format!("Order failed: {}", e),
            ))
            .await;
        }
        result
    }

    async fn place_order(&self, signal: &TradingSignal) -> Result<Option<OrderRecord>> {
        let Some(side) = Side::from_signal(signal.signal_type) else {
            return Ok(None);
        };
        let symbol = self.symbol();
        let trading = &self.inner.collaborators.trading;

        let current = trading.get_position(&symbol).await?;
        if current.is_open() {
            debug!(%symbol, side = ?current.side, "Position already open, skipping entry");
            self.inner.state.write().position = Some(current);
            return Ok(None);
        }

        let leverage = signal.strategy_config.recommended_leverage;
        trading.set_leverage(&symbol, leverage).await?;

        let request = OrderRequest {
            symbol: symbol.clone(),
            side,
            qty: self.inner.config.orchestrator.order_qty,
            price: signal.entry_price,
            take_profit: signal.take_profit_price,
            stop_loss: signal.stop_loss_price,
            leverage,
        };
        let record = trading.create_order(&request).await?;

        let position = trading.get_position(&symbol).await?;
        if !position.is_open() {
            warn!(%symbol, order_id = %record.order_id, "Order accepted but no position reported");
            self.journal_log(LogEntry::warn(
                &symbol,
                format!("Order {} accepted without an open position", record.order_id),
            ))
            .await;
        }
        self.inner.state.write().position = Some(position);
        self.inner.metrics.increment_trades();

        if let Err(e) = self.inner.collaborators.journal.append_order(&record).await {
            warn!(error = %e, "Failed to journal order");
        }
        info!(
            %symbol,
            %side,
            order_id = %record.order_id,
            qty = %record.qty,
            leverage,
            "Order placed"
        );
        self.journal_log(LogEntry::info(
            &symbol,
            format!(
                "{} {} @ {} TP {} SL {} x{}: {}",
                side,
                record.qty,
                fmt_price(record.entry_price),
                fmt_price(record.take_profit),
                fmt_price(record.stop_loss),
                leverage,
                signal.reasoning
            ),
        ))
        .await;

        Ok(Some(record))
    }

    /// Reclassify the regime and refresh the prediction.
    ///
    /// Classification uses the reference series, falling back to the signal
    /// series while the reference is still too short.
    pub async fn refresh_regime(&self) -> Result<RegimeAssessment> {
        let symbol = self.symbol();
        let market = &self.inner.config.market;
        let reference = self.candles(market.reference_timeframe);
        let base = self.candles(market.signal_timeframe);

        let assessment = match self.inner.classifier.classify(&reference) {
            Ok(a) => a,
            Err(StrategyError::InsufficientData { available, .. }) => {
                debug!(%symbol, available, "Reference series short, classifying signal series");
                self.inner.classifier.classify(&base)?
            }
            Err(e) => return Err(e),
        };

        let prediction = self.inner.predictor.predict(
            &reference,
            &base,
            market.signal_timeframe,
            market.prediction_interval_minutes,
        );
        let (levels, divergence) = self.chart_structure(&base);

        let previous = {
            let mut state = self.inner.state.write();
            let previous = state.regime.as_ref().map(|r| r.condition);
            state.regime = Some(assessment.clone());
            state.strategy = Some(config_for(assessment.condition));
            state.prediction = prediction;
            state.levels = levels;
            state.divergence = divergence;
            previous
        };

        if previous != Some(assessment.condition) {
            info!(
                %symbol,
                condition = %assessment.condition,
                confidence = assessment.confidence,
                "Market regime changed"
            );
            self.journal_log(LogEntry::info(
                &symbol,
                format!("Regime: {}", assessment.summary()),
            ))
            .await;
        }

        self.publish();
        Ok(assessment)
    }

    /// Support/resistance and RSI divergence over `candles`; either is
    /// absent while history is too short.
    fn chart_structure(
        &self,
        candles: &[Candle],
    ) -> (Option<SupportResistance>, Option<RsiDivergence>) {
        let cfg = &self.inner.config.analysis;
        let levels = support_resistance(candles, cfg)
            .map_err(|e| debug!(error = %e, "Levels unavailable"))
            .ok();
        let divergence = indicators::rsi_series(
            &indicators::closes(candles),
            self.inner.config.indicators.rsi_period,
        )
        .and_then(|rsi| rsi_divergence(candles, &rsi, cfg.lookback))
        .map_err(|e| debug!(error = %e, "Divergence unavailable"))
        .ok();
        (levels, divergence)
    }

    /// Fetch the 24h ticker for the current symbol.
    pub async fn refresh_ticker(&self) -> Result<Option<Ticker>> {
        let symbol = self.symbol();
        let ticker = self
            .inner
            .collaborators
            .market_data
            .get_tickers(&symbol)
            .await?
            .into_iter()
            .find(|t| t.symbol == symbol);
        if ticker.is_none() {
            debug!(%symbol, "No ticker returned");
        }
        self.inner.state.write().ticker = ticker.clone();
        self.publish();
        Ok(ticker)
    }

    pub async fn refresh_account(&self) -> Result<Position> {
        let position = self
            .inner
            .collaborators
            .trading
            .get_position(&self.symbol())
            .await?;
        self.inner.state.write().position = Some(position.clone());
        self.publish();
        Ok(position)
    }

    /// Enable trading and start the periodic regime and account tasks.
    pub async fn start(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        {
            let mut periodic = self.inner.periodic.lock();
            periodic.push(self.spawn_regime_task());
            periodic.push(self.spawn_account_task());
        }

        let symbol = self.symbol();
        info!(%symbol, auto_trade = self.inner.config.orchestrator.auto_trade, "Bot started");
        self.journal_log(LogEntry::info(&symbol, "Bot started")).await;
        self.publish();
        Ok(())
    }

    /// Disable trading. Streaming and buffering continue.
    pub async fn stop(&self) -> Result<()> {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        for handle in self.inner.periodic.lock().drain(..) {
            handle.abort();
        }

        let symbol = self.symbol();
        info!(%symbol, "Bot stopped");
        self.journal_log(LogEntry::info(&symbol, "Bot stopped")).await;
        self.publish();
        Ok(())
    }

    /// Stop, detach all consumers and dispose the stream.
    pub async fn shutdown(&self) {
        if let Err(e) = self.stop().await {
            warn!(error = %e, "Stop failed during shutdown");
        }
        for handle in self.inner.consumers.lock().drain(..) {
            handle.abort();
        }
        if let Some(handle) = self.inner.watcher.lock().take() {
            handle.abort();
        }
        self.inner.stream.dispose().await;
        self.publish();
        info!(symbol = %self.symbol(), "Session shut down");
    }

    fn spawn_regime_task(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.orchestrator.regime_refresh();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(bot) = BotOrchestrator::from_weak(&weak) else {
                    break;
                };
                match bot.refresh_regime().await {
                    Ok(_) => {}
                    Err(e) if e.is_recoverable() => debug!(error = %e, "Regime refresh skipped"),
                    Err(e) => {
                        bot.inner.metrics.increment_errors();
                        warn!(error = %e, "Regime refresh failed");
                    }
                }
            }
        })
    }

    fn spawn_account_task(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.orchestrator.account_poll();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(bot) = BotOrchestrator::from_weak(&weak) else {
                    break;
                };
                if let Err(e) = bot.refresh_account().await {
                    warn!(error = %e, "Account refresh failed");
                }
                if let Err(e) = bot.refresh_ticker().await {
                    warn!(error = %e, "Ticker refresh failed");
                }
            }
        })
    }

    async fn journal_log(&self, entry: LogEntry) {
        if let Err(e) = self.inner.collaborators.journal.append_log(&entry).await {
            warn!(error = %e, "Failed to journal log entry");
        }
    }

    fn publish(&self) {
        let symbol = self.symbol();
        let last_price = self
            .existing_buffer(&SeriesKey::new(
                &symbol,
                self.inner.config.market.signal_timeframe,
            ))
            .and_then(|b| b.read().latest().map(|c| c.close));

        let snapshot = {
            let state = self.inner.state.read();
            BotSnapshot {
                symbol,
                running: self.is_running(),
                connection: self.inner.stream.state(),
                last_price,
                regime: state.regime.clone(),
                strategy: state.strategy.clone(),
                last_signal: state.last_signal.clone(),
                prediction: state.prediction.clone(),
                levels: state.levels.clone(),
                divergence: state.divergence,
                position: state.position.clone(),
                ticker: state.ticker.clone(),
                stats: state.stats.clone(),
                updated_ms: types::current_timestamp_ms(),
            }
        };
        self.inner.snapshot_tx.send_replace(snapshot);
    }
}

async fn consume_candles(inner: Weak<Inner>, key: SeriesKey, mut rx: TopicReceiver) {
    while let Some(message) = rx.recv().await {
        let Some(bot) = BotOrchestrator::from_weak(&inner) else {
            break;
        };
        match codec::parse_candles(&message.data) {
            Ok(candles) => {
                for candle in candles {
                    bot.on_candle(&key, candle).await;
                }
            }
            Err(e) => {
                bot.inner.metrics.increment_errors();
                warn!(topic = %message.topic, error = %e, "Undecodable kline payload");
            }
        }
    }
    debug!(symbol = %key.symbol, timeframe = %key.timeframe, "Candle consumer finished");
}

fn fmt_price(price: Option<Decimal>) -> String {
    price.map_or_else(|| "-".to_string(), |p| p.to_string())
}

#[async_trait]
impl Strategy for BotOrchestrator {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    async fn start(&self) -> anyhow::Result<()> {
        Ok(BotOrchestrator::start(self).await?)
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(BotOrchestrator::stop(self).await?)
    }

    fn is_running(&self) -> bool {
        BotOrchestrator::is_running(self)
    }

    fn metrics(&self) -> StrategyMetrics {
        BotOrchestrator::metrics(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_spacing() {
        let throttle = SignalThrottle::new(Duration::from_millis(1000));
        let t0 = Instant::now();

        assert!(throttle.try_acquire(t0));
        assert!(!throttle.try_acquire(t0 + Duration::from_millis(300)));
        assert!(!throttle.try_acquire(t0 + Duration::from_millis(999)));
        assert!(throttle.try_acquire(t0 + Duration::from_millis(1000)));
        assert!(!throttle.try_acquire(t0 + Duration::from_millis(1500)));
        assert!(throttle.try_acquire(t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn test_throttle_rejects_out_of_order_instant() {
        let throttle = SignalThrottle::new(Duration::from_secs(1));
        let t0 = Instant::now() + Duration::from_secs(5);
        assert!(throttle.try_acquire(t0));
        assert!(!throttle.try_acquire(t0 - Duration::from_secs(3)));
    }

    #[test]
    fn test_series_key_topic() {
        let key = SeriesKey::new("BTCUSDT", Timeframe::M5);
        assert_eq!(key.topic().as_str(), "kline.5.BTCUSDT");
    }
}
