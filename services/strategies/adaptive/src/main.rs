//! Adaptive bot entry point

use adapter_service::{
    BybitPublicClient, JsonLinesJournal, MarketDataClient, MemoryJournal, PaperTradingClient,
    StreamClient, TradeJournal,
};
use adaptive_strategy::settings::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use adaptive_strategy::{
    AdaptiveRule, Backtester, BotConfig, BotOrchestrator, Collaborators, IndicatorEngine,
    RegimeClassifier, StrategySelector,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use strategy_shared::ConfigSection;
use tokio::signal;
use tracing::{debug, info, warn};
use types::Timeframe;

#[derive(Parser, Debug)]
#[command(name = "adaptive_bot", about = "Regime-adaptive signal bot (paper trading)")]
struct Args {
    /// Config file; falls back to $ADAPTIVE_CONFIG_PATH, then configs/adaptive.toml
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the traded symbol
    #[arg(long)]
    symbol: Option<String>,

    /// Override the signal timeframe, e.g. 5m or 15
    #[arg(long)]
    timeframe: Option<Timeframe>,

    /// Generate signals without placing orders
    #[arg(long)]
    no_trade: bool,

    /// Replay this many recent signal candles through the strategy and exit
    #[arg(long, value_name = "CANDLES")]
    backtest: Option<usize>,
}

/// Fetch history over REST, replay it through the live selection rules and
/// log the report.
async fn run_backtest(cfg: &BotConfig, limit: usize) -> Result<()> {
    let client = BybitPublicClient::new(cfg.market.rest.clone())?;
    let candles = client
        .get_klines(&cfg.market.symbol, cfg.market.signal_timeframe, limit)
        .await
        .context("Failed to fetch backtest history")?;

    let engine = IndicatorEngine::new(cfg.indicators.clone());
    let rule = AdaptiveRule::new(
        RegimeClassifier::new(cfg.regime.clone(), cfg.indicators.clone()),
        StrategySelector::new(cfg.selector.clone(), engine),
    );
    let report = Backtester::new(cfg.backtest.clone()).run(&candles, &rule);

    for trade in &report.trades {
        info!(
            side = %trade.side,
            entry = trade.entry_price,
            exit = trade.exit_price,
            result = %trade.exit_reason,
            pnl = format!("{:+.2}%", trade.pnl_percent),
            reason = %trade.reason,
            "Trade"
        );
    }
    info!(
        symbol = %cfg.market.symbol,
        timeframe = %cfg.market.signal_timeframe,
        candles = candles.len(),
        trades = report.total_trades,
        wins = report.wins,
        losses = report.losses,
        win_rate = format!("{:.1}%", report.win_rate),
        total_pnl = format!("{:+.2}%", report.total_pnl_percent),
        compounded = format!("{:+.2}%", report.compounded_return_percent),
        profit_factor = ?report.profit_factor,
        max_drawdown = format!("{:.2}%", report.max_drawdown_percent),
        "Backtest summary"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| config::resolve_config_path(CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH));

    let mut cfg =
        BotConfig::load(&path).context("Failed to load adaptive bot configuration")?;
    if let Some(symbol) = args.symbol {
        cfg.market.symbol = symbol.to_uppercase();
    }
    if let Some(tf) = args.timeframe {
        cfg.market.signal_timeframe = tf;
    }
    if args.no_trade {
        cfg.orchestrator.auto_trade = false;
    }
    cfg.validate().context("Invalid configuration after CLI overrides")?;

    config::init_logging("adaptive_bot", &cfg.logging)?;
    if let Some(limit) = args.backtest {
        return run_backtest(&cfg, limit).await;
    }
    info!(
        config = %path.display(),
        symbol = %cfg.market.symbol,
        signal_tf = %cfg.market.signal_timeframe,
        reference_tf = %cfg.market.reference_timeframe,
        "Starting adaptive bot"
    );

    let journal: Arc<dyn TradeJournal> = match &cfg.journal.dir {
        Some(dir) => Arc::new(
            JsonLinesJournal::open(dir)
                .await
                .context("Failed to open trade journal")?,
        ),
        None => Arc::new(MemoryJournal::new()),
    };
    let collaborators = Collaborators {
        market_data: Arc::new(BybitPublicClient::new(cfg.market.rest.clone())?),
        trading: Arc::new(PaperTradingClient::new()),
        journal,
    };

    let stream = StreamClient::new(cfg.stream.to_connection_config());
    let bot = BotOrchestrator::new(cfg, stream.clone(), collaborators);

    // The stream keeps retrying in the background after a failed first attempt
    if let Err(e) = stream.connect().await {
        warn!(error = %e, "Initial connection failed, continuing degraded");
    }
    if let Err(e) = bot.seed().await {
        warn!(error = %e, "History seeding failed, waiting for live candles");
    }
    bot.watch_symbol()?;
    bot.start().await?;

    let mut snapshots = bot.subscribe_snapshots();
    let reporter = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snap = snapshots.borrow_and_update().clone();
            debug!(
                connection = %snap.connection,
                price = ?snap.last_price,
                regime = ?snap.regime.as_ref().map(|r| r.condition),
                signals = snap.stats.total_signals,
                "Snapshot"
            );
        }
    });

    info!("Adaptive bot running. Press Ctrl+C to stop.");
    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down adaptive bot");
    bot.shutdown().await;
    reporter.abort();

    let metrics = bot.metrics();
    info!(
        messages = metrics.messages_processed,
        signals = metrics.signals_generated,
        throttled = metrics.signals_throttled,
        trades = metrics.trades_executed,
        errors = metrics.errors,
        "Final metrics"
    );
    Ok(())
}
