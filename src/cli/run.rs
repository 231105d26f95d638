//! Run command implementation

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, MarketConfig};
use crate::position::{take_profit_queue, LifecycleManager};
use crate::risk::RiskGate;
use crate::scheduler::{ActiveLoops, TickScheduler, Trigger};
use crate::signal::SignalEvaluator;
use crate::store::{JsonFileStore, Ledger, StateStore};
use crate::takeprofit::TakeProfitManager;
use crate::venue::{ClobClient, ClobConfig, PaperVenue, Venue};
use crate::volatility::{BinanceVolatility, VolatilityService};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Grace period for tasks to stop after shutdown is signalled
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only trade these market symbols (repeatable); all configured markets by default
    #[arg(short, long = "symbol")]
    pub symbols: Vec<String>,
}

impl RunArgs {
    /// Markets selected on the command line
    pub fn select_markets(&self, config: &Config) -> anyhow::Result<Vec<MarketConfig>> {
        if self.symbols.is_empty() {
            return Ok(config.markets.clone());
        }
        self.symbols
            .iter()
            .map(|symbol| {
                config
                    .market(symbol)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("unknown market symbol: {}", symbol))
            })
            .collect()
    }

    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let markets = self.select_markets(&config)?;
        let tz = config.scheduler.tz()?;
        let tick_trigger = Trigger::parse(&config.scheduler.cron, tz)?;
        let take_profit_trigger = Trigger::parse(&config.take_profit.cron, tz)?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let clob = ClobClient::new(ClobConfig::from(&config.venue))?;
        let venue: Arc<dyn Venue> = Arc::new(PaperVenue::new(clob));
        let volatility: Arc<dyn VolatilityService> = Arc::new(BinanceVolatility::new(
            (&config.volatility).into(),
            clock.clone(),
        )?);

        let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(&config.state.path));
        let snapshot = serde_json::to_value(&config)?;
        let capacity = config.state.max_event_slugs;
        let ledger = match Ledger::open(store.clone(), snapshot.clone(), capacity).await {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::warn!(
                    path = %config.state.path.display(),
                    error = %e,
                    "Could not load state, starting with an empty ledger"
                );
                Ledger::empty(store.clone(), snapshot, capacity)
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let loops = ActiveLoops::new();
        let mut handles = Vec::new();

        for market in markets {
            let queue = take_profit_queue();
            let gate = RiskGate::new(
                config.risk.clone(),
                venue.clone(),
                volatility.clone(),
                clock.clone(),
                tz,
            );
            let lifecycle = LifecycleManager::new(
                market.clone(),
                config.entry.clone(),
                venue.clone(),
                gate,
                queue.clone(),
                ledger.clone(),
            );
            let evaluator = SignalEvaluator::new(
                config.signal.clone(),
                venue.clone(),
                volatility.clone(),
                clock.clone(),
                tz,
            );
            let tick = TickScheduler::new(
                market.clone(),
                &config.scheduler,
                tick_trigger.clone(),
                venue.clone(),
                evaluator,
                lifecycle,
                clock.clone(),
            )
            .with_active_loops(loops.clone());
            let take_profit = TakeProfitManager::new(
                market.symbol.clone(),
                config.take_profit.clone(),
                take_profit_trigger.clone(),
                venue.clone(),
                queue,
                ledger.clone(),
                clock.clone(),
            );

            tracing::info!(
                symbol = %market.symbol,
                template = %market.slug_template,
                underlying = %market.underlying,
                "Market scheduled"
            );
            handles.push(tokio::spawn(tick.run(shutdown_rx.clone())));
            handles.push(tokio::spawn(take_profit.run(shutdown_rx.clone())));
        }

        tracing::info!(
            mode = ?config.venue.mode,
            state = %config.state.path.display(),
            "All tasks running. Press Ctrl+C to stop."
        );
        wait_for_signal().await?;

        tracing::info!("Initiating graceful shutdown...");
        let _ = shutdown_tx.send(true);
        let joined = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Task panicked");
                }
            }
        })
        .await;
        if joined.is_err() {
            tracing::warn!("Shutdown timeout exceeded, forcing exit");
        }

        ledger.flush().await?;
        tracing::info!("Shutdown complete");
        Ok(())
    }
}

async fn wait_for_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Received Ctrl+C");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C");
    }
    Ok(())
}
