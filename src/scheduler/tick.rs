//! Per-symbol hourly tick loop
//!
//! The trigger starts an hourly loop. The loop resolves the current market,
//! evaluates the signal and hands signals to the lifecycle manager, then
//! sleeps for the adaptive interval. It ends when the wall-clock hour
//! changes, which resets the entry flags and the interval.

use super::{sleep_or_shutdown, Trigger};
use crate::clock::Clock;
use crate::config::{MarketConfig, SchedulerConfig};
use crate::market::resolve_window;
use crate::position::{EntryAction, LifecycleManager};
use crate::signal::SignalEvaluator;
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use crate::venue::Venue;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Symbols whose hourly loop is currently running
#[derive(Debug, Clone, Default)]
pub struct ActiveLoops {
    symbols: Arc<Mutex<HashSet<String>>>,
}

impl ActiveLoops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `symbol` active. `None` if a loop for it is already running.
    pub fn acquire(&self, symbol: &str) -> Option<LoopGuard> {
        let mut symbols = self.symbols.lock().unwrap_or_else(|e| e.into_inner());
        if !symbols.insert(symbol.to_string()) {
            return None;
        }
        Some(LoopGuard {
            symbols: self.symbols.clone(),
            symbol: symbol.to_string(),
        })
    }

    pub fn is_active(&self, symbol: &str) -> bool {
        self.symbols
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(symbol)
    }
}

/// Releases the symbol when the hourly loop ends
#[derive(Debug)]
pub struct LoopGuard {
    symbols: Arc<Mutex<HashSet<String>>>,
    symbol: String,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.symbols
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.symbol);
    }
}

/// Drives one market symbol
pub struct TickScheduler {
    market: MarketConfig,
    trigger: Trigger,
    venue: Arc<dyn Venue>,
    evaluator: SignalEvaluator,
    lifecycle: LifecycleManager,
    clock: Arc<dyn Clock>,
    loops: ActiveLoops,
    base_interval: Duration,
    min_interval: Duration,
    interval: Duration,
}

impl TickScheduler {
    pub fn new(
        market: MarketConfig,
        config: &SchedulerConfig,
        trigger: Trigger,
        venue: Arc<dyn Venue>,
        evaluator: SignalEvaluator,
        lifecycle: LifecycleManager,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let base_interval = Duration::from_secs(config.base_interval_secs.max(1));
        let min_interval = Duration::from_secs(config.min_interval_secs.max(1)).min(base_interval);
        Self {
            market,
            trigger,
            venue,
            evaluator,
            lifecycle,
            clock,
            loops: ActiveLoops::new(),
            base_interval,
            min_interval,
            interval: base_interval,
        }
    }

    /// Share the active-loop registry with other schedulers
    pub fn with_active_loops(mut self, loops: ActiveLoops) -> Self {
        self.loops = loops;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// Run until shutdown
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            symbol = %self.market.symbol,
            timezone = %self.trigger.timezone(),
            "Tick scheduler started"
        );

        loop {
            if !self.trigger.wait(self.clock.as_ref(), &mut shutdown).await {
                break;
            }
            if !self.run_hour(&mut shutdown).await {
                break;
            }
        }

        tracing::info!(symbol = %self.market.symbol, "Tick scheduler stopped");
    }

    /// Run the hourly loop until the hour changes. Returns `false` on shutdown.
    pub async fn run_hour(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let Some(_guard) = self.loops.acquire(&self.market.symbol) else {
            tracing::debug!(symbol = %self.market.symbol, "Hourly loop already active");
            return sleep_or_shutdown(self.min_interval, shutdown).await;
        };

        let tz = self.trigger.timezone();
        let started = hour_key(self.clock.now(), tz);
        tracing::info!(symbol = %self.market.symbol, hour = started.1, "Hourly loop started");

        while hour_key(self.clock.now(), tz) == started {
            self.run_tick().await;
            if !sleep_or_shutdown(self.interval, shutdown).await {
                return false;
            }
        }

        self.reset_cycle();
        tracing::info!(symbol = %self.market.symbol, "Hourly loop finished");
        true
    }

    /// One evaluation: resolve the market, evaluate, and act on a signal
    pub async fn run_tick(&mut self) -> Option<EntryAction> {
        increment(CounterMetric::Ticks, &self.market.symbol);
        let now = self.clock.now();

        let window = match resolve_window(
            self.venue.as_ref(),
            &self.market.slug_template,
            now,
            self.trigger.timezone(),
        )
        .await
        {
            Ok(Some(window)) => window,
            Ok(None) => return None,
            Err(e) => {
                tracing::info!(symbol = %self.market.symbol, error = %e, "Market unavailable");
                return None;
            }
        };

        let signal = self.evaluator.evaluate(&self.market, &window).await?;
        if signal.liquidity_signal {
            self.halve_interval();
        }

        match self.lifecycle.on_signal(&window, &signal).await {
            Ok(action) => {
                tracing::debug!(symbol = %self.market.symbol, ?action, "Signal handled");
                Some(action)
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %self.market.symbol,
                    market = %window.market_slug,
                    error = %e,
                    "Entry failed, retrying next tick"
                );
                None
            }
        }
    }

    fn halve_interval(&mut self) {
        self.interval = (self.interval / 2).max(self.min_interval);
        tracing::info!(
            symbol = %self.market.symbol,
            interval_ms = self.interval.as_millis() as u64,
            "Liquidity signal, tick interval shortened"
        );
        set_gauge(
            GaugeMetric::TickInterval,
            &self.market.symbol,
            self.interval.as_secs_f64(),
        );
    }

    /// Hour rotation: new cycle, base interval
    pub fn reset_cycle(&mut self) {
        self.lifecycle.reset_cycle();
        self.interval = self.base_interval;
        set_gauge(
            GaugeMetric::TickInterval,
            &self.market.symbol,
            self.interval.as_secs_f64(),
        );
    }
}

/// Local calendar hour containing `now`
fn hour_key(now: DateTime<Utc>, tz: Tz) -> (NaiveDate, u32) {
    let local = now.with_timezone(&tz);
    (local.date_naive(), local.hour())
}
