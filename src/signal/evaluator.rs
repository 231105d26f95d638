//! Entry signal evaluation
//!
//! A signal is produced when the leading outcome's best ask sits between the
//! time-based threshold and the trigger ceiling, and either:
//! - the underlying has diverged far enough from the hour open (`z >= z_min`)
//!   and moved enough over the last hour, or
//! - the "liquidity chase" fallback applies: price above 0.98 in the last
//!   minute with the 0.99 ask level nearly exhausted.

use super::threshold::threshold;
use super::{NoSignalReason, Signal};
use crate::clock::Clock;
use crate::config::{MarketConfig, SignalConfig};
use crate::market::{MarketWindow, Outcome};
use crate::telemetry::{increment, CounterMetric};
use crate::venue::Venue;
use crate::volatility::VolatilityService;
use chrono::Timelike;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Evaluates the entry signal for a market window
pub struct SignalEvaluator {
    config: SignalConfig,
    venue: Arc<dyn Venue>,
    volatility: Arc<dyn VolatilityService>,
    clock: Arc<dyn Clock>,
    tz: Tz,
}

impl SignalEvaluator {
    pub fn new(
        config: SignalConfig,
        venue: Arc<dyn Venue>,
        volatility: Arc<dyn VolatilityService>,
        clock: Arc<dyn Clock>,
        tz: Tz,
    ) -> Self {
        Self {
            config,
            venue,
            volatility,
            clock,
            tz,
        }
    }

    /// Evaluate one tick. Never fails: every rejection and data problem is
    /// logged and reported as `None`.
    pub async fn evaluate(&self, market: &MarketConfig, window: &MarketWindow) -> Option<Signal> {
        match self.try_evaluate(market, window).await {
            Ok(signal) => {
                tracing::info!(
                    symbol = %market.symbol,
                    market = %window.market_slug,
                    outcome = %signal.outcome,
                    price = %signal.price,
                    threshold = %signal.threshold,
                    z = signal.z,
                    liquidity_signal = signal.liquidity_signal,
                    seconds_to_end = signal.seconds_to_end,
                    "Entry signal"
                );
                let metric = if signal.liquidity_signal {
                    CounterMetric::LiquiditySignals
                } else {
                    CounterMetric::Signals
                };
                increment(metric, &market.symbol);
                Some(signal)
            }
            Err(NoSignalReason::DataUnavailable(reason)) => {
                tracing::info!(
                    symbol = %market.symbol,
                    market = %window.market_slug,
                    reason = %reason,
                    "No signal: data unavailable"
                );
                None
            }
            Err(reason) => {
                tracing::debug!(
                    symbol = %market.symbol,
                    market = %window.market_slug,
                    ?reason,
                    "No signal"
                );
                None
            }
        }
    }

    /// Evaluate one tick, reporting why no signal was produced
    pub async fn try_evaluate(
        &self,
        market: &MarketConfig,
        window: &MarketWindow,
    ) -> Result<Signal, NoSignalReason> {
        let now = self.clock.now();
        let seconds_to_end = window.seconds_to_end(now);
        if seconds_to_end <= 0 {
            return Err(NoSignalReason::MarketEnded);
        }

        let z = self
            .volatility
            .z(&market.underlying, seconds_to_end)
            .await
            .map_err(|e| NoSignalReason::DataUnavailable(format!("z: {}", e)))?;

        let yes_price = self.best_ask(&window.tokens.yes).await?;
        let no_price = self.best_ask(&window.tokens.no).await?;
        if yes_price <= Decimal::ZERO && no_price <= Decimal::ZERO {
            return Err(NoSignalReason::DataUnavailable("empty books".to_string()));
        }

        let (outcome, top_price) = if yes_price >= no_price {
            (Outcome::Up, yes_price)
        } else {
            (Outcome::Down, no_price)
        };
        let token_id = window.tokens.token(outcome).to_string();

        let liquidity_signal = if z >= self.config.z_min {
            false
        } else {
            let local_minute = now.with_timezone(&self.tz).minute();
            self.liquidity_chase(&token_id, top_price, local_minute, z)
                .await?;
            true
        };

        let entry_threshold = threshold(seconds_to_end, &self.config.threshold);
        if top_price < entry_threshold {
            return Err(NoSignalReason::BelowThreshold {
                price: top_price,
                threshold: entry_threshold,
            });
        }

        if !liquidity_signal {
            if top_price > self.config.trigger_ceiling {
                return Err(NoSignalReason::AboveCeiling(top_price));
            }

            let amp = self
                .volatility
                .one_hour_amp(&market.underlying)
                .await
                .map_err(|e| NoSignalReason::DataUnavailable(format!("amp: {}", e)))?;
            if amp < self.config.amp_min {
                return Err(NoSignalReason::LowAmplitude(amp));
            }
        }

        Ok(Signal {
            outcome,
            price: top_price,
            token_id,
            liquidity_signal,
            yes_price,
            no_price,
            seconds_to_end,
            threshold: entry_threshold,
            z,
            timestamp: now,
        })
    }

    /// Fallback when divergence is weak: late in the hour, price above the
    /// chase floor, and the ask level at 0.99 nearly exhausted
    async fn liquidity_chase(
        &self,
        token_id: &str,
        top_price: Decimal,
        minute: u32,
        z: f64,
    ) -> Result<(), NoSignalReason> {
        if top_price <= self.config.liquidity_min_price
            || minute <= self.config.liquidity_after_minute
        {
            return Err(NoSignalReason::WeakDivergence(z));
        }

        let book = self
            .venue
            .order_book(token_id)
            .await
            .map_err(|e| NoSignalReason::DataUnavailable(format!("book: {}", e)))?;
        let resting = book.ask_size_at(self.config.liquidity_level);
        if resting >= self.config.liquidity_depletion_size {
            tracing::debug!(
                token_id,
                resting = %resting,
                "Liquidity not depleted"
            );
            return Err(NoSignalReason::WeakDivergence(z));
        }
        Ok(())
    }

    async fn best_ask(&self, token_id: &str) -> Result<Decimal, NoSignalReason> {
        self.venue
            .best_price(token_id)
            .await
            .map(|q| q.ask)
            .map_err(|e| NoSignalReason::DataUnavailable(format!("price {}: {}", token_id, e)))
    }
}
