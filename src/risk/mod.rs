//! Risk gate module
//!
//! Gates the extra (second) entry of an hourly cycle. Initial entries only
//! need a signal; extra entries must also pass directional stability, price
//! position and trend, and the price/volatility ladder.

pub mod ladder;
pub mod stability;
pub mod trend;

pub use ladder::{check_ladder, LadderInput};
pub use stability::check_stability;
pub use trend::check_trend;

use crate::clock::Clock;
use crate::config::{MarketConfig, RiskConfig};
use crate::signal::Signal;
use crate::telemetry::{increment, CounterMetric};
use crate::venue::Venue;
use crate::volatility::VolatilityService;
use chrono::{Duration, Timelike};
use chrono_tz::Tz;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of a gate check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: String,
}

impl GateDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Stateless extra-entry gate over live market data
pub struct RiskGate {
    config: RiskConfig,
    venue: Arc<dyn Venue>,
    volatility: Arc<dyn VolatilityService>,
    clock: Arc<dyn Clock>,
    tz: Tz,
}

impl RiskGate {
    pub fn new(
        config: RiskConfig,
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

    /// Run every extra-entry check. A data failure declines this tick.
    pub async fn check_extra_entry(&self, market: &MarketConfig, signal: &Signal) -> GateDecision {
        let decision = self.evaluate(market, signal).await;
        if decision.allowed {
            tracing::info!(symbol = %market.symbol, reason = %decision.reason, "Extra entry allowed");
        } else {
            increment(CounterMetric::GateRejections, &market.symbol);
            tracing::info!(symbol = %market.symbol, reason = %decision.reason, "Extra entry declined");
        }
        decision
    }

    async fn evaluate(&self, market: &MarketConfig, signal: &Signal) -> GateDecision {
        let now = self.clock.now();
        let local_now = now.with_timezone(&self.tz);

        let history = match self.venue.prices_history(&signal.token_id).await {
            Ok(history) => history,
            Err(e) => return GateDecision::reject(format!("price history unavailable: {}", e)),
        };
        let since = (now - Duration::minutes(self.config.lookback_minutes)).timestamp();
        let prices: Vec<f64> = history
            .iter()
            .filter(|point| point.t >= since)
            .map(|point| point.p)
            .collect();

        let stability = check_stability(&prices, &local_now, &self.config);
        if !stability.allowed {
            return stability;
        }

        let candles = match self.volatility.hour_candles(&market.underlying).await {
            Ok(candles) => candles,
            Err(e) => return GateDecision::reject(format!("candles unavailable: {}", e)),
        };
        let trend = check_trend(
            &candles,
            signal.outcome,
            self.config.price_position_threshold,
            self.config.trend_candles,
        );
        if !trend.allowed {
            return trend;
        }

        let amp = match self.volatility.one_hour_amp(&market.underlying).await {
            Ok(amp) => amp,
            Err(e) => return GateDecision::reject(format!("amplitude unavailable: {}", e)),
        };
        let book = match self.venue.order_book(&signal.token_id).await {
            Ok(book) => book,
            Err(e) => return GateDecision::reject(format!("book unavailable: {}", e)),
        };

        let ladder = check_ladder(&LadderInput {
            price: signal.price,
            minute: local_now.minute(),
            amp,
            seller_liquidity: book.ask_depth_up_to(dec!(0.99)),
            min_seller_liquidity: self.config.extra_min_seller_liquidity,
        });
        if !ladder.allowed {
            return ladder;
        }

        GateDecision::allow(format!(
            "{}; {}; {}",
            stability.reason, trend.reason, ladder.reason
        ))
    }
}
