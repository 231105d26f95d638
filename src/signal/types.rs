//! Signal types

use crate::market::Outcome;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An entry decision for one tick. Consumed immediately, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Outcome to buy
    pub outcome: Outcome,
    /// Best ask of the chosen outcome
    pub price: Decimal,
    /// CLOB token of the chosen outcome
    pub token_id: String,
    /// Produced by the liquidity-chase fallback rather than the divergence path
    pub liquidity_signal: bool,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    pub seconds_to_end: i64,
    /// Entry threshold in force when the signal was produced
    pub threshold: Decimal,
    pub z: f64,
    pub timestamp: DateTime<Utc>,
}

/// Why a tick produced no signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NoSignalReason {
    /// Market already settled
    MarketEnded,
    /// Price, book or volatility data unavailable
    DataUnavailable(String),
    /// Divergence below minimum and liquidity chase conditions not met
    WeakDivergence(f64),
    /// Top price below the time-based threshold
    BelowThreshold { price: Decimal, threshold: Decimal },
    /// Top price above the trigger ceiling
    AboveCeiling(Decimal),
    /// Underlying too quiet over the last hour
    LowAmplitude(f64),
}
