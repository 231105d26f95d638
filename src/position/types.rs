//! Position types

use crate::market::Outcome;
use crate::store::OrderRecord;
use crate::venue::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry orders handed from the lifecycle manager to the take-profit manager
pub type TakeProfitQueue = Arc<Mutex<Vec<EntryOrder>>>;

/// Create an empty take-profit queue
pub fn take_profit_queue() -> TakeProfitQueue {
    Arc::new(Mutex::new(Vec::new()))
}

/// Which entry of the hourly cycle an order is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Initial,
    Extra,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Initial => write!(f, "initial"),
            EntryKind::Extra => write!(f, "extra"),
        }
    }
}

/// Terminal error strings recorded on entry orders
pub mod terminal {
    /// Cancelled at market close with less than one share filled
    pub const UNFILLED: &str = "unfilled";
    /// The venue no longer knows the order
    pub const NOT_FOUND: &str = "not_found";
    /// Still unresolved long after market close
    pub const EXPIRED: &str = "expired";
}

/// An accepted entry order, tracked until it is take-profited or errored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryOrder {
    /// Market symbol from configuration
    pub symbol: String,
    pub token_id: String,
    pub entry_order_id: String,
    pub requested_size: Decimal,
    pub matched_size: Decimal,
    pub entry_price: Decimal,
    pub outcome: Outcome,
    pub kind: EntryKind,
    pub event_slug: String,
    pub market_slug: String,
    pub market_end: DateTime<Utc>,
    pub error: Option<String>,
    pub take_profit_order_id: Option<String>,
    pub profit: Option<Decimal>,
    /// The unfilled remainder was cancelled at the venue
    #[serde(default)]
    pub cancelled: bool,
}

impl EntryOrder {
    /// Take-profited or terminally errored
    pub fn is_resolved(&self) -> bool {
        self.take_profit_order_id.is_some() || self.error.is_some()
    }

    pub fn is_fully_filled(&self) -> bool {
        self.matched_size >= self.requested_size
    }

    /// Record the venue's matched size. Smaller values are ignored.
    /// Returns whether the stored size changed.
    pub fn record_matched(&mut self, size: Decimal) -> bool {
        if size > self.matched_size {
            self.matched_size = size;
            true
        } else {
            false
        }
    }

    /// Seconds since the market ended, negative before the end
    pub fn seconds_since_end(&self, now: DateTime<Utc>) -> i64 {
        (now - self.market_end).num_seconds()
    }

    /// The ledger row for this entry
    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            market_slug: self.market_slug.clone(),
            side: Side::Buy,
            order_id: self.entry_order_id.clone(),
            price: self.entry_price,
            size: self.requested_size,
            take_profit_order_id: self.take_profit_order_id.clone(),
            matched_size: None,
            profit: self.profit,
            outcome: Some(self.outcome.to_string()),
            error: self.error.clone(),
        }
    }
}
