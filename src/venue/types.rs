//! Venue request/response types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Venue call errors
#[derive(Debug, Error)]
pub enum VenueError {
    /// Transport failure, including timeouts
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success HTTP status
    #[error("venue returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The venue refused the request
    #[error("rejected: {0}")]
    Rejected(String),
    /// The response could not be understood
    #[error("malformed response: {0}")]
    Decode(String),
}

impl VenueError {
    /// Transient errors are retried on the next pass; anything else is
    /// considered a defect of the specific order or market being processed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, VenueError::Decode(_))
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Top of book for one token. Empty sides are reported as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
}

/// A limit order to submit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

/// Venue acknowledgement of an order submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub success: bool,
    #[serde(rename = "orderID")]
    pub order_id: Option<String>,
    pub error_msg: Option<String>,
}

impl PlaceOrderResponse {
    /// The order id, only when the venue accepted the order
    pub fn accepted_id(&self) -> Option<&str> {
        if self.success {
            self.order_id.as_deref().filter(|id| !id.is_empty())
        } else {
            None
        }
    }
}

/// Order state as reported by the venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueOrder {
    pub size_matched: Decimal,
    pub original_size: Decimal,
    pub price: Decimal,
    pub outcome: Option<String>,
}

/// One point of a token's price history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix seconds
    pub t: i64,
    pub p: f64,
}

/// Gamma event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub slug: String,
    #[serde(default)]
    pub markets: Vec<EventMarket>,
}

/// Market within a Gamma event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMarket {
    pub slug: String,
    pub end_date: Option<String>,
    /// JSON-encoded array of the two CLOB token IDs
    pub clob_token_ids: Option<String>,
}
