//! Trading venue module
//!
//! Market data from the Polymarket CLOB and Gamma REST APIs, and order
//! handling (paper execution against the live book).

mod clob;
mod paper;
mod types;

pub use clob::{ClobClient, ClobConfig};
pub use paper::PaperVenue;
pub use types::{
    Event, EventMarket, OrderRequest, PlaceOrderResponse, PricePoint, Quote, Side, VenueError,
    VenueOrder,
};

use crate::orderbook::OrderBook;
use async_trait::async_trait;

/// Read-only market data
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Best bid and ask for a token
    async fn best_price(&self, token_id: &str) -> Result<Quote, VenueError>;
    /// Full book for a token
    async fn order_book(&self, token_id: &str) -> Result<OrderBook, VenueError>;
    /// Recent price history for a token, oldest first
    async fn prices_history(&self, token_id: &str) -> Result<Vec<PricePoint>, VenueError>;
    /// Look up an event by slug
    async fn event_by_slug(&self, slug: &str) -> Result<Option<Event>, VenueError>;
}

/// Market data plus order handling
#[async_trait]
pub trait Venue: MarketData {
    /// Submit a limit order
    async fn place_order(&self, order: OrderRequest) -> Result<PlaceOrderResponse, VenueError>;
    /// Cancel a resting order
    async fn cancel_order(&self, order_id: &str) -> Result<(), VenueError>;
    /// Current state of an order, `None` if the venue no longer knows it
    async fn get_order(&self, order_id: &str) -> Result<Option<VenueOrder>, VenueError>;
}
