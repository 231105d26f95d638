//! Paper trading venue with simulated fills against the live book

use super::{
    Event, MarketData, OrderRequest, PlaceOrderResponse, PricePoint, Quote, Side, Venue,
    VenueError, VenueOrder,
};
use crate::orderbook::OrderBook;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct PaperOrder {
    request: OrderRequest,
    matched: Decimal,
    cancelled: bool,
}

impl PaperOrder {
    fn remaining(&self) -> Decimal {
        self.request.size - self.matched
    }
}

/// Routes market data to a real source and simulates execution.
///
/// A BUY fills against asks priced at or below its limit, a SELL against
/// bids at or above it. Resting orders are re-matched against the current
/// book every time they are queried.
pub struct PaperVenue<M: MarketData> {
    data: M,
    orders: Arc<RwLock<HashMap<String, PaperOrder>>>,
}

impl<M: MarketData> PaperVenue<M> {
    /// Create a new paper venue over a market data source
    pub fn new(data: M) -> Self {
        Self {
            data,
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Shares executable against `book` for `request`, capped at `remaining`
    fn executable(book: &OrderBook, request: &OrderRequest, remaining: Decimal) -> Decimal {
        let available: Decimal = match request.side {
            Side::Buy => book
                .asks
                .iter()
                .filter(|l| l.price <= request.price)
                .map(|l| l.size)
                .sum(),
            Side::Sell => book
                .bids
                .iter()
                .filter(|l| l.price >= request.price)
                .map(|l| l.size)
                .sum(),
        };
        available.min(remaining).max(Decimal::ZERO)
    }

    async fn try_match(&self, request: &OrderRequest, remaining: Decimal) -> Decimal {
        match self.data.order_book(&request.token_id).await {
            Ok(book) => Self::executable(&book, request, remaining),
            Err(e) => {
                tracing::debug!(error = %e, token_id = %request.token_id, "Paper match skipped");
                Decimal::ZERO
            }
        }
    }
}

#[async_trait]
impl<M: MarketData> MarketData for PaperVenue<M> {
    async fn best_price(&self, token_id: &str) -> Result<Quote, VenueError> {
        self.data.best_price(token_id).await
    }

    async fn order_book(&self, token_id: &str) -> Result<OrderBook, VenueError> {
        self.data.order_book(token_id).await
    }

    async fn prices_history(&self, token_id: &str) -> Result<Vec<PricePoint>, VenueError> {
        self.data.prices_history(token_id).await
    }

    async fn event_by_slug(&self, slug: &str) -> Result<Option<Event>, VenueError> {
        self.data.event_by_slug(slug).await
    }
}

#[async_trait]
impl<M: MarketData> Venue for PaperVenue<M> {
    async fn place_order(&self, order: OrderRequest) -> Result<PlaceOrderResponse, VenueError> {
        if order.size <= Decimal::ZERO || order.price <= Decimal::ZERO || order.price >= Decimal::ONE
        {
            return Ok(PlaceOrderResponse {
                success: false,
                order_id: None,
                error_msg: Some(format!(
                    "invalid order: price {} size {}",
                    order.price, order.size
                )),
            });
        }

        let matched = self.try_match(&order, order.size).await;
        let order_id = format!("paper-{}", Uuid::new_v4());

        tracing::info!(
            order_id = %order_id,
            side = %order.side,
            token_id = %order.token_id,
            price = %order.price,
            size = %order.size,
            matched = %matched,
            "Paper order accepted"
        );

        self.orders.write().await.insert(
            order_id.clone(),
            PaperOrder {
                request: order,
                matched,
                cancelled: false,
            },
        );

        Ok(PlaceOrderResponse {
            success: true,
            order_id: Some(order_id),
            error_msg: None,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), VenueError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(order_id) {
            Some(order) => {
                order.cancelled = true;
                tracing::info!(order_id, matched = %order.matched, "Paper order cancelled");
                Ok(())
            }
            None => Err(VenueError::Rejected(format!("unknown order {}", order_id))),
        }
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<VenueOrder>, VenueError> {
        let Some(snapshot) = self.orders.read().await.get(order_id).cloned() else {
            return Ok(None);
        };

        let mut matched = snapshot.matched;
        if !snapshot.cancelled && snapshot.remaining() > Decimal::ZERO {
            let extra = self.try_match(&snapshot.request, snapshot.remaining()).await;
            if extra > Decimal::ZERO {
                let mut orders = self.orders.write().await;
                if let Some(order) = orders.get_mut(order_id) {
                    if !order.cancelled {
                        order.matched = (order.matched + extra).min(order.request.size);
                    }
                    matched = order.matched;
                }
            }
        }

        Ok(Some(VenueOrder {
            size_matched: matched,
            original_size: snapshot.request.size,
            price: snapshot.request.price,
            outcome: None,
        }))
    }
}
