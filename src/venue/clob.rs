//! Polymarket CLOB / Gamma REST client for market data
//!
//! Only public endpoints are used: order books, price history and event
//! lookup. Order handling lives in [`super::PaperVenue`].

use super::{Event, MarketData, PricePoint, Quote, VenueError};
use crate::config::VenueConfig;
use crate::orderbook::{OrderBook, PriceLevel};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Polymarket CLOB API base URL
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";

/// Polymarket Gamma API base URL
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// Configuration for the CLOB client
#[derive(Debug, Clone)]
pub struct ClobConfig {
    pub clob_url: String,
    pub gamma_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for ClobConfig {
    fn default() -> Self {
        Self {
            clob_url: CLOB_API_URL.to_string(),
            gamma_url: GAMMA_API_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl From<&VenueConfig> for ClobConfig {
    fn from(config: &VenueConfig) -> Self {
        Self {
            clob_url: config.clob_url.trim_end_matches('/').to_string(),
            gamma_url: config.gamma_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Client for the public Polymarket REST endpoints
pub struct ClobClient {
    config: ClobConfig,
    client: Client,
}

impl ClobClient {
    /// Create a new client
    pub fn new(config: ClobConfig) -> Result<Self, VenueError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, VenueError> {
        tracing::trace!(url = %url, ?query, "GET");
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| VenueError::Decode(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl MarketData for ClobClient {
    async fn best_price(&self, token_id: &str) -> Result<Quote, VenueError> {
        let book = self.order_book(token_id).await?;
        Ok(Quote {
            bid: book.best_bid().unwrap_or(Decimal::ZERO),
            ask: book.best_ask().unwrap_or(Decimal::ZERO),
        })
    }

    async fn order_book(&self, token_id: &str) -> Result<OrderBook, VenueError> {
        let url = format!("{}/book", self.config.clob_url);
        let book: Option<BookResponse> = self.get_json(&url, &[("token_id", token_id)]).await?;
        match book {
            Some(book) => Ok(book_response_to_orderbook(token_id, book)),
            None => Ok(OrderBook::new(token_id)),
        }
    }

    async fn prices_history(&self, token_id: &str) -> Result<Vec<PricePoint>, VenueError> {
        let url = format!("{}/prices-history", self.config.clob_url);
        let history: Option<PricesHistoryResponse> = self
            .get_json(
                &url,
                &[("market", token_id), ("interval", "1h"), ("fidelity", "1")],
            )
            .await?;
        let mut points = history.map(|h| h.history).unwrap_or_default();
        points.sort_by_key(|p| p.t);
        Ok(points)
    }

    async fn event_by_slug(&self, slug: &str) -> Result<Option<Event>, VenueError> {
        let url = format!("{}/events", self.config.gamma_url);
        let events: Option<Vec<Event>> = self.get_json(&url, &[("slug", slug)]).await?;
        Ok(events.and_then(|events| events.into_iter().find(|e| e.slug == slug)))
    }
}

/// Response of `GET /book`
#[derive(Debug, Deserialize)]
struct BookResponse {
    #[serde(default)]
    bids: Vec<BookLevel>,
    #[serde(default)]
    asks: Vec<BookLevel>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Price level in the order book
#[derive(Debug, Deserialize)]
struct BookLevel {
    price: String,
    size: String,
}

/// Response of `GET /prices-history`
#[derive(Debug, Deserialize)]
struct PricesHistoryResponse {
    #[serde(default)]
    history: Vec<PricePoint>,
}

/// Convert a book response, dropping unparseable levels
fn book_response_to_orderbook(token_id: &str, book: BookResponse) -> OrderBook {
    let parse = |levels: Vec<BookLevel>| -> Vec<PriceLevel> {
        levels
            .into_iter()
            .filter_map(|level| {
                let price = Decimal::from_str(&level.price).ok()?;
                let size = Decimal::from_str(&level.size).ok()?;
                Some(PriceLevel { price, size })
            })
            .collect()
    };

    let mut orderbook = OrderBook::from_levels(token_id, parse(book.bids), parse(book.asks));

    // Timestamp is milliseconds since epoch
    if let Some(ts) = book
        .timestamp
        .and_then(|t| t.parse::<i64>().ok())
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
    {
        orderbook.updated_at = ts;
    }
    orderbook
}
