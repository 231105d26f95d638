//! Conversion of Gamma events into market windows

use super::{MarketWindow, OutcomeTokens};
use crate::venue::{Event, VenueError};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors resolving a market window. All of them mean "no signal this tick".
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("event lookup failed: {0}")]
    Venue(#[from] VenueError),
    #[error("event {0} has no markets")]
    NoMarkets(String),
    #[error("market {slug} is missing {field}")]
    MissingField { slug: String, field: &'static str },
    #[error("malformed clobTokenIds '{raw}': {reason}")]
    MalformedTokens { raw: String, reason: String },
    #[error("malformed endDate '{0}'")]
    MalformedEndDate(String),
}

/// Take the first market of the event that carries token IDs
pub(super) fn window_from_event(event: Event) -> Result<MarketWindow, MarketError> {
    let event_slug = event.slug;
    let market = event
        .markets
        .into_iter()
        .find(|m| m.clob_token_ids.is_some())
        .ok_or_else(|| MarketError::NoMarkets(event_slug.clone()))?;

    let raw_tokens = market
        .clob_token_ids
        .as_deref()
        .ok_or_else(|| MarketError::MissingField {
            slug: market.slug.clone(),
            field: "clobTokenIds",
        })?;
    let (yes, no) = parse_token_ids(raw_tokens)?;

    let raw_end = market
        .end_date
        .as_deref()
        .ok_or_else(|| MarketError::MissingField {
            slug: market.slug.clone(),
            field: "endDate",
        })?;
    let end_time = DateTime::parse_from_rfc3339(raw_end)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| MarketError::MalformedEndDate(raw_end.to_string()))?;

    Ok(MarketWindow {
        market_slug: market.slug,
        event_slug,
        end_time,
        tokens: OutcomeTokens { yes, no },
    })
}

/// Parse CLOB token IDs from their JSON string form
///
/// Format: "[\"token1\", \"token2\"]" where token1 is YES (Up) and token2 is NO (Down)
pub fn parse_token_ids(raw: &str) -> Result<(String, String), MarketError> {
    let tokens: Vec<String> =
        serde_json::from_str(raw).map_err(|e| MarketError::MalformedTokens {
            raw: raw.to_string(),
            reason: e.to_string(),
        })?;

    match tokens.as_slice() {
        [yes, no, ..] => Ok((yes.clone(), no.clone())),
        _ => Err(MarketError::MalformedTokens {
            raw: raw.to_string(),
            reason: format!("expected 2 token IDs, got {}", tokens.len()),
        }),
    }
}
