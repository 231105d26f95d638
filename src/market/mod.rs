//! Market discovery module
//!
//! Resolves the active hourly up/down market for a symbol: render the event
//! slug for the current hour, look the event up on Gamma, and turn it into a
//! [`MarketWindow`].

mod gamma;
mod slug;

pub use gamma::{parse_token_ids, MarketError};
pub use slug::render_slug;

use crate::venue::MarketData;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two outcomes of an up/down market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// First CLOB token ("yes")
    Up,
    /// Second CLOB token ("no")
    Down,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Up => write!(f, "Up"),
            Outcome::Down => write!(f, "Down"),
        }
    }
}

/// CLOB token identifiers of the outcome pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTokens {
    pub yes: String,
    pub no: String,
}

impl OutcomeTokens {
    pub fn token(&self, outcome: Outcome) -> &str {
        match outcome {
            Outcome::Up => &self.yes,
            Outcome::Down => &self.no,
        }
    }
}

/// The tradeable market for one hourly cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketWindow {
    pub market_slug: String,
    pub event_slug: String,
    /// Settlement time
    pub end_time: DateTime<Utc>,
    pub tokens: OutcomeTokens,
}

impl MarketWindow {
    /// Seconds until settlement, negative once ended
    pub fn seconds_to_end(&self, now: DateTime<Utc>) -> i64 {
        (self.end_time - now).num_seconds()
    }
}

/// Render the slug for `now` and fetch its market window.
///
/// `Ok(None)` means the event does not exist (yet); the caller treats that as
/// "no signal this tick".
pub async fn resolve_window<V: MarketData + ?Sized>(
    venue: &V,
    template: &str,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<Option<MarketWindow>, MarketError> {
    let slug = render_slug(template, now, tz);
    let Some(event) = venue.event_by_slug(&slug).await? else {
        tracing::info!(slug = %slug, "Event not found");
        return Ok(None);
    };
    gamma::window_from_event(event).map(Some)
}
