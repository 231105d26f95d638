//! Order ledger: the audit trail of entry and take-profit orders per event

use crate::venue::Side;
use rust_decimal::Decimal;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One order row as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub market_slug: String,
    pub side: Side,
    pub order_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub take_profit_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_size: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Orders keyed by event slug, least recently touched first.
///
/// Serialized as a JSON object whose key order is the recency order, so a
/// reload keeps the same eviction order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderLedger {
    events: Vec<(String, Vec<OrderRecord>)>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event slugs, least recently touched first
    pub fn event_slugs(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|(slug, _)| slug.as_str())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn orders(&self, event_slug: &str) -> Option<&[OrderRecord]> {
        self.events
            .iter()
            .find(|(slug, _)| slug == event_slug)
            .map(|(_, orders)| orders.as_slice())
    }

    /// All rows, oldest event first
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OrderRecord)> {
        self.events
            .iter()
            .flat_map(|(slug, orders)| orders.iter().map(move |o| (slug.as_str(), o)))
    }

    /// Move `event_slug` to most-recent, creating it if absent
    fn touch(&mut self, event_slug: &str) -> &mut Vec<OrderRecord> {
        let entry = match self.events.iter().position(|(slug, _)| slug == event_slug) {
            Some(index) => self.events.remove(index),
            None => (event_slug.to_string(), Vec::new()),
        };
        self.events.push(entry);
        let last = self.events.len() - 1;
        &mut self.events[last].1
    }

    /// Append a row under `event_slug`, then evict down to `capacity` events
    pub fn append(&mut self, event_slug: &str, record: OrderRecord, capacity: usize) {
        self.touch(event_slug).push(record);
        self.truncate(capacity);
    }

    /// Modify the row for `order_id` under `event_slug`. Returns whether the
    /// row was found. Touches the event on success.
    pub fn update<F>(&mut self, event_slug: &str, order_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut OrderRecord),
    {
        let found = self
            .events
            .iter()
            .any(|(slug, orders)| slug == event_slug && orders.iter().any(|o| o.order_id == order_id));
        if !found {
            return false;
        }
        if let Some(record) = self
            .touch(event_slug)
            .iter_mut()
            .find(|o| o.order_id == order_id)
        {
            f(record);
        }
        true
    }

    /// Keep only the `capacity` most recently touched events
    pub fn truncate(&mut self, capacity: usize) {
        if self.events.len() > capacity {
            let excess = self.events.len() - capacity;
            self.events.drain(..excess);
        }
    }
}

impl Serialize for OrderLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.events.len()))?;
        for (slug, orders) in &self.events {
            map.serialize_entry(slug, orders)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OrderLedger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LedgerVisitor;

        impl<'de> Visitor<'de> for LedgerVisitor {
            type Value = OrderLedger;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of event slug to order records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut ledger = OrderLedger::new();
                while let Some((slug, orders)) = access.next_entry::<String, Vec<OrderRecord>>()? {
                    ledger.events.retain(|(existing, _)| existing != &slug);
                    ledger.events.push((slug, orders));
                }
                Ok(ledger)
            }
        }

        deserializer.deserialize_map(LedgerVisitor)
    }
}

/// The whole persisted file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Snapshot of the effective configuration, for audit
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub orders: OrderLedger,
}
