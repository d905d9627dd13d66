//! Types for the item price tracker

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a price value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    /// Fetched from the market during this lookup
    Live,
    /// Served from the hot cache
    Cache,
    /// Served from the last-known-good tier because the market was unavailable
    StaleCache,
    /// No price could be produced
    Error,
}

impl QuoteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteSource::Live => "live",
            QuoteSource::Cache => "cache",
            QuoteSource::StaleCache => "stale_cache",
            QuoteSource::Error => "error",
        }
    }
}

impl std::fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A price snapshot for one market item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Lowest listed price, never negative
    pub price: Decimal,

    /// Units traded over the last 24h
    pub volume: u64,

    /// Active sell listings (0 when unknown)
    pub listings: u64,

    /// Provenance of this value
    pub source: QuoteSource,

    /// When the value was fetched from the market
    pub timestamp: DateTime<Utc>,
}

impl PriceQuote {
    /// Creates a quote fetched from the market just now
    pub fn live(price: Decimal, volume: u64, listings: u64) -> Self {
        Self {
            price: price.max(Decimal::ZERO),
            volume,
            listings,
            source: QuoteSource::Live,
            timestamp: Utc::now(),
        }
    }

    /// Returns a copy of this quote re-tagged with a different source
    pub fn with_source(mut self, source: QuoteSource) -> Self {
        self.source = source;
        self
    }

    /// Get the age of the quote
    pub fn age(&self) -> std::time::Duration {
        let duration = Utc::now().signed_duration_since(self.timestamp);
        std::time::Duration::from_secs(duration.num_seconds().max(0) as u64)
    }
}

/// Price lookup that produced no value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFailure {
    pub error: String,
    pub source: QuoteSource,
    pub timestamp: DateTime<Utc>,
}

impl PriceFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            source: QuoteSource::Error,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of a pipeline lookup: always tagged, never an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceLookup {
    Quote(PriceQuote),
    Failed(PriceFailure),
}

impl PriceLookup {
    pub fn source(&self) -> QuoteSource {
        match self {
            PriceLookup::Quote(quote) => quote.source,
            PriceLookup::Failed(failure) => failure.source,
        }
    }

    pub fn quote(&self) -> Option<&PriceQuote> {
        match self {
            PriceLookup::Quote(quote) => Some(quote),
            PriceLookup::Failed(_) => None,
        }
    }

    pub fn into_quote(self) -> Option<PriceQuote> {
        match self {
            PriceLookup::Quote(quote) => Some(quote),
            PriceLookup::Failed(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PriceLookup::Failed(_))
    }

    /// Status an HTTP host should answer `GET /items/{id}/price` with
    pub fn http_status(&self) -> StatusCode {
        if self.is_error() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        }
    }
}

impl From<PriceQuote> for PriceLookup {
    fn from(quote: PriceQuote) -> Self {
        PriceLookup::Quote(quote)
    }
}

impl From<PriceFailure> for PriceLookup {
    fn from(failure: PriceFailure) -> Self {
        PriceLookup::Failed(failure)
    }
}

/// Kind of tradable item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Weapon,
    Knife,
    Glove,
    Sticker,
    Case,
    Other,
}

/// An item tracked by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub name: String,
    /// Stable market identifier, used as the lookup and cache key
    pub market_hash_name: String,
    pub item_type: ItemType,
    pub rarity: Option<String>,
    pub collection: Option<String>,
    pub current_price: Decimal,
    pub volume_24h: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl CatalogItem {
    /// Creates an item that has never been priced
    pub fn new(
        id: i64,
        name: impl Into<String>,
        market_hash_name: impl Into<String>,
        item_type: ItemType,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            market_hash_name: market_hash_name.into(),
            item_type,
            rarity: None,
            collection: None,
            current_price: Decimal::ZERO,
            volume_24h: 0,
            last_updated: None,
        }
    }

    pub fn with_rarity(mut self, rarity: impl Into<String>) -> Self {
        self.rarity = Some(rarity.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }
}

/// Append-only price snapshot for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryRecord {
    pub item_id: i64,
    pub price: Decimal,
    pub volume: u64,
    pub listings: u64,
    pub recorded_at: DateTime<Utc>,
}

/// One item's refresh result, committed as a unit by the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub item_id: i64,
    pub price: Decimal,
    pub volume: u64,
    pub listings: u64,
    pub updated_at: DateTime<Utc>,
}

impl PriceUpdate {
    pub fn from_quote(item_id: i64, quote: &PriceQuote) -> Self {
        Self {
            item_id,
            price: quote.price,
            volume: quote.volume,
            listings: quote.listings,
            updated_at: Utc::now(),
        }
    }

    /// History row recorded alongside this update
    pub fn history_record(&self) -> PriceHistoryRecord {
        PriceHistoryRecord {
            item_id: self.item_id,
            price: self.price,
            volume: self.volume,
            listings: self.listings,
            recorded_at: self.updated_at,
        }
    }
}

/// Price events published by the refresh scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceEvent {
    /// A catalog item received a new price
    PriceUpdated {
        id: Uuid,
        market_hash_name: String,
        old_price: Decimal,
        new_price: Decimal,
        source: QuoteSource,
        timestamp: DateTime<Utc>,
    },

    /// A catalog item could not be refreshed this cycle
    PriceFetchFailed {
        id: Uuid,
        market_hash_name: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl PriceEvent {
    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            PriceEvent::PriceUpdated { id, .. } => *id,
            PriceEvent::PriceFetchFailed { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            PriceEvent::PriceUpdated { .. } => "PRICE_UPDATED",
            PriceEvent::PriceFetchFailed { .. } => "PRICE_FETCH_FAILED",
        }
    }
}

impl std::fmt::Display for PriceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceEvent::PriceUpdated {
                market_hash_name,
                new_price,
                source,
                ..
            } => {
                write!(
                    f,
                    "Price updated: {} = ${:.2} ({})",
                    market_hash_name, new_price, source
                )
            }
            PriceEvent::PriceFetchFailed {
                market_hash_name,
                error_message,
                ..
            } => {
                write!(
                    f,
                    "Price fetch failed for {}: {}",
                    market_hash_name, error_message
                )
            }
        }
    }
}

/// Overall system health status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// System is healthy and all components are operational
    Healthy,
    /// System is degraded but still functional
    Degraded,
    /// System is unhealthy and requires attention
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_failure_serializes_as_error_body() {
        let lookup = PriceLookup::from(PriceFailure::new("Price unavailable"));
        let json = serde_json::to_value(&lookup).unwrap();

        assert_eq!(json["error"], "Price unavailable");
        assert_eq!(json["source"], "error");
        assert_eq!(lookup.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_quote_serializes_flat() {
        let lookup = PriceLookup::from(PriceQuote::live(dec!(12.34), 150, 7));
        let json = serde_json::to_value(&lookup).unwrap();

        assert_eq!(json["source"], "live");
        assert_eq!(json["volume"], 150);
        assert_eq!(json["listings"], 7);
        assert!(json.get("error").is_none());
        assert_eq!(lookup.http_status(), StatusCode::OK);
    }

    #[test]
    fn test_live_quote_clamps_negative_price() {
        let quote = PriceQuote::live(dec!(-1), 0, 0);
        assert_eq!(quote.price, Decimal::ZERO);
    }

    #[test]
    fn test_untagged_lookup_deserializes_both_shapes() {
        let quote: PriceLookup = serde_json::from_str(
            r#"{"price":"1.50","volume":3,"listings":0,"source":"cache","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(quote.source(), QuoteSource::Cache);

        let failure: PriceLookup = serde_json::from_str(
            r#"{"error":"boom","source":"error","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(failure.is_error());
    }
}
