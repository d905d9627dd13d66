//! # Item Price Tracker
//!
//! Keeps Steam Community Market prices for a catalog of CS2 items current.
//!
//! Every lookup goes through one pipeline: the TTL cache first, then the
//! market (with retry and backoff), then the last known good price. Callers
//! always get an answer tagged with where it came from, never an error.
//!
//! ## Usage
//!
//! ```no_run
//! use item_price_tracker::{catalog::{default_catalog, InMemoryCatalog}, PriceTracker, TrackerConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Arc::new(InMemoryCatalog::new(default_catalog()));
//! let tracker = PriceTracker::new(TrackerConfig::from_env()?, catalog)?;
//!
//! // Refresh the whole catalog in the background
//! tracker.start().await;
//!
//! // Or ask for one item on demand
//! let lookup = tracker.get_price("M4A4 | Howl (Factory New)").await;
//! match lookup.quote() {
//!     Some(quote) => println!("${} ({})", quote.price, quote.source),
//!     None => println!("no price available"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod scheduler;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheBackend, InMemoryCache, PriceCache};
pub use catalog::{CatalogRepository, InMemoryCatalog};
pub use client::SourceClient;
pub use config::{MarketConfig, TrackerConfig};
pub use error::{CacheError, ConfigError, PersistenceError, ProviderError};
pub use metrics::FetchMetrics;
pub use pipeline::PriceFetchPipeline;
pub use retry::RetryPolicy;
pub use scheduler::{CycleReport, RefreshScheduler, SchedulerHandle};
pub use tracker::PriceTracker;
pub use types::{
    CatalogItem, ComponentHealth, HealthStatus, PriceEvent, PriceFailure, PriceLookup,
    PriceQuote, QuoteSource,
};
