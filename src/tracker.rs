//! Item price tracker service
//!
//! Wires the cache, market client, pipeline and refresh scheduler together from
//! one [`TrackerConfig`], and exposes the operations a hosting API needs.

use crate::{
    cache::{CacheBackend, InMemoryCache, PriceCache},
    catalog::CatalogRepository,
    client::SourceClient,
    config::TrackerConfig,
    constants::EVENT_CHANNEL_CAPACITY,
    error::{PersistenceError, ProviderError},
    metrics::{FetchMetrics, MetricsCollector},
    pipeline::PriceFetchPipeline,
    provider::{ListingsLookup, MarketQuoteApi},
    providers::{build_http_client, SteamListingsPage, SteamMarketApi},
    scheduler::{CycleReport, RefreshScheduler, SchedulerHandle},
    types::{ComponentHealth, HealthStatus, PriceEvent, PriceLookup},
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Item price tracker
///
/// # Example
/// ```no_run
/// use item_price_tracker::{catalog::InMemoryCatalog, PriceTracker, TrackerConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let catalog = Arc::new(InMemoryCatalog::new(item_price_tracker::catalog::default_catalog()));
/// let tracker = PriceTracker::new(TrackerConfig::from_env()?, catalog)?;
/// tracker.start().await;
///
/// let lookup = tracker.get_price("AK-47 | Asiimov (Factory New)").await;
/// println!("{} ({})", serde_json::to_string(&lookup)?, lookup.source());
///
/// tracker.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct PriceTracker {
    config: TrackerConfig,
    pipeline: Arc<PriceFetchPipeline>,
    catalog: Arc<dyn CatalogRepository>,
    refresher: Arc<RefreshScheduler>,
    metrics: Arc<MetricsCollector>,
    events: broadcast::Sender<PriceEvent>,
    running: Mutex<Option<SchedulerHandle>>,
}

impl PriceTracker {
    /// Creates a tracker talking to the Steam market with an in-process cache
    pub fn new(
        config: TrackerConfig,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Result<Self, ProviderError> {
        let client = build_http_client(&config.market)?;
        let api = Arc::new(SteamMarketApi::new(client.clone(), &config.market)?);
        let listings = Arc::new(SteamListingsPage::new(client, &config.market)?);

        Ok(Self::with_components(
            config,
            api,
            listings,
            Arc::new(InMemoryCache::new()),
            catalog,
        ))
    }

    /// Creates a tracker from explicit components
    ///
    /// This is primarily for testing and for plugging in other cache backends.
    pub fn with_components(
        config: TrackerConfig,
        api: Arc<dyn MarketQuoteApi>,
        listings: Arc<dyn ListingsLookup>,
        cache_backend: Arc<dyn CacheBackend>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        let metrics = Arc::new(MetricsCollector::new(api.provider_name()));
        let cache = Arc::new(PriceCache::new(cache_backend, config.cache_ttl));
        let client = Arc::new(SourceClient::new(
            api,
            listings,
            config.retry,
            metrics.clone(),
        ));
        let pipeline = Arc::new(PriceFetchPipeline::new(cache, client, metrics.clone()));

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let refresher = Arc::new(
            RefreshScheduler::new(
                pipeline.clone(),
                catalog.clone(),
                config.refresh_interval,
                config.max_concurrency,
            )
            .with_events(events.clone()),
        );

        Self {
            config,
            pipeline,
            catalog,
            refresher,
            metrics,
            events,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Looks up one item's price on demand
    ///
    /// Backs `GET /items/{market_hash_name}/price`; see
    /// [`PriceLookup::http_status`].
    pub async fn get_price(&self, market_hash_name: &str) -> PriceLookup {
        tracing::info!(item = market_hash_name, "Fetching price");
        self.pipeline.fetch_price(market_hash_name).await
    }

    /// Starts the background refresh loop
    ///
    /// # Returns
    /// `false` if the loop was already running
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        *running = Some(self.refresher.clone().spawn());
        true
    }

    /// Stops the background refresh loop and waits for it to exit
    pub async fn stop(&self) {
        let handle = self.running.lock().await.take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Forces an immediate refresh cycle
    ///
    /// This bypasses the normal interval and prices the whole catalog now.
    pub async fn refresh_now(&self) -> Result<CycleReport, PersistenceError> {
        self.refresher.run_cycle().await
    }

    /// Subscribes to price events from the refresh loop
    pub fn subscribe(&self) -> broadcast::Receiver<PriceEvent> {
        self.events.subscribe()
    }

    /// Returns the name of the market provider
    pub fn provider_name(&self) -> &'static str {
        self.pipeline.client().provider_name()
    }

    /// Gets fetch metrics including latency percentiles and lookup outcomes
    pub fn get_metrics(&self) -> FetchMetrics {
        self.metrics.get_metrics()
    }

    /// Perform a health check on the tracker
    ///
    /// # Returns
    /// ComponentHealth indicating the status of the tracker and its components
    pub async fn health_check(&self) -> ComponentHealth {
        let mut details = HashMap::new();
        let metrics = self.get_metrics();
        let running = self.is_running().await;

        details.insert("provider_name".to_string(), serde_json::json!(self.provider_name()));
        details.insert(
            "cache_backend".to_string(),
            serde_json::json!(self.pipeline.cache().backend_name()),
        );
        details.insert("refresh_running".to_string(), serde_json::json!(running));
        details.insert(
            "upstream_success_rate".to_string(),
            serde_json::json!(metrics.success_rate),
        );

        let items = match self.catalog.list_items().await {
            Ok(items) => items,
            Err(e) => {
                return ComponentHealth {
                    name: "item_price_tracker".to_string(),
                    status: HealthStatus::Unhealthy,
                    message: Some(format!("Catalog unavailable: {}", e)),
                    details,
                    last_checked: Utc::now(),
                };
            }
        };

        // An item is stale once it missed two refresh cycles
        let now = Utc::now();
        let threshold = self.config.refresh_interval.saturating_mul(2);
        let mut priced = 0;
        let mut stale_items = Vec::new();
        for item in &items {
            match item.last_updated {
                Some(at) => {
                    priced += 1;
                    if (now - at).to_std().unwrap_or_default() > threshold {
                        stale_items.push(item.market_hash_name.clone());
                    }
                }
                None => stale_items.push(item.market_hash_name.clone()),
            }
        }
        details.insert("tracked_items".to_string(), serde_json::json!(items.len()));
        details.insert("priced_items".to_string(), serde_json::json!(priced));
        details.insert("stale_items".to_string(), serde_json::json!(stale_items));

        let status = if !items.is_empty() && priced == 0 {
            HealthStatus::Unhealthy
        } else if !stale_items.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "Item price tracker is operational with fresh data".to_string(),
            HealthStatus::Degraded => format!(
                "Item price tracker has {} stale items",
                stale_items.len()
            ),
            HealthStatus::Unhealthy => "Item price tracker has no priced items".to_string(),
        };

        ComponentHealth {
            name: "item_price_tracker".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: now,
        }
    }
}
