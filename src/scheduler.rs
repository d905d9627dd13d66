//! Periodic catalog refresh
//!
//! Each cycle lists the catalog, prices every item through the pipeline with
//! bounded concurrency, commits each item's result on its own and then sleeps.
//! A failing item only costs that item; a failing catalog listing only costs
//! the cycle. Only live and cached prices are committed; a last-known price
//! served during an outage leaves the catalog untouched.

use crate::{
    catalog::CatalogRepository,
    constants::EVENT_CHANNEL_CAPACITY,
    error::PersistenceError,
    pipeline::PriceFetchPipeline,
    types::{CatalogItem, PriceEvent, PriceLookup, PriceUpdate, QuoteSource},
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Summary of one refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Items listed by the catalog
    pub items: usize,
    /// Items priced and committed
    pub updated: usize,
    /// Items for which no price could be obtained
    pub unavailable: usize,
    /// Items priced but not committed
    pub persist_failed: usize,
}

enum ItemOutcome {
    Updated,
    Unavailable,
    PersistFailed,
}

/// Keeps catalog prices current
pub struct RefreshScheduler {
    pipeline: Arc<PriceFetchPipeline>,
    catalog: Arc<dyn CatalogRepository>,
    interval: Duration,
    max_concurrency: usize,
    events: broadcast::Sender<PriceEvent>,
}

impl RefreshScheduler {
    pub fn new(
        pipeline: Arc<PriceFetchPipeline>,
        catalog: Arc<dyn CatalogRepository>,
        interval: Duration,
        max_concurrency: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pipeline,
            catalog,
            interval,
            max_concurrency: max_concurrency.max(1),
            events,
        }
    }

    /// Publishes events on an existing channel instead of a private one
    pub fn with_events(mut self, events: broadcast::Sender<PriceEvent>) -> Self {
        self.events = events;
        self
    }

    /// Subscribes to price events
    pub fn subscribe(&self) -> broadcast::Receiver<PriceEvent> {
        self.events.subscribe()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one pass over the catalog
    ///
    /// # Returns
    /// A per-cycle summary, or the error that prevented listing the catalog
    pub async fn run_cycle(&self) -> Result<CycleReport, PersistenceError> {
        let items = self.catalog.list_items().await?;
        let mut report = CycleReport {
            items: items.len(),
            ..CycleReport::default()
        };

        let outcomes: Vec<ItemOutcome> = stream::iter(items)
            .map(|item| async move { self.refresh_item(&item).await })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                ItemOutcome::Updated => report.updated += 1,
                ItemOutcome::Unavailable => report.unavailable += 1,
                ItemOutcome::PersistFailed => report.persist_failed += 1,
            }
        }
        Ok(report)
    }

    async fn refresh_item(&self, item: &CatalogItem) -> ItemOutcome {
        let quote = match self.pipeline.fetch_price(&item.market_hash_name).await {
            // A last-known price is not a new observation
            PriceLookup::Quote(quote) if quote.source == QuoteSource::StaleCache => {
                tracing::warn!(
                    item = %item.market_hash_name,
                    age_secs = quote.age().as_secs(),
                    "Market unavailable, keeping last committed price"
                );
                self.publish_failure(
                    item,
                    format!(
                        "Market unavailable, last known price is {}s old",
                        quote.age().as_secs()
                    ),
                );
                return ItemOutcome::Unavailable;
            }
            PriceLookup::Quote(quote) => quote,
            PriceLookup::Failed(failure) => {
                tracing::warn!(
                    item = %item.market_hash_name,
                    error = %failure.error,
                    "No price this cycle"
                );
                self.publish_failure(item, failure.error);
                return ItemOutcome::Unavailable;
            }
        };

        let update = PriceUpdate::from_quote(item.id, &quote);
        match self.catalog.record_price(&update).await {
            Ok(()) => {
                self.publish(PriceEvent::PriceUpdated {
                    id: Uuid::new_v4(),
                    market_hash_name: item.market_hash_name.clone(),
                    old_price: item.current_price,
                    new_price: quote.price,
                    source: quote.source,
                    timestamp: update.updated_at,
                });
                ItemOutcome::Updated
            }
            Err(e) => {
                tracing::error!(
                    item = %item.market_hash_name,
                    item_id = item.id,
                    error = %e,
                    "Failed to persist price"
                );
                self.publish_failure(item, e.to_string());
                ItemOutcome::PersistFailed
            }
        }
    }

    fn publish_failure(&self, item: &CatalogItem, error_message: String) {
        self.publish(PriceEvent::PriceFetchFailed {
            id: Uuid::new_v4(),
            market_hash_name: item.market_hash_name.clone(),
            error_message,
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: PriceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Runs cycles until `shutdown` is cancelled
    ///
    /// Cancellation interrupts both an in-flight cycle and the interval sleep.
    /// Items already committed in an interrupted cycle stay committed.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            refresh_interval_secs = self.interval.as_secs(),
            max_concurrency = self.max_concurrency,
            "Starting price refresh loop"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.run_cycle() => match result {
                    Ok(report) => tracing::info!(
                        items = report.items,
                        updated = report.updated,
                        unavailable = report.unavailable,
                        persist_failed = report.persist_failed,
                        "Refresh cycle complete"
                    ),
                    Err(e) => tracing::error!(
                        error = %e,
                        "Failed to load catalog, retrying next cycle"
                    ),
                },
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        tracing::info!("Price refresh loop stopped");
    }

    /// Spawns the refresh loop as a background task
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let token = CancellationToken::new();
        let child = token.child_token();
        let task = tokio::spawn(async move { self.run(child).await });
        SchedulerHandle { token, task }
    }
}

/// Control handle of a running refresh loop
pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// True once the loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Requests a graceful stop and waits for the loop to exit
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Price refresh task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PriceCache;
    use crate::catalog::mock::FlakyCatalog;
    use crate::catalog::InMemoryCatalog;
    use crate::client::SourceClient;
    use crate::metrics::MetricsCollector;
    use crate::provider::mock::{MockListings, MockMarketApi};
    use crate::retry::RetryPolicy;
    use crate::types::ItemType;
    use rust_decimal_macros::dec;

    fn items() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new(1, "One", "Item One", ItemType::Weapon),
            CatalogItem::new(2, "Two", "Item Two", ItemType::Knife),
            CatalogItem::new(3, "Three", "Item Three", ItemType::Glove),
        ]
    }

    fn pipeline(api: Arc<MockMarketApi>) -> Arc<PriceFetchPipeline> {
        let metrics = Arc::new(MetricsCollector::new("mock"));
        let client = SourceClient::new(
            api,
            Arc::new(MockListings::returning(50)),
            RetryPolicy::default(),
            metrics.clone(),
        );
        Arc::new(PriceFetchPipeline::new(
            Arc::new(PriceCache::in_memory(Duration::from_secs(1))),
            Arc::new(client),
            metrics,
        ))
    }

    fn api_pricing_all_but_two() -> Arc<MockMarketApi> {
        let api = Arc::new(MockMarketApi::new());
        api.set_price("Item One", dec!(10.00), 100);
        api.set_price("Item Three", dec!(30.00), 300);
        api
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_item_does_not_block_others() {
        let catalog = Arc::new(InMemoryCatalog::new(items()));
        let scheduler = RefreshScheduler::new(
            pipeline(api_pricing_all_but_two()),
            catalog.clone(),
            Duration::from_secs(300),
            1,
        );

        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(
            report,
            CycleReport {
                items: 3,
                updated: 2,
                unavailable: 1,
                persist_failed: 0,
            }
        );

        let one = catalog.get_item(1).await.unwrap();
        assert_eq!(one.current_price, dec!(10.00));
        assert_eq!(one.volume_24h, 100);
        assert!(one.last_updated.is_some());

        let three_history = catalog.price_history(3).await.unwrap();
        assert_eq!(three_history.len(), 1);
        assert_eq!(three_history[0].price, dec!(30.00));
        assert_eq!(three_history[0].listings, 50);

        let two = catalog.get_item(2).await.unwrap();
        assert!(two.last_updated.is_none());
        assert!(catalog.price_history(2).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_failure_is_isolated() {
        let api = Arc::new(MockMarketApi::new());
        for (name, price) in [("Item One", dec!(1)), ("Item Two", dec!(2)), ("Item Three", dec!(3))] {
            api.set_price(name, price, 1);
        }
        let catalog = Arc::new(FlakyCatalog::new(items()));
        catalog.fail_commit_for(2);
        let scheduler =
            RefreshScheduler::new(pipeline(api), catalog.clone(), Duration::from_secs(300), 3);

        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.updated, 2);
        assert_eq!(report.persist_failed, 1);
        assert_eq!(catalog.inner.price_history(1).await.unwrap().len(), 1);
        assert_eq!(catalog.inner.price_history(3).await.unwrap().len(), 1);
        assert!(catalog.inner.price_history(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_fails_cycle() {
        let catalog = Arc::new(FlakyCatalog::new(items()));
        catalog.fail_listing(true);
        let scheduler = RefreshScheduler::new(
            pipeline(Arc::new(MockMarketApi::new())),
            catalog,
            Duration::from_secs(300),
            2,
        );

        assert!(scheduler.run_cycle().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_published_per_item() {
        let catalog = Arc::new(InMemoryCatalog::new(items()));
        let scheduler = RefreshScheduler::new(
            pipeline(api_pricing_all_but_two()),
            catalog,
            Duration::from_secs(300),
            3,
        );
        let mut events = scheduler.subscribe();

        scheduler.run_cycle().await.unwrap();

        let mut updated = 0;
        let mut failed = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                PriceEvent::PriceUpdated { source, .. } => {
                    assert_eq!(source, QuoteSource::Live);
                    updated += 1;
                }
                PriceEvent::PriceFetchFailed { market_hash_name, .. } => {
                    assert_eq!(market_hash_name, "Item Two");
                    failed += 1;
                }
            }
        }
        assert_eq!((updated, failed), (2, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_price_is_not_committed() {
        let api = Arc::new(MockMarketApi::new());
        api.push_response(Ok(crate::provider::PriceOverview {
            price: dec!(12.50),
            volume: 8,
        }));
        let catalog = Arc::new(InMemoryCatalog::new(items().into_iter().take(1)));
        let scheduler =
            RefreshScheduler::new(pipeline(api), catalog.clone(), Duration::from_secs(300), 1);

        assert_eq!(scheduler.run_cycle().await.unwrap().updated, 1);
        let committed = catalog.get_item(1).await.unwrap().last_updated;

        // Hot entry gone, market down: only the last-good tier answers
        tokio::time::advance(Duration::from_secs(5)).await;
        let mut events = scheduler.subscribe();
        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(
            report,
            CycleReport {
                items: 1,
                updated: 0,
                unavailable: 1,
                persist_failed: 0,
            }
        );
        assert_eq!(catalog.price_history(1).await.unwrap().len(), 1);
        let item = catalog.get_item(1).await.unwrap();
        assert_eq!(item.current_price, dec!(12.50));
        assert_eq!(item.last_updated, committed);
        assert_eq!(events.try_recv().unwrap().event_type(), "PRICE_FETCH_FAILED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_catalog_outage() {
        let api = Arc::new(MockMarketApi::new());
        api.set_price("Item One", dec!(5), 1);
        let catalog = Arc::new(FlakyCatalog::new(items().into_iter().take(1)));
        catalog.fail_listing(true);

        let scheduler = Arc::new(RefreshScheduler::new(
            pipeline(api),
            catalog.clone(),
            Duration::from_secs(10),
            1,
        ));
        let handle = scheduler.spawn();

        sleep(Duration::from_secs(5)).await;
        assert!(catalog.inner.price_history(1).await.unwrap().is_empty());

        catalog.fail_listing(false);
        sleep(Duration::from_secs(10)).await;

        assert_eq!(catalog.inner.price_history(1).await.unwrap().len(), 1);
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_interval_sleep() {
        let catalog = Arc::new(InMemoryCatalog::new(Vec::new()));
        let scheduler = Arc::new(RefreshScheduler::new(
            pipeline(Arc::new(MockMarketApi::new())),
            catalog,
            Duration::from_secs(3600),
            1,
        ));
        let handle = scheduler.spawn();
        sleep(Duration::from_secs(1)).await;

        let started = tokio::time::Instant::now();
        handle.shutdown().await;

        assert!(started.elapsed() < Duration::from_secs(3600));
    }
}
