//! Cache-aside price lookup for a single item

use crate::{
    cache::PriceCache,
    client::SourceClient,
    metrics::MetricsCollector,
    types::{PriceFailure, PriceLookup},
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Error text of a lookup that found neither a live nor a stale price
pub const PRICE_UNAVAILABLE: &str = "Price unavailable";

/// Orchestrates cache → market → cache write → stale fallback
///
/// Shared by the refresh scheduler and on-demand lookups; safe to call
/// concurrently for the same item.
pub struct PriceFetchPipeline {
    cache: Arc<PriceCache>,
    client: Arc<SourceClient>,
    metrics: Arc<MetricsCollector>,
}

impl PriceFetchPipeline {
    pub fn new(
        cache: Arc<PriceCache>,
        client: Arc<SourceClient>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            cache,
            client,
            metrics,
        }
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }

    pub fn client(&self) -> &Arc<SourceClient> {
        &self.client
    }

    /// Looks up the price of one item
    ///
    /// Never fails: every outcome, including a panic somewhere below, comes
    /// back as a tagged [`PriceLookup`].
    pub async fn fetch_price(&self, market_hash_name: &str) -> PriceLookup {
        let lookup = match AssertUnwindSafe(self.lookup(market_hash_name))
            .catch_unwind()
            .await
        {
            Ok(lookup) => lookup,
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(
                    item = market_hash_name,
                    error = %message,
                    "Error fetching price"
                );
                PriceFailure::new(message).into()
            }
        };

        self.metrics.record_outcome(lookup.source());
        lookup
    }

    async fn lookup(&self, market_hash_name: &str) -> PriceLookup {
        if let Some(cached) = self.cache.get(market_hash_name).await {
            tracing::debug!(item = market_hash_name, "Price served from cache");
            return cached.into();
        }

        if let Some(quote) = self.client.fetch_quote(market_hash_name).await {
            if !self.cache.set(market_hash_name, &quote).await {
                tracing::warn!(item = market_hash_name, "Live price not cached");
            }
            return quote.into();
        }

        match self.cache.get_stale(market_hash_name).await {
            Some(stale) => {
                tracing::warn!(
                    item = market_hash_name,
                    age_secs = stale.age().as_secs(),
                    "Market unavailable, serving stale price"
                );
                stale.into()
            }
            None => PriceFailure::new(PRICE_UNAVAILABLE).into(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected failure".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mock::FailingBackend;
    use crate::error::ProviderError;
    use crate::provider::mock::{MockListings, MockMarketApi};
    use crate::retry::RetryPolicy;
    use crate::types::{PriceQuote, QuoteSource};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const ITEM: &str = "M4A4 | Howl (Factory New)";

    struct Harness {
        api: Arc<MockMarketApi>,
        listings: Arc<MockListings>,
        metrics: Arc<MetricsCollector>,
        pipeline: PriceFetchPipeline,
    }

    fn harness_with_cache(cache: PriceCache) -> Harness {
        let api = Arc::new(MockMarketApi::new());
        let listings = Arc::new(MockListings::returning(12));
        let metrics = Arc::new(MetricsCollector::new("mock"));
        let client = SourceClient::new(
            api.clone(),
            listings.clone(),
            RetryPolicy::default(),
            metrics.clone(),
        );
        let pipeline =
            PriceFetchPipeline::new(Arc::new(cache), Arc::new(client), metrics.clone());

        Harness {
            api,
            listings,
            metrics,
            pipeline,
        }
    }

    fn harness() -> Harness {
        harness_with_cache(PriceCache::in_memory(Duration::from_secs(300)))
    }

    #[tokio::test]
    async fn test_cache_hit_skips_market() {
        let h = harness();
        h.pipeline
            .cache()
            .set(ITEM, &PriceQuote::live(dec!(2000), 1, 3))
            .await;

        let lookup = h.pipeline.fetch_price(ITEM).await;

        assert_eq!(lookup.source(), QuoteSource::Cache);
        assert_eq!(lookup.quote().unwrap().price, dec!(2000));
        assert_eq!(h.api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_miss_fills_cache() {
        let h = harness();
        h.api.set_price(ITEM, dec!(1500.50), 4);

        let first = h.pipeline.fetch_price(ITEM).await;
        assert_eq!(first.source(), QuoteSource::Live);
        assert_eq!(first.quote().unwrap().listings, 12);

        let cached = h.pipeline.cache().get(ITEM).await.expect("filled");
        assert_eq!(cached.source, QuoteSource::Cache);
        assert_eq!(cached.price, dec!(1500.50));

        let second = h.pipeline.fetch_price(ITEM).await;
        assert_eq!(second.source(), QuoteSource::Cache);
        assert_eq!(h.api.call_count(), 1);
        assert_eq!(h.listings.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_without_cache_is_error_result() {
        let h = harness();

        let lookup = h.pipeline.fetch_price(ITEM).await;

        match lookup {
            PriceLookup::Failed(failure) => {
                assert_eq!(failure.error, PRICE_UNAVAILABLE);
                assert_eq!(failure.source, QuoteSource::Error);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(h.api.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fallback_after_hot_expiry() {
        let h = harness_with_cache(PriceCache::in_memory(Duration::from_secs(60)));
        h.api.push_response(Ok(crate::provider::PriceOverview {
            price: dec!(7.77),
            volume: 5,
        }));
        assert_eq!(h.pipeline.fetch_price(ITEM).await.source(), QuoteSource::Live);

        tokio::time::advance(Duration::from_secs(120)).await;
        for _ in 0..3 {
            h.api.push_response(Err(ProviderError::Timeout));
        }

        let lookup = h.pipeline.fetch_price(ITEM).await;

        assert_eq!(lookup.source(), QuoteSource::StaleCache);
        assert_eq!(lookup.quote().unwrap().price, dec!(7.77));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let h = harness();
        h.api.panic_on(ITEM);

        let lookup = h.pipeline.fetch_price(ITEM).await;

        match lookup {
            PriceLookup::Failed(failure) => assert!(failure.error.contains("exploded")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broken_cache_still_serves_live() {
        let h = harness_with_cache(PriceCache::new(
            Arc::new(FailingBackend),
            Duration::from_secs(60),
        ));
        h.api.set_price(ITEM, dec!(9.99), 2);

        let first = h.pipeline.fetch_price(ITEM).await;
        let second = h.pipeline.fetch_price(ITEM).await;

        assert_eq!(first.source(), QuoteSource::Live);
        assert_eq!(second.source(), QuoteSource::Live);
        assert_eq!(h.api.call_count(), 2);
    }

    #[tokio::test]
    async fn test_outcomes_are_counted() {
        let h = harness();
        h.api.set_price(ITEM, dec!(1), 1);

        h.pipeline.fetch_price(ITEM).await;
        h.pipeline.fetch_price(ITEM).await;

        let metrics = h.metrics.get_metrics();
        assert_eq!(metrics.live_fetches, 1);
        assert_eq!(metrics.cache_hits, 1);
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&"owned".to_string()), "owned");
        assert_eq!(panic_message(&42u8), "unexpected failure");
    }
}
