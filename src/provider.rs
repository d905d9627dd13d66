//! Upstream seams for fetching market data

use crate::error::ProviderError;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Parsed price overview for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceOverview {
    /// Lowest listed price
    pub price: Decimal,
    /// Units traded over the last 24h
    pub volume: u64,
}

/// Trait for the primary price source
///
/// One call is one network attempt; retries belong to
/// [`SourceClient`](crate::client::SourceClient).
#[async_trait]
pub trait MarketQuoteApi: Send + Sync {
    /// Fetches the current price overview for a single item
    ///
    /// # Arguments
    /// * `market_hash_name` - The item identifier
    ///
    /// # Returns
    /// The parsed overview, or `RateLimitExceeded` when throttled and any other
    /// `ProviderError` for failures worth retrying
    async fn price_overview(&self, market_hash_name: &str) -> Result<PriceOverview, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// Best-effort secondary lookup of the active listings count
///
/// Callers go through [`count_or_default`](Self::count_or_default), so a broken
/// implementation can only ever cost the listings figure, never the quote.
#[async_trait]
pub trait ListingsLookup: Send + Sync {
    /// Fetches the number of active sell listings
    async fn lookup(&self, market_hash_name: &str) -> Result<u64, ProviderError>;

    /// Listings count, or 0 if the lookup fails for any reason
    async fn count_or_default(&self, market_hash_name: &str) -> u64 {
        match self.lookup(market_hash_name).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(
                    item = market_hash_name,
                    error = %e,
                    "Listings lookup failed, defaulting to 0"
                );
                0
            }
        }
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Mock price source for testing
    ///
    /// Scripted responses are consumed first, in order; after that each item
    /// answers with its configured price or an `ApiError`.
    #[derive(Default)]
    pub struct MockMarketApi {
        prices: Mutex<HashMap<String, PriceOverview>>,
        scripted: Mutex<VecDeque<Result<PriceOverview, ProviderError>>>,
        attempts: Mutex<Vec<(String, Instant)>>,
        panic_on: Mutex<Option<String>>,
    }

    impl MockMarketApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_price(&self, market_hash_name: &str, price: Decimal, volume: u64) {
            self.prices
                .lock()
                .unwrap()
                .insert(market_hash_name.to_string(), PriceOverview { price, volume });
        }

        pub fn push_response(&self, response: Result<PriceOverview, ProviderError>) {
            self.scripted.lock().unwrap().push_back(response);
        }

        pub fn panic_on(&self, market_hash_name: &str) {
            *self.panic_on.lock().unwrap() = Some(market_hash_name.to_string());
        }

        pub fn call_count(&self) -> usize {
            self.attempts.lock().unwrap().len()
        }

        pub fn calls_for(&self, market_hash_name: &str) -> usize {
            self.attempts
                .lock()
                .unwrap()
                .iter()
                .filter(|(item, _)| item == market_hash_name)
                .count()
        }

        /// Instants at which each attempt was made
        pub fn attempt_times(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().iter().map(|(_, at)| *at).collect()
        }
    }

    #[async_trait]
    impl MarketQuoteApi for MockMarketApi {
        async fn price_overview(
            &self,
            market_hash_name: &str,
        ) -> Result<PriceOverview, ProviderError> {
            self.attempts
                .lock()
                .unwrap()
                .push((market_hash_name.to_string(), Instant::now()));

            let should_panic = self.panic_on.lock().unwrap().as_deref() == Some(market_hash_name);
            if should_panic {
                panic!("mock market exploded for {}", market_hash_name);
            }

            if let Some(response) = self.scripted.lock().unwrap().pop_front() {
                return response;
            }

            self.prices
                .lock()
                .unwrap()
                .get(market_hash_name)
                .cloned()
                .ok_or_else(|| ProviderError::ApiError(format!("no price for {}", market_hash_name)))
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    /// Mock listings lookup for testing
    pub struct MockListings {
        count: Option<u64>,
        calls: Mutex<usize>,
    }

    impl MockListings {
        pub fn returning(count: u64) -> Self {
            Self {
                count: Some(count),
                calls: Mutex::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                count: None,
                calls: Mutex::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ListingsLookup for MockListings {
        async fn lookup(&self, _market_hash_name: &str) -> Result<u64, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            self.count
                .ok_or_else(|| ProviderError::InvalidResponse("listings page changed".to_string()))
        }
    }
}
