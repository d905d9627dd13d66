//! Resilient quote fetching from the market
//!
//! [`SourceClient`] turns one-shot upstream calls into a bounded, backed-off
//! retry sequence and assembles the final [`PriceQuote`].

use crate::{
    metrics::MetricsCollector,
    provider::{ListingsLookup, MarketQuoteApi},
    retry::{FailureKind, RetryPolicy, RetryState},
    types::PriceQuote,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;

/// Fetches live quotes with retry and backoff
pub struct SourceClient {
    api: Arc<dyn MarketQuoteApi>,
    listings: Arc<dyn ListingsLookup>,
    policy: RetryPolicy,
    metrics: Arc<MetricsCollector>,
}

impl SourceClient {
    pub fn new(
        api: Arc<dyn MarketQuoteApi>,
        listings: Arc<dyn ListingsLookup>,
        policy: RetryPolicy,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            api,
            listings,
            policy,
            metrics,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.api.provider_name()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a live quote for one item
    ///
    /// Attempts run strictly one after another and the first success wins.
    /// The listings count is looked up once, after the price succeeded.
    ///
    /// # Returns
    /// A quote tagged `live`, or `None` once every attempt has failed
    pub async fn fetch_quote(&self, market_hash_name: &str) -> Option<PriceQuote> {
        let mut state = RetryState::start();

        loop {
            match state {
                RetryState::Attempting(attempt) => {
                    let start = Instant::now();
                    match self.api.price_overview(market_hash_name).await {
                        Ok(overview) => {
                            self.metrics.record_request(start.elapsed(), true);
                            let listings = self.listings.count_or_default(market_hash_name).await;

                            tracing::debug!(
                                item = market_hash_name,
                                attempt,
                                price = %overview.price,
                                volume = overview.volume,
                                listings,
                                latency_ms = start.elapsed().as_millis() as u64,
                                "Fetched live price"
                            );
                            return Some(PriceQuote::live(
                                overview.price,
                                overview.volume,
                                listings,
                            ));
                        }
                        Err(e) => {
                            self.metrics.record_request(start.elapsed(), false);
                            let kind = e.failure_kind();
                            state = state.on_failure(&self.policy, kind);

                            let delay_ms = match state {
                                RetryState::Backoff { delay, .. } => delay.as_millis() as u64,
                                _ => 0,
                            };
                            match kind {
                                FailureKind::RateLimited => tracing::warn!(
                                    item = market_hash_name,
                                    attempt,
                                    max_attempts = self.policy.max_attempts,
                                    delay_ms,
                                    "Rate limited by market"
                                ),
                                FailureKind::Other => tracing::warn!(
                                    item = market_hash_name,
                                    attempt,
                                    max_attempts = self.policy.max_attempts,
                                    delay_ms,
                                    error = %e,
                                    "Failed to fetch price"
                                ),
                            }
                        }
                    }
                }
                RetryState::Backoff { delay, .. } => {
                    sleep(delay).await;
                    state = state.after_backoff();
                }
                RetryState::Exhausted => {
                    tracing::error!(
                        item = market_hash_name,
                        attempts = self.policy.max_attempts,
                        "Market unavailable, retries exhausted"
                    );
                    return None;
                }
            }
        }
    }
}
