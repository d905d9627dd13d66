//! Fetch metrics collection and reporting
//!
//! Tracks upstream latency percentiles and success rate, plus how pipeline
//! lookups were served (cache, live, stale, failed).

use crate::types::QuoteSource;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Point-in-time view of the collected metrics
#[derive(Debug, Clone, PartialEq)]
pub struct FetchMetrics {
    /// Name of the upstream provider
    pub provider_name: String,
    /// 50th percentile latency of successful requests in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful requests in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate of upstream requests (0.0 to 1.0)
    pub success_rate: f64,
    /// Upstream requests made (lifetime)
    pub total_requests: u64,
    /// Upstream requests that failed (lifetime)
    pub failed_requests: u64,
    /// Lookups answered from the hot cache
    pub cache_hits: u64,
    /// Lookups answered with a live fetch
    pub live_fetches: u64,
    /// Lookups answered from the last-known-good tier
    pub stale_served: u64,
    /// Lookups that produced no price
    pub failed_lookups: u64,
}

/// Internal sample for latency tracking
#[derive(Debug, Clone, Copy)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

/// Collects and computes fetch metrics
pub struct MetricsCollector {
    provider_name: String,
    /// Rolling window of latency samples
    samples: Mutex<VecDeque<LatencySample>>,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    cache_hits: AtomicU64,
    live_fetches: AtomicU64,
    stale_served: AtomicU64,
    failed_lookups: AtomicU64,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a provider
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            samples: Mutex::new(VecDeque::with_capacity(MAX_SAMPLES)),
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            live_fetches: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
            failed_lookups: AtomicU64::new(0),
        }
    }

    /// Records one upstream request with its duration and success status
    pub fn record_request(&self, duration: Duration, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    /// Records how a pipeline lookup was served
    pub fn record_outcome(&self, source: QuoteSource) {
        let counter = match source {
            QuoteSource::Cache => &self.cache_hits,
            QuoteSource::Live => &self.live_fetches,
            QuoteSource::StaleCache => &self.stale_served,
            QuoteSource::Error => &self.failed_lookups,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Computes current metrics from collected samples
    pub fn get_metrics(&self) -> FetchMetrics {
        let total = self.total_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);

        // Extract successful latencies for percentile calculation
        let mut latencies: Vec<f64> = {
            let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
            samples
                .iter()
                .filter(|s| s.success)
                .map(|s| s.duration_ms)
                .collect()
        };
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success_rate = if total > 0 {
            (total - failed) as f64 / total as f64
        } else {
            1.0
        };

        FetchMetrics {
            provider_name: self.provider_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_requests: total,
            failed_requests: failed,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            live_fetches: self.live_fetches.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            failed_lookups: self.failed_lookups.load(Ordering::Relaxed),
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
