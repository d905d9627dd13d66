use item_price_tracker::{
    catalog::{default_catalog, InMemoryCatalog},
    PriceTracker, QuoteSource, TrackerConfig,
};
use std::sync::Arc;
use std::time::Instant;

const ITEM: &str = "AK-47 | Asiimov (Factory New)";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Arc::new(InMemoryCatalog::new(default_catalog()));
    let tracker = PriceTracker::new(TrackerConfig::from_env()?, catalog)?;

    println!(
        "Benchmarking item price lookups (Item: {}, Provider: {})...",
        ITEM,
        tracker.provider_name()
    );
    println!("-------------------------------------------");

    // The first lookup misses the cache and goes to the market
    println!("1. Benchmarking live latency (fetching from the market)...");
    let start_live = Instant::now();
    let lookup = tracker.get_price(ITEM).await;
    let live_latency = start_live.elapsed();

    match lookup.quote() {
        Some(quote) if quote.source == QuoteSource::Live => {
            println!("   Price:    ${}", quote.price);
            println!("   Volume:   {}", quote.volume);
            println!("   Listings: {}", quote.listings);
            println!("   Live latency (network + parsing): {:?}", live_latency);
        }
        _ => {
            eprintln!(
                "   Error: could not fetch a live price ({})",
                serde_json::to_string(&lookup)?
            );
            return Ok(());
        }
    }
    println!();

    println!("2. Benchmarking cache latency...");
    let iterations: u32 = 10_000;
    let mut total_cache_latency = std::time::Duration::default();

    let start_bench = Instant::now();
    for _ in 0..iterations {
        let start = Instant::now();
        let lookup = tracker.get_price(ITEM).await;
        total_cache_latency += start.elapsed();
        if lookup.source() != QuoteSource::Cache {
            eprintln!("   Warning: lookup served from {}", lookup.source());
        }
    }
    let bench_total = start_bench.elapsed();

    let avg_cache_latency = total_cache_latency / iterations;
    println!("   Total iterations: {}", iterations);
    println!("   Average lookup latency (per call): {:?}", avg_cache_latency);
    println!(
        "   Average total time (including loop overhead): {:?}",
        bench_total / iterations
    );
    println!();

    println!("-------------------------------------------");
    println!("Performance Summary:");
    println!("- Live latency:  {:?}", live_latency);
    println!("- Cache latency: {:?}", avg_cache_latency);
    if avg_cache_latency.as_nanos() > 0 {
        let speedup = live_latency.as_secs_f64() / avg_cache_latency.as_secs_f64();
        println!("- Speedup: cached lookups are approx. {:.0}x faster.", speedup);
    }

    let metrics = tracker.get_metrics();
    println!(
        "- Lookups: {} cache hits, {} live fetches",
        metrics.cache_hits, metrics.live_fetches
    );

    Ok(())
}
