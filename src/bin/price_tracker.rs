use item_price_tracker::{
    catalog::{default_catalog, InMemoryCatalog},
    logging::init_logging,
    PriceTracker, TrackerConfig,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = TrackerConfig::from_env()?;
    tracing::info!(
        base_url = %config.market.base_url,
        refresh_interval_secs = config.refresh_interval.as_secs(),
        cache_ttl_secs = config.cache_ttl.as_secs(),
        "Starting item price tracker"
    );

    let catalog = Arc::new(InMemoryCatalog::new(default_catalog()));
    let tracker = PriceTracker::new(config, catalog)?;

    let mut events = tracker.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!(event_id = %event.id(), "{}", event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log fell behind")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tracker.start().await;
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutdown signal received");
    tracker.stop().await;

    let metrics = tracker.get_metrics();
    tracing::info!(
        total_requests = metrics.total_requests,
        success_rate = metrics.success_rate,
        cache_hits = metrics.cache_hits,
        stale_served = metrics.stale_served,
        "Item price tracker stopped"
    );
    Ok(())
}
