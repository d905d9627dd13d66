//! Constants for the item price tracker
//!
//! These are the defaults behind [`TrackerConfig`](crate::config::TrackerConfig).
//! Every value here can be overridden from the environment at startup.

/// How often the refresh scheduler walks the catalog (in seconds)
pub const REFRESH_INTERVAL_SECS: u64 = 300;

/// How long a live quote stays in the hot cache (in seconds)
pub const CACHE_TTL_SECS: u64 = 300;

/// HTTP request timeout when talking to the market (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum number of attempts per quote fetch
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay after a failed attempt, multiplied by the attempt number (in milliseconds)
pub const RETRY_DELAY_MS: u64 = 1_000;

/// Base delay after a rate-limited attempt, multiplied by the attempt number (in milliseconds)
pub const RATE_LIMIT_DELAY_MS: u64 = 5_000;

/// Number of catalog items refreshed concurrently
pub const REFRESH_MAX_CONCURRENCY: usize = 4;

/// Steam Community base URL
pub const STEAM_COMMUNITY_URL: &str = "https://steamcommunity.com";

/// Path segments of the price overview endpoint; the empty last one keeps the trailing `/`
pub const PRICE_OVERVIEW_PATH: [&str; 3] = ["market", "priceoverview", ""];

/// Path segments of the listings page, followed by `{appid}/{market_hash_name}`
pub const LISTINGS_PATH: [&str; 2] = ["market", "listings"];

/// Counter-Strike 2 application id
pub const CS2_APP_ID: u32 = 730;

/// Steam currency code (1 = USD)
pub const DEFAULT_CURRENCY: u32 = 1;

/// Prefix of hot cache keys: `price:{market_hash_name}`
pub const CACHE_KEY_PREFIX: &str = "price:";

/// Prefix of last-known-good keys: `price:last:{market_hash_name}`
pub const LAST_GOOD_KEY_PREFIX: &str = "price:last:";

/// Capacity of the price event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "item-price-tracker/0.1.0";
