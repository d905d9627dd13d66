//! Runtime configuration
//!
//! `TrackerConfig` is built once at startup and handed to every component by
//! value. Nothing below this module reads the process environment.
//!
//! # Environment Variables
//! - `STEAM_API_KEY`: credential forwarded to the market as `key`
//! - `STEAM_MARKET_UPDATE_INTERVAL`: seconds between refresh cycles (default: 300)
//! - `PRICE_CACHE_TTL`: seconds a live quote stays in the hot cache (default: 300)
//! - `STEAM_MAX_RETRIES`: attempts per fetch (default: 3)
//! - `STEAM_REQUEST_TIMEOUT`: per-request timeout in seconds (default: 10)
//! - `REFRESH_MAX_CONCURRENCY`: items refreshed in parallel (default: 4)
//! - `STEAM_MARKET_BASE_URL`: market base URL (default: https://steamcommunity.com)
//! - `STEAM_CURRENCY`: Steam currency code (default: 1, USD)

use crate::{
    constants::{
        CACHE_TTL_SECS, CS2_APP_ID, DEFAULT_CURRENCY, REFRESH_INTERVAL_SECS,
        REFRESH_MAX_CONCURRENCY, REQUEST_TIMEOUT_SECS, STEAM_COMMUNITY_URL,
    },
    error::ConfigError,
    retry::RetryPolicy,
};
use std::str::FromStr;
use std::time::Duration;

/// Settings for talking to the Steam market
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub app_id: u32,
    pub currency: u32,
    pub request_timeout: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: STEAM_COMMUNITY_URL.to_string(),
            api_key: None,
            app_id: CS2_APP_ID,
            currency: DEFAULT_CURRENCY,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Complete tracker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub market: MarketConfig,
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
    pub refresh_interval: Duration,
    pub max_concurrency: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            retry: RetryPolicy::default(),
            cache_ttl: Duration::from_secs(CACHE_TTL_SECS),
            refresh_interval: Duration::from_secs(REFRESH_INTERVAL_SECS),
            max_concurrency: REFRESH_MAX_CONCURRENCY,
        }
    }
}

impl TrackerConfig {
    /// Loads configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup
    ///
    /// Unset or empty variables fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(key) = get("STEAM_API_KEY") {
            config.market.api_key = Some(key);
        }
        if let Some(url) = get("STEAM_MARKET_BASE_URL") {
            config.market.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get("STEAM_CURRENCY") {
            config.market.currency = parse_positive("STEAM_CURRENCY", &raw)?;
        }
        if let Some(raw) = get("STEAM_REQUEST_TIMEOUT") {
            config.market.request_timeout =
                Duration::from_secs(parse_positive("STEAM_REQUEST_TIMEOUT", &raw)?);
        }
        if let Some(raw) = get("STEAM_MAX_RETRIES") {
            config.retry.max_attempts = parse_positive("STEAM_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = get("PRICE_CACHE_TTL") {
            config.cache_ttl = Duration::from_secs(parse_positive("PRICE_CACHE_TTL", &raw)?);
        }
        if let Some(raw) = get("STEAM_MARKET_UPDATE_INTERVAL") {
            config.refresh_interval =
                Duration::from_secs(parse_positive("STEAM_MARKET_UPDATE_INTERVAL", &raw)?);
        }
        if let Some(raw) = get("REFRESH_MAX_CONCURRENCY") {
            config.max_concurrency = parse_positive("REFRESH_MAX_CONCURRENCY", &raw)?;
        }

        Ok(config)
    }
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, raw, "not a number"))?;
    if value <= T::default() {
        return Err(ConfigError::invalid(key, raw, "must be greater than zero"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = TrackerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.refresh_interval, Duration::from_secs(300));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.market.request_timeout, Duration::from_secs(10));
        assert_eq!(config.market.app_id, 730);
        assert!(config.market.api_key.is_none());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = TrackerConfig::from_lookup(lookup(&[
            ("STEAM_API_KEY", "secret"),
            ("STEAM_MARKET_UPDATE_INTERVAL", "60"),
            ("PRICE_CACHE_TTL", "30"),
            ("STEAM_MAX_RETRIES", "5"),
            ("REFRESH_MAX_CONCURRENCY", "8"),
            ("STEAM_MARKET_BASE_URL", "http://localhost:1234/"),
        ]))
        .unwrap();

        assert_eq!(config.market.api_key.as_deref(), Some("secret"));
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.market.base_url, "http://localhost:1234");
    }

    #[test]
    fn test_empty_value_falls_back_to_default() {
        let config =
            TrackerConfig::from_lookup(lookup(&[("STEAM_MARKET_UPDATE_INTERVAL", " ")])).unwrap();
        assert_eq!(config.refresh_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_interval_is_rejected() {
        let err = TrackerConfig::from_lookup(lookup(&[("STEAM_MARKET_UPDATE_INTERVAL", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("STEAM_MARKET_UPDATE_INTERVAL"));

        let err =
            TrackerConfig::from_lookup(lookup(&[("STEAM_MAX_RETRIES", "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }
}
