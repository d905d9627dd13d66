//! Steam Community Market provider implementation
//!
//! Two endpoints are used: the JSON price overview for price and volume, and
//! the HTML listings page, scraped for the active listings count.

use crate::{
    config::MarketConfig,
    constants::{LISTINGS_PATH, PRICE_OVERVIEW_PATH, USER_AGENT},
    error::ProviderError,
    provider::{ListingsLookup, MarketQuoteApi, PriceOverview},
};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::LazyLock;

static LISTINGS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Showing ([\d,]+) listings").expect("Invalid regex"));

/// Steam price overview response
#[derive(Debug, Deserialize)]
struct PriceOverviewResponse {
    #[serde(default)]
    success: bool,
    lowest_price: Option<String>,
    volume: Option<String>,
}

/// Builds the HTTP client shared by the Steam endpoints
pub fn build_http_client(config: &MarketConfig) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(config.request_timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(ProviderError::NetworkError)
}

fn parse_base_url(raw: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(raw).map_err(|e| ProviderError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(ProviderError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Appends path segments to `base`, keeping any path prefix it carries
fn endpoint_url<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, ProviderError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ProviderError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Parses a currency-formatted price such as `$1,234.56`, `1,23€` or `1.234,56€`
///
/// When both `.` and `,` appear, the last one is the decimal separator. A
/// lone comma followed by exactly two digits is a decimal separator; any
/// other comma is digit grouping.
pub fn parse_price(raw: &str) -> Result<Decimal, ProviderError> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let normalized = match (digits.rfind('.'), digits.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => digits.replace('.', "").replace(',', "."),
        (None, Some(comma)) if digits.len() - comma == 3 && digits.matches(',').count() == 1 => {
            digits.replace(',', ".")
        }
        _ => digits.replace(',', ""),
    };

    if normalized.is_empty() {
        return Err(ProviderError::InvalidResponse(format!(
            "No price in '{}'",
            raw
        )));
    }

    Decimal::from_str(&normalized)
        .map_err(|e| ProviderError::InvalidResponse(format!("Bad price '{}': {}", raw, e)))
}

/// Parses a comma-grouped integer such as `1,234`
pub fn parse_volume(raw: &str) -> Result<u64, ProviderError> {
    let digits: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    digits
        .parse()
        .map_err(|_| ProviderError::InvalidResponse(format!("Bad volume '{}'", raw)))
}

/// Extracts the listings count from a listings page, if the phrase is present
pub fn parse_listings_count(html: &str) -> Option<u64> {
    let captures = LISTINGS_REGEX.captures(html)?;
    captures[1].replace(',', "").parse().ok()
}

/// Steam price overview client
pub struct SteamMarketApi {
    client: Client,
    overview_url: Url,
    api_key: Option<String>,
    app_id: u32,
    currency: u32,
}

impl SteamMarketApi {
    /// Creates a new price overview client
    pub fn new(client: Client, config: &MarketConfig) -> Result<Self, ProviderError> {
        let overview_url = endpoint_url(&parse_base_url(&config.base_url)?, PRICE_OVERVIEW_PATH)?;

        Ok(Self {
            client,
            overview_url,
            api_key: config.api_key.clone(),
            app_id: config.app_id,
            currency: config.currency,
        })
    }

    /// Parses the price overview body into price data
    fn parse_response(&self, text: &str) -> Result<PriceOverview, ProviderError> {
        let response: PriceOverviewResponse = serde_json::from_str(text).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse Steam response: {}. Response: {}",
                e, text
            ))
        })?;

        if !response.success {
            return Err(ProviderError::ApiError(
                "Steam reported success=false".to_string(),
            ));
        }

        let price = match response.lowest_price.as_deref() {
            Some(raw) => parse_price(raw)?,
            None => Decimal::ZERO,
        };
        let volume = match response.volume.as_deref() {
            Some(raw) => parse_volume(raw)?,
            None => 0,
        };

        Ok(PriceOverview { price, volume })
    }
}

#[async_trait]
impl MarketQuoteApi for SteamMarketApi {
    async fn price_overview(&self, market_hash_name: &str) -> Result<PriceOverview, ProviderError> {
        tracing::debug!(item = market_hash_name, url = %self.overview_url, "Fetching price overview");

        let mut request = self.client.get(self.overview_url.clone()).query(&[
            ("currency", self.currency.to_string()),
            ("appid", self.app_id.to_string()),
            ("market_hash_name", market_hash_name.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await.map_err(ProviderError::from_request)?;

        // Check for rate limiting
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimitExceeded);
        }

        // Check for other errors
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let text = response.text().await.map_err(ProviderError::from_request)?;
        self.parse_response(&text)
    }

    fn provider_name(&self) -> &'static str {
        "steam"
    }
}

/// Steam listings page scraper
pub struct SteamListingsPage {
    client: Client,
    base_url: Url,
    app_id: u32,
}

impl SteamListingsPage {
    /// Creates a new listings page scraper
    pub fn new(client: Client, config: &MarketConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client,
            base_url: parse_base_url(&config.base_url)?,
            app_id: config.app_id,
        })
    }

    fn listings_url(&self, market_hash_name: &str) -> Result<Url, ProviderError> {
        let app_id = self.app_id.to_string();
        endpoint_url(
            &self.base_url,
            LISTINGS_PATH.into_iter().chain([app_id.as_str(), market_hash_name]),
        )
    }
}

#[async_trait]
impl ListingsLookup for SteamListingsPage {
    async fn lookup(&self, market_hash_name: &str) -> Result<u64, ProviderError> {
        let url = self.listings_url(market_hash_name)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ProviderError::from_request)?;

        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!("HTTP {}", response.status())));
        }

        let html = response.text().await.map_err(ProviderError::from_request)?;
        Ok(parse_listings_count(&html).unwrap_or(0))
    }
}
