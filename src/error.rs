//! Error types for the item price tracker

use crate::retry::FailureKind;
use thiserror::Error;

/// Errors that can occur when fetching prices from the market
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Invalid or malformed response from the market
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Market API error (non-success status or `success: false`)
    #[error("Provider API error: {0}")]
    ApiError(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,

    /// A request URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ProviderError {
    /// Maps a reqwest error, keeping timeouts distinct from other transport failures
    pub fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::NetworkError(err)
        }
    }

    /// Classifies this error for the backoff policy
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::RateLimitExceeded => FailureKind::RateLimited,
            _ => FailureKind::Other,
        }
    }
}

/// Errors raised by a cache backend
///
/// These never leave [`PriceCache`](crate::cache::PriceCache); they are logged
/// and turned into a miss or a failed write.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not serve the request
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// A cached payload could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the catalog persistence layer
#[derive(Debug, Error, Clone)]
pub enum PersistenceError {
    /// The item referenced by an update does not exist
    #[error("Catalog item {0} not found")]
    ItemNotFound(i64),

    /// The storage backend failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PersistenceError {
    /// Creates a Storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Errors produced while reading configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to a value that cannot be used
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    /// Creates an InvalidValue error
    pub fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
