//! Market provider implementations

pub mod steam;

pub use steam::{build_http_client, SteamListingsPage, SteamMarketApi};
