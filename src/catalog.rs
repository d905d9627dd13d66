//! Catalog persistence interface
//!
//! The catalog owns the set of tracked items and their price history. The
//! tracker only lists items and commits one [`PriceUpdate`] per refreshed item.

use crate::{
    error::PersistenceError,
    types::{CatalogItem, ItemType, PriceHistoryRecord, PriceUpdate},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Storage for tracked items and their history
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Returns every tracked item
    async fn list_items(&self) -> Result<Vec<CatalogItem>, PersistenceError>;

    /// Applies one item's refresh result
    ///
    /// Updates the item's current price, volume and last-updated time and
    /// appends a history record, all-or-nothing.
    async fn record_price(&self, update: &PriceUpdate) -> Result<(), PersistenceError>;

    /// Returns an item's history, oldest first
    async fn price_history(&self, item_id: i64)
        -> Result<Vec<PriceHistoryRecord>, PersistenceError>;
}

#[derive(Default)]
struct CatalogState {
    items: BTreeMap<i64, CatalogItem>,
    history: Vec<PriceHistoryRecord>,
}

/// In-process catalog
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let items = items.into_iter().map(|item| (item.id, item)).collect();
        Self {
            state: RwLock::new(CatalogState {
                items,
                history: Vec::new(),
            }),
        }
    }

    /// Inserts or replaces an item
    pub async fn upsert_item(&self, item: CatalogItem) {
        self.state.write().await.items.insert(item.id, item);
    }

    pub async fn get_item(&self, item_id: i64) -> Option<CatalogItem> {
        self.state.read().await.items.get(&item_id).cloned()
    }

    pub async fn find_by_market_hash_name(&self, market_hash_name: &str) -> Option<CatalogItem> {
        self.state
            .read()
            .await
            .items
            .values()
            .find(|item| item.market_hash_name == market_hash_name)
            .cloned()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn list_items(&self) -> Result<Vec<CatalogItem>, PersistenceError> {
        Ok(self.state.read().await.items.values().cloned().collect())
    }

    async fn record_price(&self, update: &PriceUpdate) -> Result<(), PersistenceError> {
        let mut state = self.state.write().await;
        let item = state
            .items
            .get_mut(&update.item_id)
            .ok_or(PersistenceError::ItemNotFound(update.item_id))?;

        item.current_price = update.price;
        item.volume_24h = update.volume;
        item.last_updated = Some(update.updated_at);
        state.history.push(update.history_record());
        Ok(())
    }

    async fn price_history(
        &self,
        item_id: i64,
    ) -> Result<Vec<PriceHistoryRecord>, PersistenceError> {
        Ok(self
            .state
            .read()
            .await
            .history
            .iter()
            .filter(|record| record.item_id == item_id)
            .cloned()
            .collect())
    }
}

/// Items tracked by a fresh deployment
pub fn default_catalog() -> Vec<CatalogItem> {
    vec![
        CatalogItem::new(
            1,
            "AK-47 | Asiimov",
            "AK-47 | Asiimov (Factory New)",
            ItemType::Weapon,
        )
        .with_rarity("Covert")
        .with_collection("Operation Phoenix"),
        CatalogItem::new(
            2,
            "M4A4 | Howl",
            "M4A4 | Howl (Factory New)",
            ItemType::Weapon,
        )
        .with_rarity("Contraband")
        .with_collection("Operation Bravo"),
    ]
}
