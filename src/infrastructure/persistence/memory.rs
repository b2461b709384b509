//! 内存实现（测试与无持久化场景）

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::repository::{KeyValueStore, ListingDirectory, ListingSnapshot};

/// 内存 KV 存储
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// 内存挂牌目录
pub struct MemoryListingDirectory {
    listings: RwLock<HashMap<String, ListingSnapshot>>,
}

impl MemoryListingDirectory {
    pub fn new() -> Self {
        Self {
            listings: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_listings(listings: Vec<ListingSnapshot>) -> Self {
        let map = listings
            .into_iter()
            .map(|l| (l.id.clone(), l))
            .collect();
        Self {
            listings: RwLock::new(map),
        }
    }

    pub async fn insert(&self, listing: ListingSnapshot) {
        self.listings
            .write()
            .await
            .insert(listing.id.clone(), listing);
    }
}

impl Default for MemoryListingDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListingDirectory for MemoryListingDirectory {
    async fn get_listing_by_id(&self, id: &str) -> Result<Option<ListingSnapshot>> {
        Ok(self.listings.read().await.get(id).cloned())
    }
}
