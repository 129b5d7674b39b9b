use async_trait::async_trait;
use log::debug;
use std::time::Duration;

use crate::core::directory::{PieceDirectory, retry_lookup};
use crate::network::LinkPool;
use crate::network::dht::NodeId;
use crate::utils::{DhtError, MetricsCollector, Result};

/// Reaches the ring through one known member without joining it
pub struct DhtClient {
    entry: String,
    links: LinkPool,
    max_hops: i16,
}

impl DhtClient {
    pub fn new(entry: impl Into<String>, call_timeout: Duration, max_hops: i16) -> Self {
        Self {
            entry: entry.into(),
            links: LinkPool::new(call_timeout, MetricsCollector::new()),
            max_hops,
        }
    }

    /// Ask the entry node which member owns `key`
    pub async fn find_owner(&self, key: &str) -> Result<String> {
        let id = NodeId::hash(key);
        let entry = self.links.get(&self.entry).await;
        let owner = retry_lookup(|| entry.find_successor(id, self.max_hops)).await?;
        debug!("Key {} ({}) is owned by {}", key, id, owner);
        Ok(owner)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let owner = self.find_owner(key).await?;
        self.links.get(&owner).await.delete_data(key, false).await
    }

    pub async fn close(&self) {
        self.links.close_all().await;
    }
}

#[async_trait]
impl PieceDirectory for DhtClient {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let owner = self.find_owner(key).await?;
        self.links.get(&owner).await.put_data(key, value, false).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let owner = self.find_owner(key).await?;
        match self.links.get(&owner).await.get_data_by_key(key).await {
            Ok(value) => Ok(Some(value)),
            Err(DhtError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
