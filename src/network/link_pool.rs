use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::network::Link;
use crate::utils::MetricsCollector;

/// Links to peers this node talks to, one per address
pub struct LinkPool {
    links: RwLock<HashMap<String, Arc<Link>>>,
    call_timeout: Duration,
    metrics: MetricsCollector,
}

impl LinkPool {
    pub fn new(call_timeout: Duration, metrics: MetricsCollector) -> Self {
        Self {
            links: RwLock::new(HashMap::new()),
            call_timeout,
            metrics,
        }
    }

    /// Existing link to `addr`, or a new undialed one
    pub async fn get(&self, addr: &str) -> Arc<Link> {
        if let Some(link) = self.links.read().await.get(addr) {
            return link.clone();
        }

        let mut links = self.links.write().await;
        links
            .entry(addr.to_string())
            .or_insert_with(|| {
                Arc::new(Link::new(addr, self.call_timeout).with_metrics(self.metrics.clone()))
            })
            .clone()
    }

    /// Drop the link to a peer presumed dead
    pub async fn evict(&self, addr: &str) {
        if let Some(link) = self.links.write().await.remove(addr) {
            debug!("Evicted link to {}", addr);
            link.close().await;
        }
    }

    pub async fn close_all(&self) {
        let links: Vec<Arc<Link>> = self.links.write().await.drain().map(|(_, l)| l).collect();
        for link in links {
            link.close().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_reuses_and_evict_removes() {
        let pool = LinkPool::new(Duration::from_millis(100), MetricsCollector::new());
        let a = pool.get("127.0.0.1:1").await;
        let b = pool.get("127.0.0.1:1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len().await, 1);

        pool.evict("127.0.0.1:1").await;
        assert_eq!(pool.len().await, 0);
        assert!(!Arc::ptr_eq(&a, &pool.get("127.0.0.1:1").await));
    }
}
