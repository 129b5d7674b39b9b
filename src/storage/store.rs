use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub type DataMap = HashMap<String, String>;

/// Which half of the store an operation targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Partition {
    /// Keys this node owns
    Primary,
    /// Mirror of the predecessor's primary partition
    Backup,
}

impl Partition {
    pub fn from_backup_flag(is_backup: bool) -> Self {
        if is_backup {
            Partition::Backup
        } else {
            Partition::Primary
        }
    }
}

/// Per-node key/value storage with independently locked primary and
/// backup partitions.
#[derive(Default)]
pub struct Store {
    primary: RwLock<DataMap>,
    backup: RwLock<DataMap>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, partition: Partition) -> &RwLock<DataMap> {
        match partition {
            Partition::Primary => &self.primary,
            Partition::Backup => &self.backup,
        }
    }

    pub async fn put(&self, partition: Partition, key: String, value: String) {
        debug!("Store put {:?} {}", partition, key);
        self.partition(partition).write().await.insert(key, value);
    }

    /// Primary-only lookup
    pub async fn get(&self, key: &str) -> Option<String> {
        self.primary.read().await.get(key).cloned()
    }

    pub async fn get_backup(&self, key: &str) -> Option<String> {
        self.backup.read().await.get(key).cloned()
    }

    pub async fn delete(&self, partition: Partition, key: &str) -> bool {
        self.partition(partition).write().await.remove(key).is_some()
    }

    pub async fn snapshot(&self, partition: Partition) -> DataMap {
        self.partition(partition).read().await.clone()
    }

    pub async fn len(&self, partition: Partition) -> usize {
        self.partition(partition).read().await.len()
    }

    pub async fn replace_backup(&self, data: DataMap) {
        *self.backup.write().await = data;
    }

    pub async fn clear_backup(&self) {
        self.backup.write().await.clear();
    }

    /// Merge `data` into primary; newer values win
    pub async fn merge_primary(&self, data: DataMap) {
        self.primary.write().await.extend(data);
    }

    /// Move every backup entry into primary, keeping primary values on
    /// conflict. Returns the number of keys taken over.
    pub async fn promote_backup(&self) -> usize {
        let backup = std::mem::take(&mut *self.backup.write().await);
        let mut primary = self.primary.write().await;
        let mut promoted = 0;
        for (key, value) in backup {
            if !primary.contains_key(&key) {
                primary.insert(key, value);
                promoted += 1;
            }
        }
        promoted
    }

    /// Remove and return the primary entries for which `keep` is false
    pub async fn drain_primary<F>(&self, keep: F) -> DataMap
    where
        F: Fn(&str) -> bool,
    {
        let mut primary = self.primary.write().await;
        let moving: Vec<String> = primary.keys().filter(|k| !keep(k)).cloned().collect();
        moving
            .into_iter()
            .filter_map(|k| primary.remove(&k).map(|v| (k, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let store = Store::new();
        store.put(Partition::Primary, "k".into(), "p".into()).await;
        store.put(Partition::Backup, "k".into(), "b".into()).await;

        assert_eq!(store.get("k").await.as_deref(), Some("p"));
        assert_eq!(store.get_backup("k").await.as_deref(), Some("b"));

        assert!(store.delete(Partition::Primary, "k").await);
        assert!(!store.delete(Partition::Primary, "k").await);
        assert!(store.get("k").await.is_none());
        assert_eq!(store.len(Partition::Backup).await, 1);
    }

    #[tokio::test]
    async fn test_replace_and_promote_backup() {
        let store = Store::new();
        store.put(Partition::Primary, "own".into(), "1".into()).await;
        store.put(Partition::Backup, "stale".into(), "x".into()).await;

        let mut mirror = DataMap::new();
        mirror.insert("a".into(), "1".into());
        mirror.insert("own".into(), "2".into());
        store.replace_backup(mirror).await;
        assert!(store.get_backup("stale").await.is_none());

        assert_eq!(store.promote_backup().await, 1);
        assert_eq!(store.get("a").await.as_deref(), Some("1"));
        assert_eq!(store.get("own").await.as_deref(), Some("1"));
        assert_eq!(store.len(Partition::Backup).await, 0);
    }

    #[tokio::test]
    async fn test_drain_primary() {
        let store = Store::new();
        for key in ["a1", "a2", "b1"] {
            store.put(Partition::Primary, key.into(), "v".into()).await;
        }
        let moved = store.drain_primary(|k| k.starts_with('a')).await;
        assert_eq!(moved.len(), 1);
        assert!(moved.contains_key("b1"));
        assert_eq!(store.len(Partition::Primary).await, 2);
    }
}
