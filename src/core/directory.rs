use async_trait::async_trait;
use log::debug;
use std::future::Future;
use tokio::time::{Duration, sleep};

use crate::core::ChordNode;
use crate::utils::{DhtError, Result};

/// Lookups that run out of hops are retried this many times in total
pub const LOOKUP_ATTEMPTS: usize = 3;
pub const LOOKUP_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Separates holder addresses in a piece's value
pub const HOLDER_SEPARATOR: &str = "|";

/// Run `lookup` until it stops failing with `RoutingExhausted` or the
/// attempts are used up. Routing state usually settles between attempts.
pub(crate) async fn retry_lookup<F, Fut>(mut lookup: F) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let mut attempt = 1;
    loop {
        match lookup().await {
            Err(DhtError::RoutingExhausted) if attempt < LOOKUP_ATTEMPTS => {
                debug!("Lookup exhausted its hops, retry {}", attempt);
                attempt += 1;
                sleep(LOOKUP_RETRY_DELAY).await;
            }
            result => return result,
        }
    }
}

pub fn parse_holders(list: &str) -> Vec<&str> {
    list.split(HOLDER_SEPARATOR)
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .collect()
}

/// Holder list with `holder` added, or `None` if it is already listed
pub fn merge_holder(list: Option<&str>, holder: &str) -> Option<String> {
    let mut holders = list.map(parse_holders).unwrap_or_default();
    if holders.contains(&holder) {
        return None;
    }
    holders.push(holder);
    Some(holders.join(HOLDER_SEPARATOR))
}

/// Key-value contract the piece layer relies on: which peers hold a piece
#[async_trait]
pub trait PieceDirectory: Send + Sync {
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Add `holder` to the holders of `piece`. Returns false when it was
    /// already listed and nothing was written.
    async fn announce_holder(&self, piece: &str, holder: &str) -> Result<bool> {
        let current = self.get(piece).await?;
        match merge_holder(current.as_deref(), holder) {
            Some(updated) => {
                self.put(piece, &updated).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn holders(&self, piece: &str) -> Result<Vec<String>> {
        Ok(self
            .get(piece)
            .await?
            .map(|list| parse_holders(&list).into_iter().map(String::from).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl PieceDirectory for ChordNode {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        ChordNode::put(self, key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        ChordNode::get(self, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemoryDirectory {
        data: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl PieceDirectory for MemoryDirectory {
        async fn put(&self, key: &str, value: &str) -> Result<()> {
            self.data.lock().await.insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.data.lock().await.get(key).cloned())
        }
    }

    #[test]
    fn test_merge_holder_is_idempotent() {
        let first = merge_holder(None, "a:1").unwrap();
        assert_eq!(first, "a:1");
        let second = merge_holder(Some(&first), "b:2").unwrap();
        assert_eq!(second, "a:1|b:2");
        assert!(merge_holder(Some(&second), "a:1").is_none());
        assert_eq!(parse_holders("a:1||b:2|"), vec!["a:1", "b:2"]);
    }

    #[tokio::test]
    async fn test_announce_holder_writes_only_on_change() {
        let dir = MemoryDirectory::default();
        assert!(dir.announce_holder("piece-0", "a:1").await.unwrap());
        assert!(dir.announce_holder("piece-0", "b:2").await.unwrap());
        assert!(!dir.announce_holder("piece-0", "a:1").await.unwrap());
        assert_eq!(dir.holders("piece-0").await.unwrap(), vec!["a:1", "b:2"]);
        assert!(dir.holders("piece-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_lookup_gives_up_after_attempts() {
        let calls = AtomicUsize::new(0);
        let result = retry_lookup(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DhtError::RoutingExhausted) }
        })
        .await;
        assert_eq!(result, Err(DhtError::RoutingExhausted));
        assert_eq!(calls.load(Ordering::SeqCst), LOOKUP_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_retry_lookup_stops_on_other_errors() {
        let calls = AtomicUsize::new(0);
        let result = retry_lookup(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(DhtError::RoutingExhausted)
                } else {
                    Ok("10.0.0.1:7000".to_string())
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "10.0.0.1:7000");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let result = retry_lookup(|| async { Err(DhtError::SuccessorsExhausted) }).await;
        assert_eq!(result, Err(DhtError::SuccessorsExhausted));
    }
}
