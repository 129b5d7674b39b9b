use log::{debug, warn};

use super::node_id::NodeId;
use crate::core::ChordNode;
use crate::utils::{DhtError, Result};

impl ChordNode {
    /// Address of the node responsible for ring position `id`.
    ///
    /// Answers locally when `id` falls in our own range or our successor's;
    /// otherwise forwards to the closest known node preceding `id`, spending
    /// one unit of `ttl` per hop. When every such hop fails, the successor
    /// list is walked in order before giving up with `SuccessorsExhausted`.
    pub async fn find_successor(&self, id: NodeId, ttl: i16) -> Result<String> {
        let (successor, mut candidates) = {
            let table = self.table.read().await;

            // alone, but a joiner already announced itself as predecessor
            let successor = if table.is_alone() {
                match table.predecessor() {
                    Some(pred) => pred.clone(),
                    None => return Ok(self.addr().to_string()),
                }
            } else {
                table.successor().to_string()
            };

            if table.predecessor().is_some() && table.owns(&id) {
                return Ok(self.addr().to_string());
            }
            if id.is_between_right_incl(&self.id(), &NodeId::from_address(&successor)) {
                return Ok(successor);
            }
            (successor, table.closest_preceding(&id))
        };

        if ttl <= 0 {
            debug!("Lookup for {} ran out of hops at {}", id, self.addr());
            return Err(DhtError::RoutingExhausted);
        }

        if candidates.is_empty() {
            candidates.push(successor);
        }

        let mut tried = Vec::new();
        let mut last_fault = None;

        for hop in candidates {
            match self.forward(&hop, id, ttl).await {
                Ok(owner) => return Ok(owner),
                Err(DhtError::RoutingExhausted) => return Err(DhtError::RoutingExhausted),
                Err(e) if e.is_peer_failure() => {}
                Err(e) => last_fault = Some(e),
            }
            tried.push(hop);
        }

        // successors past the dead hops, nearest first
        let fallbacks = self.table.read().await.successor_list();
        for entry in fallbacks {
            if entry == self.addr() || tried.contains(&entry) {
                continue;
            }
            if id.is_between_right_incl(&self.id(), &NodeId::from_address(&entry)) {
                match self.links.get(&entry).await.ping().await {
                    Ok(()) => return Ok(entry),
                    Err(e) => {
                        self.drop_hop(&entry, id, &e).await;
                        continue;
                    }
                }
            }
            match self.forward(&entry, id, ttl).await {
                Ok(owner) => return Ok(owner),
                Err(DhtError::RoutingExhausted) => return Err(DhtError::RoutingExhausted),
                Err(e) if e.is_peer_failure() => {}
                Err(e) => last_fault = Some(e),
            }
        }

        Err(last_fault.unwrap_or(DhtError::SuccessorsExhausted))
    }

    /// One forwarding hop. A dead hop is evicted; a hop whose own handler
    /// failed is kept.
    async fn forward(&self, hop: &str, id: NodeId, ttl: i16) -> Result<String> {
        let result = self.links.get(hop).await.find_successor(id, ttl - 1).await;
        match &result {
            Err(e) if e.is_peer_failure() => self.drop_hop(hop, id, e).await,
            Err(DhtError::RoutingExhausted) | Ok(_) => {}
            Err(e) => debug!("Hop {} could not resolve {}: {}", hop, id, e),
        }
        result
    }

    async fn drop_hop(&self, hop: &str, id: NodeId, cause: &DhtError) {
        warn!("Hop {} failed for lookup {}: {}", hop, id, cause);
        self.links.evict(hop).await;
        self.table.write().await.fingers.remove(hop);
    }
}
