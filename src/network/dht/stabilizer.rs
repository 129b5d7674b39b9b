use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};

use super::node_id::NodeId;
use crate::core::ChordNode;
use crate::core::node::stop_requested;
use crate::storage::Partition;
use crate::utils::{DhtError, Result};

impl ChordNode {
    /// Run `stabilize` every `stabilize_interval` until shutdown
    pub fn start_stabilizer(self: &Arc<Self>) {
        let node = self.clone();
        let mut shutdown = self.shutdown_signal();

        tokio::spawn(async move {
            let mut ticker = interval(node.config.stabilize_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while !node.is_stopped() {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = node.stabilize().await {
                            error!("Stabilization of {} failed: {}", node.addr(), e);
                        }
                    }
                    _ = stop_requested(&mut shutdown) => break,
                }
            }
            debug!("Stabilizer of {} stopped", node.addr());
        });
    }

    /// One repair pass. No lock is held while a peer is being called.
    pub async fn stabilize(&self) -> Result<()> {
        self.metrics.record_stabilize_pass().await;

        let (successor, follows_us) = self.fix_successor().await?;
        if successor != self.addr() {
            self.refresh_successor_list(&successor).await;

            let link = self.links.get(&successor).await;
            if let Err(e) = link.notify(self.addr()).await {
                warn!("Notify to {} failed: {}", successor, e);
            }
            // A successor still pointing at another predecessor may hold that
            // node's keys as backup; they must survive until it takes them over.
            if follows_us {
                self.replicate_to(&successor).await;
            }
        }

        self.check_predecessor().await;
        self.fix_next_finger().await;
        Ok(())
    }

    /// Find the first live successor, dropping dead ones, then move to our
    /// successor's predecessor if it sits between us. The flag tells whether
    /// the returned successor has us or nobody as its predecessor.
    async fn fix_successor(&self) -> Result<(String, bool)> {
        let candidates = self.table.read().await.successor_list();

        let mut live = None;
        let mut dead = Vec::new();
        for addr in candidates {
            if addr == self.addr() {
                live = Some(addr);
                break;
            }
            match self.links.get(&addr).await.ping().await {
                Ok(()) => {
                    live = Some(addr);
                    break;
                }
                Err(e) => {
                    warn!("Successor {} unreachable: {}", addr, e);
                    self.links.evict(&addr).await;
                    dead.push(addr);
                }
            }
        }

        if !dead.is_empty() {
            {
                let mut table = self.table.write().await;
                table.remove_successors(&dead);
                for addr in &dead {
                    table.fingers.remove(addr);
                }
            }
            self.metrics.record_successor_failover(dead.len()).await;
        }

        let successor = match live {
            Some(successor) => successor,
            None => {
                error!("Every successor of {} is unreachable", self.addr());
                return Err(DhtError::SuccessorsExhausted);
            }
        };

        let candidate = if successor == self.addr() {
            self.table.read().await.predecessor().cloned()
        } else {
            match self.links.get(&successor).await.get_predecessor().await {
                Ok(pred) => pred,
                Err(e) => {
                    warn!("GetPredecessor on {} failed: {}", successor, e);
                    return Ok((successor, false));
                }
            }
        };

        let candidate = match candidate {
            Some(candidate) if candidate != self.addr() => candidate,
            _ => return Ok((successor, true)),
        };

        let closer = NodeId::from_address(&candidate)
            .is_between(&self.id(), &NodeId::from_address(&successor));
        if closer && self.links.get(&candidate).await.ping().await.is_ok() {
            debug!("{} adopts closer successor {}", self.addr(), candidate);
            self.table.write().await.adopt_successor(&candidate);
            return Ok((candidate, false));
        }

        Ok((successor, false))
    }

    async fn refresh_successor_list(&self, successor: &str) {
        match self.links.get(successor).await.get_succ_list().await {
            Ok(remote) => self.table.write().await.splice(successor, &remote),
            Err(e) => warn!("GetSuccList on {} failed: {}", successor, e),
        }
    }

    /// Push our primary partition to the successor as its backup
    async fn replicate_to(&self, successor: &str) {
        let snapshot = self.store.snapshot(Partition::Primary).await;
        let count = snapshot.len();
        match self.links.get(successor).await.send_backup_data(snapshot).await {
            Ok(()) => debug!("Replicated {} keys to {}", count, successor),
            Err(e) => warn!("Replication to {} failed: {}", successor, e),
        }
    }

    /// A dead predecessor's range becomes ours, and so does its data, which
    /// we hold as backup.
    async fn check_predecessor(&self) {
        let predecessor = match self.table.read().await.predecessor().cloned() {
            Some(pred) if pred != self.addr() => pred,
            _ => return,
        };

        if let Err(e) = self.links.get(&predecessor).await.ping().await {
            warn!("Predecessor {} unreachable: {}", predecessor, e);
            self.links.evict(&predecessor).await;
            {
                let mut table = self.table.write().await;
                if table.predecessor() == Some(&predecessor) {
                    table.set_predecessor(None);
                }
                table.fingers.remove(&predecessor);
            }
            let promoted = self.store.promote_backup().await;
            self.metrics.record_predecessor_failure().await;
            info!(
                "{} took over {} keys from failed predecessor {}",
                self.addr(),
                promoted,
                predecessor
            );
        }
    }

    async fn fix_next_finger(&self) {
        let (index, start) = self.table.write().await.fingers.next_to_fix();
        match self.find_successor(start, self.config.max_hops).await {
            Ok(addr) => self.table.write().await.fingers.set(index, addr),
            Err(e) => debug!("Finger {} of {} not fixed: {}", index, self.addr(), e),
        }
    }
}
