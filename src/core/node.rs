use log::{info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock, watch};

use crate::core::Config;
use crate::core::directory::retry_lookup;
use crate::network::dht::{MembershipTable, NodeId};
use crate::network::{LinkPool, RpcServer, Transport};
use crate::storage::{DataMap, Partition, Store};
use crate::utils::{DhtError, MetricsCollector, Result};

/// One DHT participant: routing state, local store and the tasks that serve
/// and repair them.
///
/// Shared as `Arc<ChordNode>` between the server, the stabilizer and callers.
pub struct ChordNode {
    addr: String,
    id: NodeId,
    pub config: Config,
    pub(crate) table: RwLock<MembershipTable>,
    pub(crate) store: Store,
    pub(crate) links: LinkPool,
    pub(crate) metrics: MetricsCollector,
    listener: Mutex<Option<TcpListener>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ChordNode {
    /// Bind the listening socket and derive the node identity. The node
    /// starts as a ring of one; call `start` to serve and repair.
    pub async fn bind(config: Config) -> Result<Arc<Self>> {
        config.validate()?;

        let listener = Transport::listen(&config.listen_addr).await?;
        let addr = match &config.advertise_addr {
            Some(addr) => addr.clone(),
            None => listener.local_addr()?.to_string(),
        };
        let id = NodeId::from_address(&addr);
        let metrics = MetricsCollector::new();
        let (shutdown_tx, _) = watch::channel(false);

        info!("DHT node {} bound with ID {}", addr, id);

        Ok(Arc::new(Self {
            table: RwLock::new(MembershipTable::new(
                addr.clone(),
                config.successor_list_len,
            )),
            store: Store::new(),
            links: LinkPool::new(config.call_timeout(), metrics.clone()),
            metrics,
            listener: Mutex::new(Some(listener)),
            shutdown_tx,
            addr,
            id,
            config,
        }))
    }

    /// Serve remote calls and run periodic stabilization
    pub async fn start(self: &Arc<Self>) {
        self.start_server().await;
        self.start_stabilizer();
    }

    pub async fn start_server(self: &Arc<Self>) {
        match self.listener.lock().await.take() {
            Some(listener) => {
                RpcServer::spawn(self.clone(), listener);
            }
            None => warn!("Server for {} already started", self.addr),
        }
    }

    /// Initialise a new ring containing only this node
    pub async fn create(&self) {
        self.table.write().await.reset();
        info!("Created new ring at {}", self.addr);
    }

    /// Enter the ring known to `peer`. The successor and its list are set
    /// here; the predecessor is left to stabilization.
    pub async fn join(&self, peer: &str) -> Result<()> {
        if peer == self.addr {
            return Err(DhtError::ConfigError(format!(
                "cannot join through own address {}",
                peer
            )));
        }

        info!("Joining ring via {}", peer);
        let link = self.links.get(peer).await;
        let successor = link
            .find_successor(self.id, self.config.max_hops)
            .await
            .map_err(|e| match e {
                DhtError::Io(msg) | DhtError::RemoteCallError(msg) => {
                    DhtError::ConnectionError(format!("join via {} failed: {}", peer, msg))
                }
                other => other,
            })?;

        if successor == self.addr {
            return Err(DhtError::ConfigError(format!(
                "address {} is already a ring member",
                self.addr
            )));
        }

        self.table.write().await.join(successor.clone());

        // Backups for the successor in case it fails before our first pass
        match self.links.get(&successor).await.get_succ_list().await {
            Ok(remote) => self.table.write().await.splice(&successor, &remote),
            Err(e) => warn!("GetSuccList on {} failed: {}", successor, e),
        }

        info!("Joined ring, successor is {}", successor);
        Ok(())
    }

    /// Leave gracefully: hand our keys and predecessor to the successor, point
    /// the predecessor at our successor, then stop. Both notifications are
    /// best-effort.
    pub async fn quit(&self) {
        let (successor, predecessor) = {
            let table = self.table.read().await;
            (table.successor().to_string(), table.predecessor().cloned())
        };
        let data = self.store.snapshot(Partition::Primary).await;

        info!("Node {} leaving the ring", self.addr);

        if successor != self.addr {
            let link = self.links.get(&successor).await;
            if let Err(e) = link
                .succ_inform_exit(&self.addr, predecessor.clone(), data)
                .await
            {
                warn!("Could not hand off to successor {}: {}", successor, e);
            }
        }

        if let Some(predecessor) = predecessor.filter(|p| *p != self.addr) {
            let link = self.links.get(&predecessor).await;
            if let Err(e) = link.pred_inform_exit(&self.addr, &successor).await {
                warn!("Could not inform predecessor {}: {}", predecessor, e);
            }
        }

        self.shutdown().await;
    }

    /// Stop serving and repairing without telling anyone. Peers observe this
    /// exactly like a crash.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        self.links.close_all().await;
        info!("Node {} stopped", self.addr);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Resolve the node owning `key`, retrying lookups that ran out of hops
    pub async fn find_owner(&self, key: &str) -> Result<String> {
        let id = NodeId::hash(key);
        retry_lookup(move || self.find_successor(id, self.config.max_hops)).await
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        let owner = self.find_owner(key).await?;
        if owner == self.addr {
            self.store
                .put(Partition::Primary, key.to_string(), value.to_string())
                .await;
            return Ok(());
        }
        self.links.get(&owner).await.put_data(key, value, false).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let owner = self.find_owner(key).await?;
        if owner == self.addr {
            return Ok(self.store.get(key).await);
        }
        match self.links.get(&owner).await.get_data_by_key(key).await {
            Ok(value) => Ok(Some(value)),
            Err(DhtError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub async fn successor(&self) -> String {
        self.table.read().await.successor().to_string()
    }

    pub async fn successor_list(&self) -> Vec<String> {
        self.table.read().await.successor_list()
    }

    pub async fn predecessor(&self) -> Option<String> {
        self.table.read().await.predecessor().cloned()
    }

    pub async fn primary_data(&self) -> DataMap {
        self.store.snapshot(Partition::Primary).await
    }

    pub async fn backup_data(&self) -> DataMap {
        self.store.snapshot(Partition::Backup).await
    }
}

/// Resolves once `signal` carries a stop request
pub(crate) async fn stop_requested(signal: &mut watch::Receiver<bool>) {
    let _ = signal.wait_for(|stop| *stop).await;
}
