use log::{debug, info, warn};
use std::sync::Arc;

use super::node_id::NodeId;
use crate::core::ChordNode;
use crate::core::protocol::{PING_REPLY, PING_REQUEST, Request, Response, RpcFault};
use crate::storage::{DataMap, Partition};

impl ChordNode {
    /// Answer one remote call. Errors are returned to the caller as a
    /// `Response::Fault`.
    pub async fn handle_request(self: &Arc<Self>, request: Request) -> Response {
        match request {
            Request::FindSuccessor { id, ttl } => {
                match self.find_successor(NodeId::new(id), ttl).await {
                    Ok(addr) => Response::Successor(addr),
                    Err(e) => Response::Fault(e.into()),
                }
            }
            Request::GetPredecessor => Response::Predecessor(self.predecessor().await),
            Request::Ping(value) => Self::handle_ping(value),
            Request::Notify { addr } => {
                self.handle_notify(addr).await;
                Response::Ack
            }
            Request::GetSuccList => Response::SuccList(self.successor_list().await),
            Request::GetAllData { is_backup } => {
                Response::Data(self.store.snapshot(Partition::from_backup_flag(is_backup)).await)
            }
            Request::GetDataByKey { key } => match self.store.get(&key).await {
                Some(value) => Response::Value(value),
                None => Response::Fault(RpcFault::KeyNotFound(key)),
            },
            Request::PutData {
                is_backup,
                key,
                value,
            } => {
                self.store
                    .put(Partition::from_backup_flag(is_backup), key, value)
                    .await;
                Response::Ack
            }
            Request::SendBackupData { data } => {
                self.store.replace_backup(data).await;
                Response::Ack
            }
            Request::DeleteData { is_backup, key } => {
                self.store
                    .delete(Partition::from_backup_flag(is_backup), &key)
                    .await;
                Response::Ack
            }
            Request::SuccInformExit {
                addr,
                predecessor,
                data,
            } => {
                self.handle_predecessor_exit(&addr, predecessor, data).await;
                Response::Ack
            }
            Request::PredInformExit { addr, successor } => {
                self.handle_successor_exit(&addr, &successor).await;
                Response::Ack
            }
        }
    }

    fn handle_ping(value: i32) -> Response {
        if value == PING_REQUEST {
            Response::Pong(PING_REPLY)
        } else {
            Response::Pong(value)
        }
    }

    async fn handle_notify(self: &Arc<Self>, caller: String) {
        let replaced = self.table.write().await.notify(&caller);
        if let Some(old) = replaced {
            info!(
                "{} adopted predecessor {} (was {:?})",
                self.addr(),
                caller,
                old
            );
            let node = self.clone();
            tokio::spawn(async move { node.hand_off(caller).await });
        }
    }

    /// Give `new_pred` the primary keys that now fall in its range. Keys it
    /// accepted stay here as backup; the rest go back to primary.
    async fn hand_off(&self, new_pred: String) {
        let from = NodeId::from_address(&new_pred);
        let me = self.id();
        let moving = self
            .store
            .drain_primary(|key| NodeId::hash(key).is_between_right_incl(&from, &me))
            .await;
        if moving.is_empty() {
            return;
        }

        let link = self.links.get(&new_pred).await;
        let mut moved = 0;
        for (key, value) in moving {
            match link.put_data(&key, &value, false).await {
                Ok(()) => {
                    self.store.put(Partition::Backup, key, value).await;
                    moved += 1;
                }
                Err(e) => {
                    warn!("Hand-off of {} to {} failed: {}", key, new_pred, e);
                    self.store.put(Partition::Primary, key, value).await;
                }
            }
        }

        self.metrics.record_keys_handed_off(moved).await;
        debug!("Handed {} keys to {}", moved, new_pred);
    }

    async fn handle_predecessor_exit(
        &self,
        leaver: &str,
        predecessor: Option<String>,
        data: DataMap,
    ) {
        let count = data.len();
        self.store.merge_primary(data).await;

        let was_predecessor = self
            .table
            .write()
            .await
            .handle_predecessor_exit(leaver, predecessor);
        if was_predecessor {
            self.store.clear_backup().await;
        }
        self.links.evict(leaver).await;

        info!(
            "{} absorbed {} keys from departing {}",
            self.addr(),
            count,
            leaver
        );
    }

    async fn handle_successor_exit(&self, leaver: &str, successor: &str) {
        if self
            .table
            .write()
            .await
            .handle_successor_exit(leaver, successor)
        {
            info!("{} moved past departing successor {}", self.addr(), leaver);
        }
        self.links.evict(leaver).await;
    }
}
