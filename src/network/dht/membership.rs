use log::debug;

use super::finger::FingerTable;
use super::node_id::NodeId;

/// Routing state of one node: itself, its predecessor and the next K
/// successors in ring order.
///
/// The successor list is never empty; a node alone on the ring is its own
/// successor.
#[derive(Clone, Debug)]
pub struct MembershipTable {
    local_addr: String,
    local_id: NodeId,
    predecessor: Option<String>,
    successors: Vec<String>,
    max_successors: usize,
    pub fingers: FingerTable,
}

impl MembershipTable {
    /// A single-node ring
    pub fn new(local_addr: String, max_successors: usize) -> Self {
        let local_id = NodeId::from_address(&local_addr);
        Self {
            successors: vec![local_addr.clone()],
            local_addr,
            local_id,
            predecessor: None,
            max_successors: max_successors.max(1),
            fingers: FingerTable::new(local_id),
        }
    }

    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    pub fn predecessor(&self) -> Option<&String> {
        self.predecessor.as_ref()
    }

    pub fn successor(&self) -> &str {
        self.successors
            .first()
            .map(String::as_str)
            .unwrap_or(&self.local_addr)
    }

    pub fn successor_list(&self) -> Vec<String> {
        self.successors.clone()
    }

    pub fn is_alone(&self) -> bool {
        self.successor() == self.local_addr
    }

    /// Back to a fresh single-node ring
    pub fn reset(&mut self) {
        self.predecessor = None;
        self.successors = vec![self.local_addr.clone()];
        self.fingers = FingerTable::new(self.local_id);
    }

    /// Install the successor found through a bootstrap peer
    pub fn join(&mut self, successor: String) {
        self.predecessor = None;
        self.successors = vec![successor];
    }

    pub fn set_predecessor(&mut self, predecessor: Option<String>) {
        self.predecessor = predecessor.filter(|p| *p != self.local_addr);
    }

    /// Adopt `caller` as predecessor if it sits between the current one and
    /// us. Returns the replaced predecessor when adoption happened.
    pub fn notify(&mut self, caller: &str) -> Option<Option<String>> {
        if caller == self.local_addr {
            return None;
        }
        let caller_id = NodeId::from_address(caller);
        let adopt = match &self.predecessor {
            None => true,
            Some(current) if current == caller => false,
            Some(current) => {
                caller_id.is_between(&NodeId::from_address(current), &self.local_id)
            }
        };
        if !adopt {
            return None;
        }
        debug!("Adopting {} as predecessor", caller);
        Some(self.predecessor.replace(caller.to_string()))
    }

    /// Put `addr` in front of the successor list
    pub fn adopt_successor(&mut self, addr: &str) {
        if addr == self.local_addr {
            return;
        }
        self.successors.retain(|s| s != addr && *s != self.local_addr);
        self.successors.insert(0, addr.to_string());
        self.successors.truncate(self.max_successors);
    }

    /// Drop unreachable successors; falls back to `[self]` when none remain.
    /// Returns how many entries were removed.
    pub fn remove_successors(&mut self, dead: &[String]) -> usize {
        let before = self.successors.len();
        self.successors.retain(|s| !dead.contains(s));
        let removed = before - self.successors.len();
        if self.successors.is_empty() {
            self.successors.push(self.local_addr.clone());
        }
        removed
    }

    /// Rebuild the list as `[successor] ++ remote`, stopping where the remote
    /// list wraps back to us.
    pub fn splice(&mut self, successor: &str, remote: &[String]) {
        if successor == self.local_addr {
            self.successors = vec![self.local_addr.clone()];
            return;
        }
        let mut list = vec![successor.to_string()];
        for addr in remote {
            if *addr == self.local_addr || list.len() >= self.max_successors {
                break;
            }
            if !list.contains(addr) {
                list.push(addr.clone());
            }
        }
        self.successors = list;
    }

    /// Remove a peer everywhere except the predecessor slot
    pub fn forget(&mut self, addr: &str) {
        self.remove_successors(&[addr.to_string()]);
        self.fingers.remove(addr);
    }

    /// Our predecessor `leaver` is departing and hands us `new_predecessor`.
    /// Returns true if `leaver` was in fact our predecessor.
    pub fn handle_predecessor_exit(
        &mut self,
        leaver: &str,
        new_predecessor: Option<String>,
    ) -> bool {
        self.forget(leaver);
        if self.predecessor.as_deref() != Some(leaver) {
            return false;
        }
        self.set_predecessor(new_predecessor);
        true
    }

    /// Our successor `leaver` is departing and hands us `new_successor`.
    /// Returns true if `leaver` was our primary successor.
    pub fn handle_successor_exit(&mut self, leaver: &str, new_successor: &str) -> bool {
        let was_primary = self.successor() == leaver;
        self.forget(leaver);
        if was_primary {
            if new_successor == self.local_addr {
                self.successors = vec![self.local_addr.clone()];
            } else {
                self.adopt_successor(new_successor);
            }
        }
        if self.predecessor.as_deref() == Some(leaver) {
            self.predecessor = None;
        }
        was_primary
    }

    /// Whether `key` falls in `(predecessor, self]`. Unknown predecessor only
    /// counts as ownership when we are alone.
    pub fn owns(&self, key: &NodeId) -> bool {
        match &self.predecessor {
            Some(pred) => key.is_between_right_incl(&NodeId::from_address(pred), &self.local_id),
            None => self.is_alone(),
        }
    }

    /// Known nodes strictly between us and `target`, closest to `target`
    /// first. These are the candidates a lookup is forwarded to.
    pub fn closest_preceding(&self, target: &NodeId) -> Vec<String> {
        let mut candidates: Vec<(u32, String)> = Vec::new();
        for addr in self.fingers.entries().into_iter().chain(self.successors.clone()) {
            if addr == self.local_addr || candidates.iter().any(|(_, a)| *a == addr) {
                continue;
            }
            let id = NodeId::from_address(&addr);
            if id.is_between(&self.local_id, target) {
                candidates.push((id.distance_to(target), addr));
            }
        }
        candidates.sort_by_key(|(distance, _)| *distance);
        candidates.into_iter().map(|(_, addr)| addr).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Addresses sorted by ring position
    fn ring_of(n: usize) -> Vec<String> {
        let mut addrs: Vec<String> = (0..n).map(|i| format!("10.0.0.{}:7000", i + 1)).collect();
        addrs.sort_by_key(|a| NodeId::from_address(a));
        addrs
    }

    #[test]
    fn test_create_is_alone() {
        let table = MembershipTable::new("10.0.0.1:7000".to_string(), 3);
        assert!(table.is_alone());
        assert_eq!(table.successor_list(), vec!["10.0.0.1:7000".to_string()]);
        assert!(table.predecessor().is_none());
        assert!(table.owns(&NodeId::hash("anything")));
    }

    #[test]
    fn test_notify_adopts_closer_predecessor() {
        let ring = ring_of(3);
        let mut table = MembershipTable::new(ring[2].clone(), 3);

        assert_eq!(table.notify(&ring[0]), Some(None));
        assert_eq!(table.predecessor(), Some(&ring[0]));

        // ring[1] sits between ring[0] and ring[2]
        assert_eq!(table.notify(&ring[1]), Some(Some(ring[0].clone())));
        // ring[0] is further away now
        assert_eq!(table.notify(&ring[0]), None);
        assert_eq!(table.notify(&ring[2]), None);
        assert_eq!(table.predecessor(), Some(&ring[1]));
    }

    #[test]
    fn test_splice_stops_at_self_and_truncates() {
        let ring = ring_of(5);
        let mut table = MembershipTable::new(ring[0].clone(), 3);
        let remote = vec![ring[2].clone(), ring[3].clone(), ring[4].clone()];
        table.splice(&ring[1], &remote);
        assert_eq!(table.successor_list(), ring[1..4].to_vec());

        let wrapped = vec![ring[2].clone(), ring[0].clone(), ring[1].clone()];
        table.splice(&ring[1], &wrapped);
        assert_eq!(table.successor_list(), ring[1..3].to_vec());
    }

    #[test]
    fn test_remove_successors_falls_back_to_self() {
        let ring = ring_of(3);
        let mut table = MembershipTable::new(ring[0].clone(), 3);
        table.splice(&ring[1], &[ring[2].clone()]);

        assert_eq!(table.remove_successors(&[ring[1].clone()]), 1);
        assert_eq!(table.successor(), ring[2]);

        table.remove_successors(&[ring[2].clone()]);
        assert!(table.is_alone());
    }

    #[test]
    fn test_exit_handlers() {
        let ring = ring_of(3);
        let mut table = MembershipTable::new(ring[1].clone(), 3);
        table.splice(&ring[2], &[ring[0].clone()]);
        table.set_predecessor(Some(ring[0].clone()));

        // successor ring[2] leaves, its successor is ring[0]
        assert!(table.handle_successor_exit(&ring[2], &ring[0]));
        assert_eq!(table.successor(), ring[0]);

        // predecessor ring[0] leaves; we are alone again
        assert!(table.handle_predecessor_exit(&ring[0], Some(ring[1].clone())));
        assert!(table.predecessor().is_none());
    }

    #[test]
    fn test_owns_and_closest_preceding() {
        let ring = ring_of(4);
        let mut table = MembershipTable::new(ring[0].clone(), 3);
        table.set_predecessor(Some(ring[3].clone()));
        table.splice(&ring[1], &[ring[2].clone(), ring[3].clone()]);

        assert!(table.owns(&NodeId::from_address(&ring[0])));
        assert!(!table.owns(&NodeId::from_address(&ring[1])));

        let target = NodeId::from_address(&ring[3]);
        assert_eq!(
            table.closest_preceding(&target),
            vec![ring[2].clone(), ring[1].clone()]
        );
    }
}
