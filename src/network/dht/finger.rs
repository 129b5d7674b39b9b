use super::node_id::{ID_BITS, NodeId};

/// Finger table: entry `i` caches the successor of `local + 2^i`.
///
/// Entries are repaired one at a time by the stabilizer; a stale or dead
/// entry only costs an extra hop or a fallback during lookup.
#[derive(Clone, Debug)]
pub struct FingerTable {
    local_id: NodeId,
    fingers: Vec<Option<String>>,
    next_fix: usize,
}

impl FingerTable {
    pub fn new(local_id: NodeId) -> Self {
        Self {
            local_id,
            fingers: vec![None; ID_BITS],
            next_fix: 0,
        }
    }

    pub fn get(&self, index: usize) -> Option<&String> {
        self.fingers.get(index).and_then(|f| f.as_ref())
    }

    pub fn set(&mut self, index: usize, addr: String) {
        if let Some(slot) = self.fingers.get_mut(index) {
            *slot = Some(addr);
        }
    }

    /// Forget every entry pointing at `addr`
    pub fn remove(&mut self, addr: &str) {
        for slot in self.fingers.iter_mut() {
            if slot.as_deref() == Some(addr) {
                *slot = None;
            }
        }
    }

    /// Next index to repair and the ring position it should resolve.
    /// Advances the cursor.
    pub fn next_to_fix(&mut self) -> (usize, NodeId) {
        let index = self.next_fix;
        self.next_fix = (self.next_fix + 1) % ID_BITS;
        (index, self.local_id.finger_start(index))
    }

    /// Distinct addresses currently held, highest finger first
    pub fn entries(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for addr in self.fingers.iter().rev().flatten() {
            if !out.contains(addr) {
                out.push(addr.clone());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.fingers.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
