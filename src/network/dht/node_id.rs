use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of bits in the identifier space.
pub const ID_BITS: usize = 32;

/// Position on the 2^32 identifier ring.
///
/// Derived from the first four bytes of SHA-256 of an address or key, so a
/// node's identity never needs to be negotiated with its peers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Hash an arbitrary string (address or content key) onto the ring
    pub fn hash(s: &str) -> Self {
        let digest = Sha256::digest(s.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        Self(u32::from_be_bytes(bytes))
    }

    pub fn from_address(addr: &str) -> Self {
        Self::hash(addr)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Clockwise distance from `self` to `other`
    pub fn distance_to(&self, other: &NodeId) -> u32 {
        other.0.wrapping_sub(self.0)
    }

    /// `self + 2^exp` on the ring
    pub fn finger_start(&self, exp: usize) -> NodeId {
        NodeId(self.0.wrapping_add(1u32 << exp))
    }

    /// True if `self` lies in the open interval `(from, to)`.
    /// `from == to` denotes the whole ring except `from`.
    pub fn is_between(&self, from: &NodeId, to: &NodeId) -> bool {
        if from == to {
            return self != from;
        }
        let span = from.distance_to(to);
        let offset = from.distance_to(self);
        offset > 0 && offset < span
    }

    /// True if `self` lies in `(from, to]`. `from == to` denotes the whole ring.
    pub fn is_between_right_incl(&self, from: &NodeId, to: &NodeId) -> bool {
        self == to || self.is_between(from, to)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let a = NodeId::from_address("127.0.0.1:20000");
        let b = NodeId::from_address("127.0.0.1:20000");
        assert_eq!(a, b);
        assert_ne!(a, NodeId::from_address("127.0.0.1:20001"));
    }

    #[test]
    fn test_hash_uses_leading_digest_bytes() {
        // sha256("abc") = ba7816bf...
        assert_eq!(NodeId::hash("abc").as_u32(), 0xba78_16bf);
        assert_eq!(NodeId::hash("abc").to_hex(), "ba7816bf");
    }

    #[test]
    fn test_between_plain() {
        let a = NodeId::new(10);
        let b = NodeId::new(20);
        assert!(NodeId::new(15).is_between(&a, &b));
        assert!(!NodeId::new(10).is_between(&a, &b));
        assert!(!NodeId::new(20).is_between(&a, &b));
        assert!(NodeId::new(20).is_between_right_incl(&a, &b));
        assert!(!NodeId::new(25).is_between_right_incl(&a, &b));
    }

    #[test]
    fn test_between_wraps() {
        let from = NodeId::new(u32::MAX - 5);
        let to = NodeId::new(5);
        assert!(NodeId::new(u32::MAX).is_between(&from, &to));
        assert!(NodeId::new(0).is_between(&from, &to));
        assert!(NodeId::new(4).is_between(&from, &to));
        assert!(!NodeId::new(6).is_between(&from, &to));
        assert!(!NodeId::new(100).is_between(&from, &to));
    }

    #[test]
    fn test_degenerate_interval() {
        let n = NodeId::new(42);
        assert!(NodeId::new(7).is_between(&n, &n));
        assert!(!n.is_between(&n, &n));
        assert!(n.is_between_right_incl(&n, &n));
    }

    #[test]
    fn test_distance_and_finger_start() {
        let a = NodeId::new(u32::MAX);
        assert_eq!(a.distance_to(&NodeId::new(1)), 2);
        assert_eq!(a.finger_start(0), NodeId::new(0));
        assert_eq!(NodeId::new(0).finger_start(31), NodeId::new(1 << 31));
    }
}
