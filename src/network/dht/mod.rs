//! Chord ring maintenance
//!
//! Consistent-hash ring of nodes: each node knows its predecessor, a short
//! list of successors and a finger table. Lookups walk the ring towards the
//! owner of an identifier; a periodic stabilizer repairs the links after
//! joins, departures and crashes.

mod finger;
mod handlers;
mod membership;
mod node_id;
mod routing;
mod stabilizer;


pub use finger::FingerTable;
pub use membership::MembershipTable;
pub use node_id::{ID_BITS, NodeId};
