//! Mini Chord DHT Library
//!
//! The distributed hash table underneath a peer-to-peer content network:
//! nodes arrange themselves on a 32-bit identifier ring, keep it consistent
//! under churn, and store each key on the node that owns it with a backup
//! copy on that node's successor.

pub mod core;
pub mod network;
pub mod storage;
pub mod utils;

// Re-export main types
pub use crate::core::{ChordNode, Config, DhtClient, PieceDirectory};
pub use network::dht::NodeId;
pub use utils::error::{DhtError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
