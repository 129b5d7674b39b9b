pub mod client;
pub mod config;
pub mod directory;
pub mod node;
pub mod protocol;

pub use client::DhtClient;
pub use config::Config;
pub use directory::PieceDirectory;
pub use node::ChordNode;
pub use protocol::{Request, Response, RpcFault};
