pub mod dht;
pub mod link;
pub mod link_pool;
pub mod server;
pub mod transport;

pub use link::Link;
pub use link_pool::LinkPool;
pub use server::RpcServer;
pub use transport::Transport;
