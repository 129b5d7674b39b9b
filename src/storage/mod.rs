pub mod store;

pub use store::{DataMap, Partition, Store};
