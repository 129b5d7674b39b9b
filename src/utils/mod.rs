pub mod error;
pub mod logger;
pub mod metrics;

pub use error::{DhtError, Result};
pub use logger::setup_logging;
pub use metrics::MetricsCollector;
