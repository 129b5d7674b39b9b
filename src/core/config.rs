use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::{DhtError, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the node listens on; with port 0 the bound port is used
    #[serde(alias = "DHTAddr")]
    pub listen_addr: String,
    /// Address peers dial to reach this node; defaults to the bound address
    pub advertise_addr: Option<String>,
    /// Known ring member to join through; `None` creates a new ring
    pub bootstrap_peer: Option<String>,
    /// K, the successor list depth
    pub successor_list_len: usize,
    pub stabilize_interval_ms: u64,
    /// Dial and per-call timeout for every remote call
    pub call_timeout_ms: u64,
    /// Hop budget given to lookups started by this node
    pub max_hops: i16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:20000".to_string(),
            advertise_addr: None,
            bootstrap_peer: None,
            successor_list_len: 3,
            stabilize_interval_ms: 1000,
            call_timeout_ms: 500,
            max_hops: 32,
        }
    }
}

impl Config {
    /// Read a JSON config file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DhtError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| DhtError::ConfigError(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(DhtError::ConfigError("listen_addr is empty".to_string()));
        }
        if self.successor_list_len == 0 {
            return Err(DhtError::ConfigError(
                "successor_list_len must be at least 1".to_string(),
            ));
        }
        if self.max_hops <= 0 {
            return Err(DhtError::ConfigError("max_hops must be positive".to_string()));
        }
        if self.call_timeout_ms == 0 {
            return Err(DhtError::ConfigError("call_timeout_ms must be positive".to_string()));
        }
        // passes must not pile up behind slow calls
        if self.stabilize_interval_ms <= self.call_timeout_ms {
            return Err(DhtError::ConfigError(format!(
                "stabilize_interval_ms ({}) must exceed call_timeout_ms ({})",
                self.stabilize_interval_ms, self.call_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn stabilize_interval(&self) -> Duration {
        Duration::from_millis(self.stabilize_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_interval_below_timeout() {
        let config = Config {
            stabilize_interval_ms: 500,
            call_timeout_ms: 500,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(DhtError::ConfigError(_))));
    }

    #[test]
    fn test_accepts_legacy_key_and_partial_file() {
        let config: Config =
            serde_json::from_str(r#"{"DHTAddr": "127.0.0.1:21000", "max_hops": 8}"#).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:21000");
        assert_eq!(config.max_hops, 8);
        assert_eq!(config.successor_list_len, 3);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("mini-chord-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"listen_addr": "127.0.0.1:0", "successor_list_len": 5}"#)
            .unwrap();
        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.successor_list_len, 5);

        assert!(Config::load(Path::new("/nonexistent/mini-chord.json")).is_err());
    }
}
