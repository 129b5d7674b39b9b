use thiserror::Error;

pub type Result<T> = std::result::Result<T, DhtError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DhtError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Remote call failed: {0}")]
    RemoteCallError(String),

    /// The peer answered, but its handler failed
    #[error("Remote handler failed: {0}")]
    RemoteFault(String),

    #[error("Routing exhausted: hop budget reached zero")]
    RoutingExhausted,

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Liveness check failed: {0}")]
    LivenessViolation(String),

    #[error("All successors unreachable")]
    SuccessorsExhausted,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DhtError {
    /// Errors after which the remote peer must be presumed dead.
    pub fn is_peer_failure(&self) -> bool {
        matches!(
            self,
            DhtError::Io(_)
                | DhtError::ConnectionError(_)
                | DhtError::RemoteCallError(_)
                | DhtError::LivenessViolation(_)
                | DhtError::SerializationError(_)
                | DhtError::MessageTooLarge(_)
        )
    }
}

impl From<std::io::Error> for DhtError {
    fn from(err: std::io::Error) -> Self {
        DhtError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DhtError {
    fn from(err: serde_json::Error) -> Self {
        DhtError::SerializationError(err.to_string())
    }
}
