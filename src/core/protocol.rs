use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::DataMap;
use crate::utils::DhtError;

/// Value a caller sends with `Ping`
pub const PING_REQUEST: i32 = 114514;
/// The only reply a conforming node may give to `PING_REQUEST`
pub const PING_REPLY: i32 = 1919810;

/// Largest accepted frame on the wire
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// One framed message; replies echo the id of the request they answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<T> {
    pub id: Uuid,
    pub body: T,
}

impl<T> Frame<T> {
    pub fn new(body: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            body,
        }
    }

    pub fn reply<R>(&self, body: R) -> Frame<R> {
        Frame { id: self.id, body }
    }
}

/// Remote procedures exposed by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    FindSuccessor { id: u32, ttl: i16 },
    GetPredecessor,
    Ping(i32),
    Notify { addr: String },
    GetSuccList,
    GetAllData { is_backup: bool },
    GetDataByKey { key: String },
    PutData { is_backup: bool, key: String, value: String },
    SendBackupData { data: DataMap },
    DeleteData { is_backup: bool, key: String },
    SuccInformExit {
        addr: String,
        predecessor: Option<String>,
        data: DataMap,
    },
    PredInformExit { addr: String, successor: String },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::FindSuccessor { .. } => "FindSuccessor",
            Request::GetPredecessor => "GetPredecessor",
            Request::Ping(_) => "Ping",
            Request::Notify { .. } => "Notify",
            Request::GetSuccList => "GetSuccList",
            Request::GetAllData { .. } => "GetAllData",
            Request::GetDataByKey { .. } => "GetDataByKey",
            Request::PutData { .. } => "PutData",
            Request::SendBackupData { .. } => "SendBackupData",
            Request::DeleteData { .. } => "DeleteData",
            Request::SuccInformExit { .. } => "SuccInformExit",
            Request::PredInformExit { .. } => "PredInformExit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Successor(String),
    Predecessor(Option<String>),
    Pong(i32),
    SuccList(Vec<String>),
    Data(DataMap),
    Value(String),
    Ack,
    Fault(RpcFault),
}

/// Error reported by the remote handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcFault {
    RoutingExhausted,
    KeyNotFound(String),
    SuccessorsExhausted,
    Internal(String),
}

impl From<DhtError> for RpcFault {
    fn from(err: DhtError) -> Self {
        match err {
            DhtError::RoutingExhausted => RpcFault::RoutingExhausted,
            DhtError::KeyNotFound(key) => RpcFault::KeyNotFound(key),
            DhtError::SuccessorsExhausted => RpcFault::SuccessorsExhausted,
            other => RpcFault::Internal(other.to_string()),
        }
    }
}

impl From<RpcFault> for DhtError {
    fn from(fault: RpcFault) -> Self {
        match fault {
            RpcFault::RoutingExhausted => DhtError::RoutingExhausted,
            RpcFault::KeyNotFound(key) => DhtError::KeyNotFound(key),
            RpcFault::SuccessorsExhausted => DhtError::SuccessorsExhausted,
            RpcFault::Internal(msg) => DhtError::RemoteFault(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_serialization() {
        let request = Frame::new(Request::FindSuccessor { id: 7, ttl: 3 });
        let bytes = serde_json::to_vec(&request).unwrap();
        let decoded: Frame<Request> = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded.id, request.id);
        assert_eq!(decoded.body, Request::FindSuccessor { id: 7, ttl: 3 });
    }

    #[test]
    fn test_reply_keeps_id() {
        let request = Frame::new(Request::Ping(PING_REQUEST));
        let reply = request.reply(Response::Pong(PING_REPLY));
        assert_eq!(reply.id, request.id);
        assert_ne!(PING_REQUEST, PING_REPLY);
    }

    #[test]
    fn test_fault_mapping() {
        let fault: RpcFault = DhtError::KeyNotFound("k".into()).into();
        assert_eq!(DhtError::from(fault), DhtError::KeyNotFound("k".into()));

        let fault: RpcFault = DhtError::SuccessorsExhausted.into();
        assert_eq!(DhtError::from(fault), DhtError::SuccessorsExhausted);

        // a failing handler says nothing about the peer's liveness
        let fault: RpcFault = DhtError::ConnectionError("downstream".into()).into();
        let err = DhtError::from(fault);
        assert!(matches!(err, DhtError::RemoteFault(_)));
        assert!(!err.is_peer_failure());
    }
}
