use log::{debug, warn};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::core::protocol::{Frame, PING_REPLY, PING_REQUEST, Request, Response};
use crate::network::Transport;
use crate::network::dht::NodeId;
use crate::storage::DataMap;
use crate::utils::{DhtError, MetricsCollector, Result};

/// Call channel to one peer.
///
/// The TCP connection is dialed on first use and dropped whenever the peer
/// misbehaves: transport error, timeout, mismatched reply or a failed ping.
/// The next call dials again.
pub struct Link {
    addr: String,
    id: NodeId,
    stream: Mutex<Option<TcpStream>>,
    call_timeout: Duration,
    metrics: Option<MetricsCollector>,
}

impl Link {
    pub fn new(addr: impl Into<String>, call_timeout: Duration) -> Self {
        let addr = addr.into();
        Self {
            id: NodeId::from_address(&addr),
            addr,
            stream: Mutex::new(None),
            call_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Dial now instead of on the first call
    pub async fn connect(&self) -> Result<()> {
        let mut stream = self.stream.lock().await;
        if stream.is_none() {
            *stream = Some(Transport::connect(&self.addr, self.call_timeout).await?);
        }
        Ok(())
    }

    pub async fn close(&self) {
        if self.stream.lock().await.take().is_some() {
            debug!("Closed link to {}", self.addr);
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Send one request and wait for its reply, bounded by the call timeout.
    /// Remote faults come back as their typed error.
    pub async fn call(&self, request: Request) -> Result<Response> {
        let name = request.name();
        let result = match tokio::time::timeout(self.call_timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(DhtError::RemoteCallError(format!(
                "{} to {} timed out",
                name, self.addr
            ))),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_call(result.is_ok()).await;
        }

        match result {
            Ok(Response::Fault(fault)) => Err(fault.into()),
            Ok(response) => Ok(response),
            Err(e) => {
                debug!("{} to {} failed: {}", name, self.addr, e);
                if e.is_peer_failure() {
                    self.close().await;
                }
                Err(e)
            }
        }
    }

    async fn exchange(&self, request: Request) -> Result<Response> {
        let mut guard = self.stream.lock().await;
        // The stream is only put back after a clean exchange, so a call
        // abandoned by the timeout leaves the link closed.
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => Transport::connect(&self.addr, self.call_timeout).await?,
        };

        let frame = Frame::new(request);
        let outcome = async {
            Transport::send_frame(&mut stream, &frame).await?;
            Transport::receive_frame::<Frame<Response>>(&mut stream).await
        }
        .await;

        match outcome {
            Ok(reply) if reply.id == frame.id => {
                *guard = Some(stream);
                Ok(reply.body)
            }
            Ok(reply) => Err(DhtError::RemoteCallError(format!(
                "reply {} does not answer request {}",
                reply.id, frame.id
            ))),
            Err(e) => Err(e),
        }
    }

    async fn unexpected<T>(&self, procedure: &str, response: Response) -> Result<T> {
        warn!("{} answered {} with {:?}", self.addr, procedure, response);
        self.close().await;
        Err(DhtError::RemoteCallError(format!(
            "unexpected reply to {} from {}",
            procedure, self.addr
        )))
    }

    /// Liveness probe. Anything but the protocol's pong closes the link.
    pub async fn ping(&self) -> Result<()> {
        match self.call(Request::Ping(PING_REQUEST)).await {
            Ok(Response::Pong(PING_REPLY)) => Ok(()),
            Ok(other) => {
                self.close().await;
                Err(DhtError::LivenessViolation(format!(
                    "{} answered ping with {:?}",
                    self.addr, other
                )))
            }
            Err(e) => {
                self.close().await;
                Err(e)
            }
        }
    }

    pub async fn find_successor(&self, id: NodeId, ttl: i16) -> Result<String> {
        match self
            .call(Request::FindSuccessor {
                id: id.as_u32(),
                ttl,
            })
            .await?
        {
            Response::Successor(addr) => Ok(addr),
            other => self.unexpected("FindSuccessor", other).await,
        }
    }

    pub async fn get_predecessor(&self) -> Result<Option<String>> {
        match self.call(Request::GetPredecessor).await? {
            Response::Predecessor(addr) => Ok(addr),
            other => self.unexpected("GetPredecessor", other).await,
        }
    }

    pub async fn notify(&self, addr: &str) -> Result<()> {
        self.expect_ack(
            "Notify",
            Request::Notify {
                addr: addr.to_string(),
            },
        )
        .await
    }

    pub async fn get_succ_list(&self) -> Result<Vec<String>> {
        match self.call(Request::GetSuccList).await? {
            Response::SuccList(list) => Ok(list),
            other => self.unexpected("GetSuccList", other).await,
        }
    }

    pub async fn get_all_data(&self, is_backup: bool) -> Result<DataMap> {
        match self.call(Request::GetAllData { is_backup }).await? {
            Response::Data(data) => Ok(data),
            other => self.unexpected("GetAllData", other).await,
        }
    }

    pub async fn get_data_by_key(&self, key: &str) -> Result<String> {
        match self
            .call(Request::GetDataByKey {
                key: key.to_string(),
            })
            .await?
        {
            Response::Value(value) => Ok(value),
            other => self.unexpected("GetDataByKey", other).await,
        }
    }

    pub async fn put_data(&self, key: &str, value: &str, is_backup: bool) -> Result<()> {
        self.expect_ack(
            "PutData",
            Request::PutData {
                is_backup,
                key: key.to_string(),
                value: value.to_string(),
            },
        )
        .await
    }

    pub async fn send_backup_data(&self, data: DataMap) -> Result<()> {
        self.expect_ack("SendBackupData", Request::SendBackupData { data })
            .await
    }

    pub async fn delete_data(&self, key: &str, is_backup: bool) -> Result<()> {
        self.expect_ack(
            "DeleteData",
            Request::DeleteData {
                is_backup,
                key: key.to_string(),
            },
        )
        .await
    }

    pub async fn succ_inform_exit(
        &self,
        addr: &str,
        predecessor: Option<String>,
        data: DataMap,
    ) -> Result<()> {
        self.expect_ack(
            "SuccInformExit",
            Request::SuccInformExit {
                addr: addr.to_string(),
                predecessor,
                data,
            },
        )
        .await
    }

    pub async fn pred_inform_exit(&self, addr: &str, successor: &str) -> Result<()> {
        self.expect_ack(
            "PredInformExit",
            Request::PredInformExit {
                addr: addr.to_string(),
                successor: successor.to_string(),
            },
        )
        .await
    }

    async fn expect_ack(&self, procedure: &str, request: Request) -> Result<()> {
        match self.call(request).await? {
            Response::Ack => Ok(()),
            other => self.unexpected(procedure, other).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Answers every request on every connection with `reply`
    pub(crate) async fn fake_peer(reply: Response) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let reply = reply.clone();
                tokio::spawn(async move {
                    while let Ok(frame) =
                        Transport::receive_frame::<Frame<Request>>(&mut stream).await
                    {
                        let answer = frame.reply(reply.clone());
                        if Transport::send_frame(&mut stream, &answer).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_ping_accepts_protocol_pong() {
        let addr = fake_peer(Response::Pong(PING_REPLY)).await;
        let link = Link::new(addr, Duration::from_secs(1));

        assert!(link.ping().await.is_ok());
        assert!(link.is_connected().await);
    }

    #[tokio::test]
    async fn test_ping_mismatch_closes_link() {
        let addr = fake_peer(Response::Pong(PING_REQUEST)).await;
        let link = Link::new(addr, Duration::from_secs(1));

        let err = link.ping().await.unwrap_err();
        assert!(matches!(err, DhtError::LivenessViolation(_)));
        assert!(!link.is_connected().await);
    }

    #[tokio::test]
    async fn test_fault_maps_to_typed_error_and_keeps_link() {
        let addr = fake_peer(Response::Fault(crate::core::protocol::RpcFault::KeyNotFound(
            "k".into(),
        )))
        .await;
        let link = Link::new(addr, Duration::from_secs(1));

        assert_eq!(
            link.get_data_by_key("k").await,
            Err(DhtError::KeyNotFound("k".into()))
        );
        assert!(link.is_connected().await);
    }

    #[tokio::test]
    async fn test_unexpected_variant_closes_link() {
        let addr = fake_peer(Response::Ack).await;
        let link = Link::new(addr, Duration::from_secs(1));

        assert!(matches!(
            link.get_succ_list().await,
            Err(DhtError::RemoteCallError(_))
        ));
        assert!(!link.is_connected().await);
    }

    #[tokio::test]
    async fn test_unreachable_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let link = Link::new(addr, Duration::from_millis(300));
        assert!(matches!(
            link.connect().await,
            Err(DhtError::ConnectionError(_))
        ));
        assert!(link.ping().await.is_err());
    }
}
