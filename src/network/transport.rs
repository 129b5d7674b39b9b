use log::{debug, info};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::core::protocol::MAX_FRAME_SIZE;
use crate::utils::{DhtError, Result};

/// Length-prefixed JSON framing over TCP
pub struct Transport;

impl Transport {
    pub async fn connect(addr: &str, dial_timeout: Duration) -> Result<TcpStream> {
        let stream = tokio::time::timeout(dial_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| DhtError::ConnectionError(format!("dial {} timed out", addr)))?
            .map_err(|e| DhtError::ConnectionError(format!("Failed to connect to {}: {}", addr, e)))?;

        stream
            .set_nodelay(true)
            .map_err(|e| DhtError::ConnectionError(format!("Failed to set TCP_NODELAY: {}", e)))?;

        debug!("Connected to {}", addr);
        Ok(stream)
    }

    pub async fn listen(addr: &str) -> Result<TcpListener> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DhtError::ConnectionError(format!("Failed to bind to {}: {}", addr, e)))?;

        info!("Listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    pub async fn send_data(stream: &mut TcpStream, data: &[u8]) -> Result<()> {
        if data.len() > MAX_FRAME_SIZE {
            return Err(DhtError::MessageTooLarge(data.len()));
        }
        stream.write_u32(data.len() as u32).await?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    pub async fn receive_data(stream: &mut TcpStream, max_size: usize) -> Result<Vec<u8>> {
        let len = stream.read_u32().await? as usize;

        if len > max_size {
            return Err(DhtError::MessageTooLarge(len));
        }

        let mut buffer = vec![0u8; len];
        stream.read_exact(&mut buffer).await?;

        Ok(buffer)
    }

    pub async fn send_frame<T: Serialize>(stream: &mut TcpStream, frame: &T) -> Result<()> {
        let data = serde_json::to_vec(frame)?;
        Self::send_data(stream, &data).await
    }

    pub async fn receive_frame<T: DeserializeOwned>(stream: &mut TcpStream) -> Result<T> {
        let data = Self::receive_data(stream, MAX_FRAME_SIZE).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::{Frame, Request};

    #[tokio::test]
    async fn test_frame_over_loopback() {
        let listener = Transport::listen("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let frame: Frame<Request> = Transport::receive_frame(&mut stream).await.unwrap();
            frame.body
        });

        let mut stream = Transport::connect(&addr, Duration::from_secs(1)).await.unwrap();
        Transport::send_frame(&mut stream, &Frame::new(Request::GetSuccList))
            .await
            .unwrap();

        assert_eq!(server.await.unwrap(), Request::GetSuccList);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let listener = Transport::listen("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            Transport::receive_data(&mut stream, 4).await
        });

        let mut stream = Transport::connect(&addr, Duration::from_secs(1)).await.unwrap();
        Transport::send_data(&mut stream, b"too long").await.unwrap();

        assert_eq!(server.await.unwrap(), Err(DhtError::MessageTooLarge(8)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = Transport::listen("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = Transport::connect(&addr, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, DhtError::ConnectionError(_)));
    }
}
